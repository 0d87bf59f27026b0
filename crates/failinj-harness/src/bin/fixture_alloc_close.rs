//! Smallest interesting payload: one allocation callsite and one close of
//! a descriptor nothing ever opened.
//!
//! Under a fresh database the allocation is injected (exit 1). On the next
//! run it succeeds and the bogus `close(88)` is reported as an untracked
//! release, so the engine overrides the exit code with `BUG_FOUND`.

fn main() {
    // SAFETY: plain libc calls; x is checked before use and freed once.
    unsafe {
        let x = libc::strdup(c"OK".as_ptr());
        if x.is_null() {
            std::process::exit(1);
        }
        libc::printf(c"It's %s!\n".as_ptr(), x);
        libc::free(x.cast());
        libc::close(88);
    }
    std::process::exit(failinj_harness::DONE_EXIT_CODE);
}
