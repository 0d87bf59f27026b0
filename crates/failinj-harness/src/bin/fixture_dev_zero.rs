//! Descriptor-surface payload: open `/dev/zero`, read 50 bytes, close.
//! Across a cycle the engine records exactly three callsites here — the
//! open, the read and the close — before a run finally completes and
//! exits with the done code.

fn main() {
    // SAFETY: plain libc calls on a descriptor this payload owns.
    unsafe {
        let fd = libc::open(c"/dev/zero".as_ptr(), libc::O_RDONLY);
        if fd < 0 {
            libc::perror(c"Unable to open /dev/zero".as_ptr());
            std::process::exit(1);
        }
        let mut buf = [0u8; 50];
        if libc::read(fd, buf.as_mut_ptr().cast(), buf.len()) != buf.len() as isize {
            libc::perror(c"Failed to read /dev/zero".as_ptr());
            libc::close(fd);
            std::process::exit(1);
        }
        if libc::close(fd) != 0 {
            libc::perror(c"Error closing /dev/zero".as_ptr());
            std::process::exit(1);
        }
    }
    std::process::exit(failinj_harness::DONE_EXIT_CODE);
}
