//! failinj — deterministic failure injection for programs under test.
//!
//! Preloaded (`LD_PRELOAD=libfailinj.so`) into a program, this library
//! interposes a catalog of fallible libc primitives. Each distinct call
//! site — identified by the symbolic stack above the call — is forced to
//! fail exactly once across a series of runs: a persistent database
//! remembers which sites have already been failed, and every run injects
//! at most one new failure. Run the program repeatedly until a run
//! completes without a new injection and every error path has been
//! exercised once.
//!
//! Alongside injection, shadow tables audit resource lifecycles:
//! allocations, descriptors and streams are recorded on create and removed
//! on release, surviving entries are reported as leaks at process
//! teardown, and releases of never-created keys are reported as untracked.
//! Any such bug overrides the program's exit code.
//!
//! The interposed symbols are only exported in release builds; in debug
//! builds (and therefore under `cargo test`) the wrappers are ordinary
//! functions, so the test binary's own allocator is not shadowed.

mod early_alloc;
mod errno;
mod gate;
mod nextsym;
mod shutdown;

pub mod engine;
pub mod fingerprint;
pub mod malloc_abi;
pub mod stdio_abi;
pub mod unistd_abi;

#[cfg(test)]
pub(crate) mod testutil {
    use std::sync::Mutex;

    /// Serializes unit tests that manipulate process-wide engine state
    /// (the gate, the tables, the injection latch).
    pub(crate) static PROCESS_STATE_LOCK: Mutex<()> = Mutex::new(());
}
