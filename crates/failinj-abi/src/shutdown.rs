//! Process-teardown hook.
//!
//! Runs after the program under test finished: scans the shadow tables for
//! survivors and, if any bug was reported during the run or by the scan,
//! replaces the program's exit code with the configured `BUG_FOUND` value.
//! `_exit` keeps that override the last word even when the engine itself
//! exited through its internal-error path earlier in the teardown.

use crate::engine;

#[ctor::dtor]
unsafe fn check_leaks() {
    engine::sweep_leaks();
    if engine::bug_found() {
        // SAFETY: terminating the process during teardown.
        unsafe { libc::_exit(engine::config().exit_bug_found) };
    }
}
