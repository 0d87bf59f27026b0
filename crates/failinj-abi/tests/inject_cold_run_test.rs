#![cfg(target_os = "linux")]

//! Cold-run injection: with an empty database, the first wrapped call is
//! the first sight of its callsite and must fail synthetically, growing
//! the database by exactly one record. The same site never fails again in
//! this process.
//!
//! Wrapper state (config, injection latch, database handle) is
//! process-wide, so this whole scenario lives in a single test function in
//! its own test binary.

use std::path::PathBuf;

#[test]
fn first_wrapped_call_fails_once_and_grows_the_database() {
    let database: PathBuf = std::env::temp_dir().join(format!(
        "failinj_cold_run_{}.db",
        std::process::id()
    ));
    let _ = std::fs::remove_file(&database);
    // SAFETY: set before the first wrapped call resolves the configuration.
    unsafe { std::env::set_var("FAILINJ_DATABASE", &database) };

    let mut outcomes = Vec::new();
    for _ in 0..3 {
        // SAFETY: malloc contract; released below via the wrapped free.
        let ptr = unsafe { failinj::malloc_abi::malloc(50) };
        // SAFETY: reading the calling thread's errno slot.
        let errno = unsafe { *libc::__errno_location() };
        outcomes.push((ptr, errno));
    }

    let (first, first_errno) = outcomes[0];
    assert!(first.is_null(), "first sight of the callsite is injected");
    assert_eq!(first_errno, libc::ENOMEM);

    for &(ptr, _) in &outcomes[1..] {
        assert!(
            !ptr.is_null(),
            "an already-recorded callsite is honored for real"
        );
        // SAFETY: ptr came from the wrapped malloc above.
        unsafe { failinj::malloc_abi::free(ptr) };
    }

    let bytes = std::fs::read(&database).expect("database was created");
    assert_eq!(bytes.len(), 8, "exactly one record for the injected site");
    assert_eq!(failinj::engine::known_callsites(), 1);

    // A different callsite is still spared: the one-injection latch holds.
    // SAFETY: malloc contract; released right after.
    let other_site = unsafe { failinj::malloc_abi::malloc(32) };
    assert!(!other_site.is_null());
    // SAFETY: ptr came from the wrapped malloc above.
    unsafe { failinj::malloc_abi::free(other_site) };

    let bytes = std::fs::read(&database).expect("database still present");
    assert_eq!(
        bytes.len(),
        8,
        "a run that already injected records nothing further"
    );
    assert!(!failinj::engine::bug_found());

    let _ = std::fs::remove_file(database);
}
