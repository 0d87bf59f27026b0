#![cfg(target_os = "linux")]

//! `SKIP_INJECTION`: a call whose stack contains a configured substring is
//! never injected and never recorded.

use std::path::PathBuf;

#[test]
fn matching_skip_token_suppresses_injection_and_recording() {
    let database: PathBuf = std::env::temp_dir().join(format!(
        "failinj_skip_{}.db",
        std::process::id()
    ));
    let _ = std::fs::remove_file(&database);
    // Every wrapped call passes through this crate's `failinj::fingerprint`
    // frames, so the token matches any stack in this process.
    // SAFETY: set before the first wrapped call resolves the configuration.
    unsafe {
        std::env::set_var("FAILINJ_DATABASE", &database);
        std::env::set_var("FAILINJ_SKIP_INJECTION", "failinj");
    }

    for _ in 0..2 {
        // SAFETY: malloc contract; released right after.
        let ptr = unsafe { failinj::malloc_abi::malloc(50) };
        assert!(!ptr.is_null(), "skipped calls are honored for real");
        // SAFETY: ptr came from the wrapped malloc above.
        unsafe { failinj::malloc_abi::free(ptr) };
    }

    let bytes = std::fs::read(&database).expect("database is opened lazily but created");
    assert!(bytes.is_empty(), "skipped callsites are never recorded");
    assert_eq!(failinj::engine::known_callsites(), 0);
    assert!(!failinj::engine::bug_found());

    let _ = std::fs::remove_file(database);
}
