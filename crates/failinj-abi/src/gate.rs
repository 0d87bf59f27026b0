//! Reentrancy gate.
//!
//! While the engine itself is executing (walking the stack, touching the
//! tables, writing the database, resolving symbols) any wrapped primitive
//! it calls back into must pass straight through to the underlying libc,
//! neither injecting nor tracking. The flag is process-wide, not
//! thread-local: its raising and lowering bracket the engine's serialized
//! critical sections, and the cross-thread races that remain only cause a
//! concurrent call to skip injection for one invocation.

use std::sync::atomic::{AtomicBool, Ordering};

static ENGAGED: AtomicBool = AtomicBool::new(false);

/// Raises the gate permanently. Only the shutdown hook uses this: the
/// process is exiting and the gate must never drop again.
pub(crate) fn force_raise() {
    ENGAGED.store(true, Ordering::Relaxed);
}

/// RAII section marker for "inside the engine".
pub(crate) struct GateGuard(());

impl GateGuard {
    /// Raises the gate, or returns `None` when it is already raised and
    /// the caller must pass through untouched.
    pub(crate) fn enter() -> Option<Self> {
        if ENGAGED.swap(true, Ordering::Acquire) {
            None
        } else {
            Some(Self(()))
        }
    }
}

impl Drop for GateGuard {
    fn drop(&mut self) {
        ENGAGED.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::PROCESS_STATE_LOCK;

    #[test]
    fn nested_entry_is_refused_until_the_guard_drops() {
        let _serial = PROCESS_STATE_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        assert!(!ENGAGED.load(Ordering::Relaxed));
        let outer = GateGuard::enter().expect("gate starts lowered");
        assert!(ENGAGED.load(Ordering::Relaxed));
        assert!(GateGuard::enter().is_none());
        drop(outer);
        assert!(!ENGAGED.load(Ordering::Relaxed));
        drop(GateGuard::enter().expect("gate lowered again"));
    }
}
