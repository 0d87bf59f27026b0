//! Bootstrap bump allocator.
//!
//! The very first `malloc` the process makes arrives while the underlying
//! `malloc` symbol is still being resolved; `dlsym` itself allocates, which
//! would recurse straight back into the wrapper. While a resolution window
//! is open, allocation requests are satisfied from a small static arena
//! instead. Arena storage is never recycled: `free` and `realloc` of an
//! arena pointer must not reach the real allocator.

use std::cell::UnsafeCell;
use std::ffi::c_void;
use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

const ARENA_SIZE: usize = 4096;
const ALIGN: usize = 16;

#[repr(align(16))]
struct Arena(UnsafeCell<[u8; ARENA_SIZE]>);

// SAFETY: cuts are handed out exactly once via the atomic cursor below, so
// no two callers ever receive overlapping storage.
unsafe impl Sync for Arena {}

static ARENA: Arena = Arena(UnsafeCell::new([0; ARENA_SIZE]));
static CURSOR: AtomicUsize = AtomicUsize::new(0);
static ACTIVE: AtomicBool = AtomicBool::new(false);

/// Whether a symbol-resolution window is currently open.
pub(crate) fn active() -> bool {
    ACTIVE.load(Ordering::Relaxed)
}

/// Serves one allocation from the arena, or null when it is exhausted.
pub(crate) fn alloc(size: usize) -> *mut c_void {
    let size = size.saturating_add(ALIGN - 1) & !(ALIGN - 1);
    let offset = CURSOR.fetch_add(size, Ordering::Relaxed);
    if offset.saturating_add(size) > ARENA_SIZE {
        return ptr::null_mut();
    }
    // SAFETY: offset..offset+size is inside the arena and exclusively ours.
    unsafe { ARENA.0.get().cast::<u8>().add(offset).cast() }
}

/// Whether `ptr` points into the arena, in which case releasing it is a
/// no-op.
pub(crate) fn contains(ptr: *const c_void) -> bool {
    let base = ARENA.0.get() as usize;
    let addr = ptr as usize;
    addr >= base && addr < base + ARENA_SIZE
}

/// Marks a symbol-resolution window. Allocation requests arriving while
/// one is open are served from the arena.
pub(crate) struct EarlyWindow(());

impl EarlyWindow {
    pub(crate) fn open() -> Self {
        ACTIVE.store(true, Ordering::Relaxed);
        Self(())
    }
}

impl Drop for EarlyWindow {
    fn drop(&mut self) {
        ACTIVE.store(false, Ordering::Relaxed);
    }
}
