//! Resolution of the next symbol in load order.
//!
//! Each wrapper delegates to the definition the dynamic linker would have
//! picked had this library not been preloaded, looked up lazily and
//! memoized per primitive. Resolution is serialized by its own lock (never
//! taken while holding the engine mutex in the other order), and opens an
//! early-allocator window because `dlsym` allocates: the first `malloc`
//! of the process arrives while `malloc` itself is being resolved.

use std::ffi::{c_char, c_void};
use std::sync::Mutex;

use crate::early_alloc::EarlyWindow;
use crate::engine;

static RESOLVE_LOCK: Mutex<()> = Mutex::new(());

/// Resolves the next binding of `symbol` (nul-terminated; `name` is the
/// printable form). An unresolvable primitive leaves the wrapper with no
/// way to honor its contract, which is an engine-internal error.
pub(crate) fn resolve(symbol: *const c_char, name: &str) -> *mut c_void {
    let _serialized = RESOLVE_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let _window = EarlyWindow::open();
    // SAFETY: symbol is a nul-terminated string constant.
    let next = unsafe { libc::dlsym(libc::RTLD_NEXT, symbol) };
    if next.is_null() {
        engine::exit_internal(&format!("Unable to resolve '{name}'"));
    }
    next
}

/// Memoizes the next binding of `$name` and yields it as the fn-pointer
/// type `$ty`.
macro_rules! next_symbol {
    ($name:ident, $ty:ty) => {{
        static SLOT: std::sync::atomic::AtomicUsize = std::sync::atomic::AtomicUsize::new(0);
        let mut addr = SLOT.load(std::sync::atomic::Ordering::Acquire);
        if addr == 0 {
            addr = crate::nextsym::resolve(
                concat!(stringify!($name), "\0").as_ptr() as *const std::ffi::c_char,
                stringify!($name),
            ) as usize;
            SLOT.store(addr, std::sync::atomic::Ordering::Release);
        }
        // SAFETY: addr is the non-null address of the next `$name` binding,
        // whose ABI is described by `$ty`.
        unsafe { std::mem::transmute::<usize, $ty>(addr) }
    }};
}

pub(crate) use next_symbol;
