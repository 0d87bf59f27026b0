//! Thread errno access for synthesized failures.

use std::ffi::c_int;

/// Stores `value` into the calling thread's errno, as the real primitive
/// would have on the corresponding genuine failure.
pub(crate) fn set(value: c_int) {
    // SAFETY: __errno_location returns the calling thread's errno slot.
    unsafe { *libc::__errno_location() = value };
}
