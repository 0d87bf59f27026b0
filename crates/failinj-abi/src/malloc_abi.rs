//! ABI layer for the allocator surface (`malloc`, `calloc`, `realloc`,
//! `reallocarray`, `free`).
//!
//! Allocation primitives inject before calling the real allocator: a
//! synthetic `ENOMEM` must leave nothing allocated. Successful allocations
//! are recorded in the allocation shadow table; `free` never injects (it
//! cannot fail) but audits that the pointer was produced by a wrapper.
//!
//! `malloc` and `calloc` additionally serve the bootstrap window: the very
//! first call arrives while the underlying symbol is still being resolved
//! and is satisfied from the early bump arena instead.

use std::ffi::c_void;
use std::ptr;

use libc::size_t;

use failinj_core::report::ReleaseKind;

use crate::engine::{self, Resource};
use crate::nextsym::next_symbol;
use crate::{early_alloc, errno};

#[cfg_attr(not(debug_assertions), unsafe(no_mangle))]
pub unsafe extern "C" fn malloc(size: size_t) -> *mut c_void {
    if early_alloc::active() {
        return early_alloc::alloc(size);
    }
    if engine::should_fail() {
        errno::set(libc::ENOMEM);
        return ptr::null_mut();
    }
    let real = next_symbol!(malloc, unsafe extern "C" fn(size_t) -> *mut c_void);
    // SAFETY: delegating to the next `malloc` binding.
    let ret = unsafe { real(size) };
    if !ret.is_null() {
        engine::track_create(ret as u64, Resource::Allocation);
    }
    ret
}

#[cfg_attr(not(debug_assertions), unsafe(no_mangle))]
pub unsafe extern "C" fn calloc(nmemb: size_t, size: size_t) -> *mut c_void {
    if early_alloc::active() {
        // dlsym's own allocations come through here; the arena is zeroed.
        return early_alloc::alloc(nmemb.wrapping_mul(size));
    }
    if engine::should_fail() {
        errno::set(libc::ENOMEM);
        return ptr::null_mut();
    }
    let real = next_symbol!(calloc, unsafe extern "C" fn(size_t, size_t) -> *mut c_void);
    // SAFETY: delegating to the next `calloc` binding.
    let ret = unsafe { real(nmemb, size) };
    if !ret.is_null() {
        engine::track_create(ret as u64, Resource::Allocation);
    }
    ret
}

#[cfg_attr(not(debug_assertions), unsafe(no_mangle))]
pub unsafe extern "C" fn realloc(ptr: *mut c_void, size: size_t) -> *mut c_void {
    if engine::should_fail() {
        errno::set(libc::ENOMEM);
        return ptr::null_mut();
    }
    let real = next_symbol!(
        realloc,
        unsafe extern "C" fn(*mut c_void, size_t) -> *mut c_void
    );
    // SAFETY: delegating to the next `realloc` binding.
    let ret = unsafe { real(ptr, size) };
    if !ret.is_null() {
        // realloc(NULL, n) is malloc(n): nothing was released.
        if !ptr.is_null() && !early_alloc::contains(ptr) {
            engine::track_destroy(ptr as u64, Resource::Allocation, ReleaseKind::Realloc);
        }
        engine::track_create(ret as u64, Resource::Allocation);
    }
    ret
}

#[cfg_attr(not(debug_assertions), unsafe(no_mangle))]
pub unsafe extern "C" fn reallocarray(
    ptr: *mut c_void,
    nmemb: size_t,
    size: size_t,
) -> *mut c_void {
    if engine::should_fail() {
        errno::set(libc::ENOMEM);
        return ptr::null_mut();
    }
    let real = next_symbol!(
        reallocarray,
        unsafe extern "C" fn(*mut c_void, size_t, size_t) -> *mut c_void
    );
    // SAFETY: delegating to the next `reallocarray` binding.
    let ret = unsafe { real(ptr, nmemb, size) };
    if !ret.is_null() {
        if !ptr.is_null() && !early_alloc::contains(ptr) {
            engine::track_destroy(ptr as u64, Resource::Allocation, ReleaseKind::Realloc);
        }
        engine::track_create(ret as u64, Resource::Allocation);
    }
    ret
}

#[cfg_attr(not(debug_assertions), unsafe(no_mangle))]
pub unsafe extern "C" fn free(ptr: *mut c_void) {
    // Arena cuts were handed out while the resolver bootstrapped the real
    // allocator; they must never reach it.
    if ptr.is_null() || early_alloc::contains(ptr) {
        return;
    }
    let real = next_symbol!(free, unsafe extern "C" fn(*mut c_void));
    // SAFETY: delegating to the next `free` binding.
    unsafe { real(ptr) };
    engine::track_destroy(ptr as u64, Resource::Allocation, ReleaseKind::Free);
}
