//! ABI layer for the stream surface (`fopen`, `fdopen`, `freopen`,
//! `fmemopen`, `tmpfile`, `fclose`, `fcloseall`, `fwrite`, `fflush`).
//!
//! Stream creators inject up front and track the returned `FILE*`.
//! `fdopen` and `freopen` additionally consume a resource they were
//! handed — the descriptor, or the old stream — so the corresponding
//! shadow entry is released when they succeed. `fclose` and `fcloseall`
//! are close-like: the real call runs first and only a success may be
//! replaced by a synthetic failure.
//!
//! `fread` is deliberately not interposed: there is no portable way to set
//! the stream's error indicator, so a synthetic short read would be
//! indistinguishable from EOF.

use std::ffi::{c_char, c_int, c_void};
use std::ptr;

use libc::{FILE, size_t};

use failinj_core::report::ReleaseKind;

use crate::engine::{self, Resource};
use crate::errno;
use crate::nextsym::next_symbol;

const EOF: c_int = -1;

#[cfg_attr(not(debug_assertions), unsafe(no_mangle))]
pub unsafe extern "C" fn fopen(pathname: *const c_char, mode: *const c_char) -> *mut FILE {
    if engine::should_fail() {
        errno::set(libc::EACCES);
        return ptr::null_mut();
    }
    let real = next_symbol!(
        fopen,
        unsafe extern "C" fn(*const c_char, *const c_char) -> *mut FILE
    );
    // SAFETY: delegating to the next `fopen` binding.
    let stream = unsafe { real(pathname, mode) };
    if !stream.is_null() {
        engine::track_create(stream as u64, Resource::Stream);
    }
    stream
}

#[cfg_attr(not(debug_assertions), unsafe(no_mangle))]
pub unsafe extern "C" fn fdopen(fd: c_int, mode: *const c_char) -> *mut FILE {
    if engine::should_fail() {
        errno::set(libc::EPERM);
        return ptr::null_mut();
    }
    let real = next_symbol!(
        fdopen,
        unsafe extern "C" fn(c_int, *const c_char) -> *mut FILE
    );
    // SAFETY: delegating to the next `fdopen` binding.
    let stream = unsafe { real(fd, mode) };
    if !stream.is_null() {
        engine::track_create(stream as u64, Resource::Stream);
        // The descriptor now belongs to the stream; from here on releasing
        // it goes through fclose, not close.
        engine::track_destroy(fd as u64, Resource::Descriptor, ReleaseKind::Fdopen);
    }
    stream
}

#[cfg_attr(not(debug_assertions), unsafe(no_mangle))]
pub unsafe extern "C" fn freopen(
    pathname: *const c_char,
    mode: *const c_char,
    stream: *mut FILE,
) -> *mut FILE {
    if engine::should_fail() {
        errno::set(libc::EPERM);
        return ptr::null_mut();
    }
    let real = next_symbol!(
        freopen,
        unsafe extern "C" fn(*const c_char, *const c_char, *mut FILE) -> *mut FILE
    );
    // SAFETY: delegating to the next `freopen` binding.
    let ret = unsafe { real(pathname, mode, stream) };
    if !ret.is_null() {
        // The old stream is consumed first: on success freopen usually
        // returns the same FILE*, and create-after-destroy keeps the
        // reopened stream tracked under it.
        engine::track_destroy(stream as u64, Resource::Stream, ReleaseKind::Freopen);
        engine::track_create(ret as u64, Resource::Stream);
    }
    ret
}

#[cfg_attr(not(debug_assertions), unsafe(no_mangle))]
pub unsafe extern "C" fn fmemopen(buf: *mut c_void, size: size_t, mode: *const c_char) -> *mut FILE {
    if engine::should_fail() {
        errno::set(libc::ENOMEM);
        return ptr::null_mut();
    }
    let real = next_symbol!(
        fmemopen,
        unsafe extern "C" fn(*mut c_void, size_t, *const c_char) -> *mut FILE
    );
    // SAFETY: delegating to the next `fmemopen` binding.
    let stream = unsafe { real(buf, size, mode) };
    if !stream.is_null() {
        engine::track_create(stream as u64, Resource::Stream);
    }
    stream
}

#[cfg_attr(not(debug_assertions), unsafe(no_mangle))]
pub unsafe extern "C" fn tmpfile() -> *mut FILE {
    if engine::should_fail() {
        errno::set(libc::EROFS);
        return ptr::null_mut();
    }
    let real = next_symbol!(tmpfile, unsafe extern "C" fn() -> *mut FILE);
    // SAFETY: delegating to the next `tmpfile` binding.
    let stream = unsafe { real() };
    if !stream.is_null() {
        engine::track_create(stream as u64, Resource::Stream);
    }
    stream
}

#[cfg_attr(not(debug_assertions), unsafe(no_mangle))]
pub unsafe extern "C" fn fclose(stream: *mut FILE) -> c_int {
    engine::track_destroy(stream as u64, Resource::Stream, ReleaseKind::Fclose);
    let real = next_symbol!(fclose, unsafe extern "C" fn(*mut FILE) -> c_int);
    // SAFETY: delegating to the next `fclose` binding.
    let mut ret = unsafe { real(stream) };
    if ret == 0 && engine::should_fail() {
        errno::set(libc::ENOSPC);
        ret = EOF;
    }
    ret
}

#[cfg_attr(not(debug_assertions), unsafe(no_mangle))]
pub unsafe extern "C" fn fcloseall() -> c_int {
    engine::forget_streams();
    let real = next_symbol!(fcloseall, unsafe extern "C" fn() -> c_int);
    // SAFETY: delegating to the next `fcloseall` binding.
    let mut ret = unsafe { real() };
    if ret == 0 && engine::should_fail() {
        errno::set(libc::ENOSPC);
        ret = EOF;
    }
    ret
}

#[cfg_attr(not(debug_assertions), unsafe(no_mangle))]
pub unsafe extern "C" fn fwrite(
    ptr: *const c_void,
    size: size_t,
    nmemb: size_t,
    stream: *mut FILE,
) -> size_t {
    if engine::should_fail() {
        errno::set(libc::ENOSPC);
        return 0;
    }
    let real = next_symbol!(
        fwrite,
        unsafe extern "C" fn(*const c_void, size_t, size_t, *mut FILE) -> size_t
    );
    // SAFETY: delegating to the next `fwrite` binding.
    unsafe { real(ptr, size, nmemb, stream) }
}

#[cfg_attr(not(debug_assertions), unsafe(no_mangle))]
pub unsafe extern "C" fn fflush(stream: *mut FILE) -> c_int {
    if engine::should_fail() {
        errno::set(libc::ENOSPC);
        return EOF;
    }
    let real = next_symbol!(fflush, unsafe extern "C" fn(*mut FILE) -> c_int);
    // SAFETY: delegating to the next `fflush` binding.
    unsafe { real(stream) }
}
