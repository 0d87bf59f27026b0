//! ABI layer for the descriptor surface (`open`, `openat`, `creat`,
//! `close`, `read`, `write`).
//!
//! Open-family primitives inject before touching the filesystem and track
//! the descriptor they return. `close` is the one *close-like* wrapper
//! here: the real close runs first and only a success may be replaced by a
//! synthetic failure, so the descriptor is genuinely released even when
//! the program under test observes an error — a retry loop must not be
//! handed a still-open fd.
//!
//! `open` is declared variadic in C; the optional `mode` argument is read
//! from the fixed third slot, which matches the calling convention on the
//! supported targets.

use std::ffi::{c_char, c_int, c_void};

use libc::{mode_t, size_t, ssize_t};

use failinj_core::report::ReleaseKind;

use crate::engine::{self, Resource};
use crate::errno;
use crate::nextsym::next_symbol;

#[cfg_attr(not(debug_assertions), unsafe(no_mangle))]
pub unsafe extern "C" fn open(pathname: *const c_char, flags: c_int, mode: mode_t) -> c_int {
    if engine::should_fail() {
        errno::set(libc::EACCES);
        return -1;
    }
    let real = next_symbol!(
        open,
        unsafe extern "C" fn(*const c_char, c_int, mode_t) -> c_int
    );
    // SAFETY: delegating to the next `open` binding.
    let fd = unsafe { real(pathname, flags, mode) };
    if fd != -1 {
        engine::track_create(fd as u64, Resource::Descriptor);
    }
    fd
}

#[cfg_attr(not(debug_assertions), unsafe(no_mangle))]
pub unsafe extern "C" fn openat(
    dirfd: c_int,
    pathname: *const c_char,
    flags: c_int,
    mode: mode_t,
) -> c_int {
    if engine::should_fail() {
        errno::set(libc::EACCES);
        return -1;
    }
    let real = next_symbol!(
        openat,
        unsafe extern "C" fn(c_int, *const c_char, c_int, mode_t) -> c_int
    );
    // SAFETY: delegating to the next `openat` binding.
    let fd = unsafe { real(dirfd, pathname, flags, mode) };
    if fd != -1 {
        engine::track_create(fd as u64, Resource::Descriptor);
    }
    fd
}

#[cfg_attr(not(debug_assertions), unsafe(no_mangle))]
pub unsafe extern "C" fn creat(pathname: *const c_char, mode: mode_t) -> c_int {
    if engine::should_fail() {
        errno::set(libc::EACCES);
        return -1;
    }
    let real = next_symbol!(creat, unsafe extern "C" fn(*const c_char, mode_t) -> c_int);
    // SAFETY: delegating to the next `creat` binding.
    let fd = unsafe { real(pathname, mode) };
    if fd != -1 {
        engine::track_create(fd as u64, Resource::Descriptor);
    }
    fd
}

#[cfg_attr(not(debug_assertions), unsafe(no_mangle))]
pub unsafe extern "C" fn close(fd: c_int) -> c_int {
    engine::track_destroy(fd as u64, Resource::Descriptor, ReleaseKind::Close);
    let real = next_symbol!(close, unsafe extern "C" fn(c_int) -> c_int);
    // SAFETY: delegating to the next `close` binding.
    let mut ret = unsafe { real(fd) };
    if ret == 0 && engine::should_fail() {
        errno::set(libc::EDQUOT);
        ret = -1;
    }
    ret
}

#[cfg_attr(not(debug_assertions), unsafe(no_mangle))]
pub unsafe extern "C" fn read(fd: c_int, buf: *mut c_void, count: size_t) -> ssize_t {
    if engine::should_fail() {
        errno::set(libc::EIO);
        return -1;
    }
    let real = next_symbol!(
        read,
        unsafe extern "C" fn(c_int, *mut c_void, size_t) -> ssize_t
    );
    // SAFETY: delegating to the next `read` binding.
    unsafe { real(fd, buf, count) }
}

#[cfg_attr(not(debug_assertions), unsafe(no_mangle))]
pub unsafe extern "C" fn write(fd: c_int, buf: *const c_void, count: size_t) -> ssize_t {
    if engine::should_fail() {
        errno::set(libc::ENOSPC);
        return -1;
    }
    let real = next_symbol!(
        write,
        unsafe extern "C" fn(c_int, *const c_void, size_t) -> ssize_t
    );
    // SAFETY: delegating to the next `write` binding.
    unsafe { real(fd, buf, count) }
}
