//! Scoped ownership of library-allocated buffers.

use std::ffi::CStr;
use std::fmt;
use std::ptr;
use std::slice;

use libc::c_char;

use super::DecoderLibrary;

/// A pointer owned by the decoder library, released when the guard drops.
///
/// A guard is created before the native call that fills it, so the buffer is
/// released on every exit path: success, a failure status from the library,
/// or an error raised while converting the data. A null pointer is never
/// passed to the release primitive.
///
/// The guard borrows the library and cannot outlive the call that created it.
pub struct NativeBuffer<'lib, L: DecoderLibrary + ?Sized> {
    library: &'lib L,
    ptr: *mut u8,
}

impl<'lib, L: DecoderLibrary + ?Sized> NativeBuffer<'lib, L> {
    /// Create an empty guard to be filled through [`NativeBuffer::out_ptr`].
    pub fn empty(library: &'lib L) -> Self {
        NativeBuffer {
            library,
            ptr: ptr::null_mut(),
        }
    }

    /// Take ownership of a pointer returned by `library`.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or a live pointer allocated by `library` that no
    /// other guard owns.
    pub unsafe fn from_raw(library: &'lib L, ptr: *mut u8) -> Self {
        NativeBuffer { library, ptr }
    }

    /// Out-parameter for primitives that return a buffer by pointer.
    ///
    /// Only call this on an empty guard; anything already held would be
    /// overwritten by the library.
    pub fn out_ptr(&mut self) -> *mut *mut u8 {
        debug_assert!(self.ptr.is_null(), "out_ptr on a filled NativeBuffer");
        &mut self.ptr
    }

    /// Whether the library has handed out a buffer.
    pub fn is_null(&self) -> bool {
        self.ptr.is_null()
    }

    /// View the first `len` bytes of the buffer.
    ///
    /// Returns `None` if the buffer is null.
    ///
    /// # Safety
    ///
    /// The library must have allocated at least `len` readable bytes.
    pub unsafe fn as_slice(&self, len: usize) -> Option<&[u8]> {
        if self.ptr.is_null() {
            return None;
        }
        Some(slice::from_raw_parts(self.ptr, len))
    }

    /// View the buffer as a NUL-terminated string.
    ///
    /// Returns `None` if the buffer is null.
    ///
    /// # Safety
    ///
    /// The buffer must contain a NUL byte within its allocation.
    pub unsafe fn as_c_str(&self) -> Option<&CStr> {
        if self.ptr.is_null() {
            return None;
        }
        Some(CStr::from_ptr(self.ptr.cast::<c_char>()))
    }
}

impl<L: DecoderLibrary + ?Sized> Drop for NativeBuffer<'_, L> {
    fn drop(&mut self) {
        if !self.ptr.is_null() {
            // SAFETY: the pointer came from this library and this guard is
            // its only owner.
            unsafe { self.library.release(self.ptr.cast()) };
            self.ptr = ptr::null_mut();
        }
    }
}

impl<L: DecoderLibrary + ?Sized> fmt::Debug for NativeBuffer<'_, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeBuffer").field("ptr", &self.ptr).finish()
    }
}
