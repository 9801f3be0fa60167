//! Boundary with the vendor SDPC decoding library.
//!
//! The vendor ships a closed shared library (`libDecodeSdpc`) exposing a small
//! C surface. [`DecoderLibrary`] mirrors that surface one function per
//! primitive so the slide wrapper can be driven either by the real library
//! ([`native::NativeLibrary`], behind the `native` feature) or by a test
//! double.
//!
//! # Ownership
//!
//! Every pointer the library hands out (pixel buffers, descriptor strings,
//! label JPEG bytes) stays owned by the library until it is passed back to
//! [`DecoderLibrary::release`]. [`NativeBuffer`] pairs each acquisition with
//! exactly one release on every exit path.
//!
//! ```text
//! ┌──────────────────────────────┐
//! │          SdpcSlide           │
//! └──────────────┬───────────────┘
//!                │  NativeBuffer brackets each call
//!                ▼
//! ┌──────────────────────────────┐
//! │    DecoderLibrary (trait)    │
//! └──────┬────────────────┬──────┘
//!        ▼                ▼
//!  NativeLibrary     test doubles
//!  (libDecodeSdpc)
//! ```

mod buffer;
#[cfg(feature = "native")]
pub mod native;
#[cfg(test)]
pub(crate) mod testing;

use std::ffi::CStr;
use std::ptr::NonNull;

use libc::{c_char, c_int, c_uint, c_void};

pub use buffer::NativeBuffer;
#[cfg(feature = "native")]
pub use native::NativeLibrary;

/// Opaque handle to an opened slide, owned by the library.
pub type RawSlide = NonNull<c_void>;

/// Header fields read from an opened slide without decoding anything.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlideHeader {
    /// Number of pyramid levels
    pub hierarchy: i32,

    /// Per-level scale factor; level `i` is `scale^i` of level 0
    pub scale: f64,

    /// Scan magnification
    pub rate: f64,
}

/// The vendor decoder's foreign-function surface.
///
/// Implementations must be callable from any thread, but a single
/// [`RawSlide`] is only ever used by one caller at a time.
///
/// # Safety
///
/// For every `unsafe` method, `slide` must have been returned by
/// [`DecoderLibrary::open`] on the same library and not yet closed. Pointers
/// returned by the library must only be released through
/// [`DecoderLibrary::release`] on the same library, exactly once.
pub trait DecoderLibrary: Send + Sync {
    /// Open a slide file. Returns `None` if the library returns null.
    fn open(&self, path: &CStr) -> Option<RawSlide>;

    /// Dispose of an opened slide.
    ///
    /// # Safety
    ///
    /// `slide` must be open and must not be used afterwards.
    unsafe fn close(&self, slide: RawSlide);

    /// Read the pyramid header of an opened slide.
    ///
    /// # Safety
    ///
    /// `slide` must be open.
    unsafe fn header(&self, slide: RawSlide) -> SlideHeader;

    /// Decode a `width x height` BGR region at level coordinates `(x, y)`.
    ///
    /// On return `*out` may point at a library-owned buffer, even when the
    /// returned status is non-zero. Status `0` means success.
    ///
    /// # Safety
    ///
    /// `slide` must be open and `out` must be valid for writes.
    unsafe fn decode_region(
        &self,
        slide: RawSlide,
        out: *mut *mut u8,
        width: c_int,
        height: c_int,
        x: c_uint,
        y: c_uint,
        level: c_int,
    ) -> c_int;

    /// Fetch the NUL-terminated geometry descriptor of a level.
    ///
    /// # Safety
    ///
    /// `slide` must be open.
    unsafe fn level_descriptor(&self, slide: RawSlide, level: c_int) -> *mut c_char;

    /// Fetch the JPEG-compressed label image.
    ///
    /// The pixel dimensions and the byte length of the returned buffer are
    /// written through the out-parameters.
    ///
    /// # Safety
    ///
    /// `slide` must be open and the out-parameters valid for writes.
    unsafe fn label_jpeg(
        &self,
        slide: RawSlide,
        width: *mut c_uint,
        height: *mut c_uint,
        size: *mut usize,
    ) -> *mut u8;

    /// Release a pointer previously returned by this library.
    ///
    /// # Safety
    ///
    /// `ptr` must come from this library and must not be released twice.
    unsafe fn release(&self, ptr: *mut c_void);
}
