//! Bindings to the vendor `libDecodeSdpc` shared library.
//!
//! Compiled only with the `native` feature. The library must be on the linker
//! search path (e.g. via `RUSTFLAGS="-L /opt/sdpc/lib"`) and on the runtime
//! loader path.
//!
//! Only the leading fields of the vendor structures are declared; Rust never
//! allocates them, it only reads through pointers the library returns.

use std::ffi::CStr;
use std::ptr::NonNull;

use libc::{c_char, c_double, c_int, c_uint, c_ushort, c_void, size_t};

use super::{DecoderLibrary, RawSlide, SlideHeader};

/// Leading fields of the vendor `SqPicHead` structure.
#[repr(C)]
pub struct SqPicHead {
    pub flag: c_ushort,
    pub width: c_uint,
    pub height: c_uint,
    pub tile_width: c_uint,
    pub tile_height: c_uint,
    pub thumbnail_width: c_uint,
    pub thumbnail_height: c_uint,
    pub hierarchy: c_int,
    pub scale: c_double,
    pub ruler: c_double,
    pub rate: c_uint,
}

/// Leading fields of the vendor `SqSdpcInfo` structure.
#[repr(C)]
pub struct SqSdpcInfo {
    pub file_name: *mut c_char,
    pub pic_head: *mut SqPicHead,
}

#[link(name = "DecodeSdpc")]
extern "C" {
    fn SqOpenSdpc(path: *const c_char) -> *mut SqSdpcInfo;

    fn SqCloseSdpc(info: *mut SqSdpcInfo);

    fn SqGetRoiRgbOfSpecifyLayer(
        info: *mut SqSdpcInfo,
        rgb: *mut *mut u8,
        width: c_int,
        height: c_int,
        x: c_uint,
        y: c_uint,
        level: c_int,
    ) -> c_int;

    fn GetLayerInfo(info: *mut SqSdpcInfo, level: c_int) -> *mut c_char;

    fn GetLabelJpeg(
        info: *mut SqSdpcInfo,
        width: *mut c_uint,
        height: *mut c_uint,
        size: *mut size_t,
    ) -> *mut u8;

    fn Dispose(ptr: *mut c_void);
}

/// The linked vendor library.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeLibrary;

impl NativeLibrary {
    fn info(slide: RawSlide) -> *mut SqSdpcInfo {
        slide.as_ptr().cast()
    }
}

impl DecoderLibrary for NativeLibrary {
    fn open(&self, path: &CStr) -> Option<RawSlide> {
        // SAFETY: `path` is a valid NUL-terminated string for the duration
        // of the call.
        let info = unsafe { SqOpenSdpc(path.as_ptr()) };
        NonNull::new(info.cast())
    }

    unsafe fn close(&self, slide: RawSlide) {
        SqCloseSdpc(Self::info(slide));
    }

    unsafe fn header(&self, slide: RawSlide) -> SlideHeader {
        let head = (*Self::info(slide)).pic_head;
        if head.is_null() {
            return SlideHeader {
                hierarchy: 0,
                scale: 0.0,
                rate: 0.0,
            };
        }

        SlideHeader {
            hierarchy: (*head).hierarchy,
            scale: (*head).scale,
            rate: f64::from((*head).rate),
        }
    }

    unsafe fn decode_region(
        &self,
        slide: RawSlide,
        out: *mut *mut u8,
        width: c_int,
        height: c_int,
        x: c_uint,
        y: c_uint,
        level: c_int,
    ) -> c_int {
        SqGetRoiRgbOfSpecifyLayer(Self::info(slide), out, width, height, x, y, level)
    }

    unsafe fn level_descriptor(&self, slide: RawSlide, level: c_int) -> *mut c_char {
        GetLayerInfo(Self::info(slide), level)
    }

    unsafe fn label_jpeg(
        &self,
        slide: RawSlide,
        width: *mut c_uint,
        height: *mut c_uint,
        size: *mut usize,
    ) -> *mut u8 {
        GetLabelJpeg(Self::info(slide), width, height, size)
    }

    unsafe fn release(&self, ptr: *mut c_void) {
        Dispose(ptr);
    }
}
