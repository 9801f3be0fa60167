//! SDPC slide handle.
//!
//! [`SdpcSlide`] owns one opened slide in the vendor library. All pyramid
//! metadata is read once when the slide is opened; afterwards the handle is
//! read-only until it is closed.
//!
//! # Pyramid geometry
//!
//! The native header carries a level count (`hierarchy`) and a per-level
//! scale factor (`scale`, e.g. 0.25). Level `i` has downsample
//! `(1 / scale)^i`, so level 0 is always 1.0. Level dimensions come from
//! the per-level descriptor strings (see [`crate::format::descriptor`]).
//!
//! # Lifetime
//!
//! The handle is move-only. [`SdpcSlide::close`] disposes of the native
//! slide at most once and is also run on drop, so a slide can be closed
//! explicitly, implicitly, or both.

use std::ffi::CString;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use image::{ImageFormat, RgbImage};
use libc::{c_int, c_uint};
use tracing::{debug, error};

use crate::error::{OpenError, ReadError};
use crate::ffi::{DecoderLibrary, NativeBuffer, RawSlide, SlideHeader};
use crate::format::{bgr_to_rgb, parse_level_descriptor, region_buffer_len};

use super::reader::{
    SlideProperties, SlideReader, PROPERTY_LEVEL_COUNT, PROPERTY_MPP_X, PROPERTY_MPP_Y,
    PROPERTY_OBJECTIVE_POWER, PROPERTY_VENDOR,
};

/// Vendor name reported in the slide properties.
pub const SDPC_VENDOR: &str = "TEKSQRAY";

// =============================================================================
// SdpcSlide
// =============================================================================

/// An opened SDPC slide.
///
/// # Thread Safety
///
/// `SdpcSlide` is `Send` but not `Sync`: it may be moved to a worker thread,
/// but the vendor does not document the library as thread-safe, so a handle
/// must not be used by two callers at once. Open one slide per worker, or
/// wrap it in [`crate::slide::SharedSlide`].
pub struct SdpcSlide<L: DecoderLibrary> {
    library: Arc<L>,

    /// `None` once closed
    raw: Option<RawSlide>,

    path: PathBuf,
    level_downsamples: Vec<f64>,
    level_dimensions: Vec<(u32, u32)>,
    scan_magnification: f64,
    sampling_rate: f64,
    properties: SlideProperties,
}

// SAFETY: the raw handle is exclusively owned by this value and only used
// through `&self`/`&mut self`. The missing `Sync` impl keeps concurrent use
// of one handle out of safe code.
unsafe impl<L: DecoderLibrary> Send for SdpcSlide<L> {}

impl<L: DecoderLibrary> SdpcSlide<L> {
    /// Open a slide and read its pyramid metadata.
    ///
    /// No pixels are decoded. Every level descriptor is parsed eagerly; if
    /// anything fails after the native open succeeded, the native slide is
    /// closed before the error is returned.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The path contains a NUL byte
    /// - The library cannot open the file (missing, corrupt, unsupported)
    /// - The header is out of range
    /// - A level descriptor is missing or malformed
    /// - A lower level is larger than level 0
    pub fn open(library: Arc<L>, path: impl AsRef<Path>) -> Result<Self, OpenError> {
        let path = path.as_ref().to_path_buf();
        let c_path = path_to_c_string(&path)?;

        let raw = library
            .open(&c_path)
            .ok_or_else(|| OpenError::Open { path: path.clone() })?;

        // From here on dropping `slide` closes the native handle.
        let mut slide = SdpcSlide {
            library,
            raw: Some(raw),
            path,
            level_downsamples: Vec::new(),
            level_dimensions: Vec::new(),
            scan_magnification: 0.0,
            sampling_rate: 0.0,
            properties: SlideProperties::new(),
        };

        // SAFETY: `raw` was just returned by `open` on this library.
        let header = unsafe { slide.library.header(raw) };
        let level_count = validate_header(&header)?;

        slide.level_downsamples = level_downsamples(header.scale, level_count);
        slide.level_dimensions = slide.load_level_dimensions(raw, level_count)?;
        check_pyramid(&slide.level_dimensions)?;

        slide.scan_magnification = header.rate;
        slide.sampling_rate = header.scale;
        slide.properties = build_properties(&header, level_count);

        debug!(
            path = %slide.path.display(),
            levels = level_count,
            width = slide.level_dimensions[0].0,
            height = slide.level_dimensions[0].1,
            "opened slide"
        );

        Ok(slide)
    }

    /// Parse the descriptor of every level.
    fn load_level_dimensions(
        &self,
        raw: RawSlide,
        level_count: usize,
    ) -> Result<Vec<(u32, u32)>, OpenError> {
        let library = self.library.as_ref();

        (0..level_count)
            .map(|level| {
                // SAFETY: `raw` is open; the returned string is owned by the
                // guard and released when it drops.
                let descriptor = unsafe {
                    NativeBuffer::from_raw(
                        library,
                        library.level_descriptor(raw, level as c_int).cast(),
                    )
                };
                // SAFETY: descriptors are NUL-terminated.
                let text = unsafe { descriptor.as_c_str() }
                    .ok_or(OpenError::MissingDescriptor { level })?;

                let parsed = parse_level_descriptor(text.to_bytes_with_nul())
                    .map_err(|source| OpenError::Descriptor { level, source })?;
                Ok(parsed.dimensions())
            })
            .collect()
    }

    /// Path the slide was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether [`SdpcSlide::close`] has run.
    pub fn is_closed(&self) -> bool {
        self.raw.is_none()
    }

    /// Scan magnification from the native header.
    pub fn scan_magnification(&self) -> f64 {
        self.scan_magnification
    }

    /// Sampling rate (the per-level scale factor) from the native header.
    pub fn sampling_rate(&self) -> f64 {
        self.sampling_rate
    }

    /// Map a level-0 location to the coordinates of `level`.
    ///
    /// Returns `None` if level is out of range.
    pub fn native_origin(&self, location: (u32, u32), level: usize) -> Option<(u32, u32)> {
        let downsample = *self.level_downsamples.get(level)?;
        let scale = |v: u32| (f64::from(v) / downsample).floor() as u32;
        Some((scale(location.0), scale(location.1)))
    }

    /// Copy the compressed (JPEG) label image out of the library.
    ///
    /// # Errors
    ///
    /// Returns [`ReadError::LabelUnavailable`] if the slide carries no label.
    pub fn label_jpeg(&self) -> Result<Bytes, ReadError> {
        let raw = self.raw.ok_or(ReadError::Closed)?;
        let library = self.library.as_ref();

        let mut width: c_uint = 0;
        let mut height: c_uint = 0;
        let mut size: usize = 0;

        // SAFETY: `raw` is open and the out-parameters are valid locals.
        let jpeg = unsafe {
            NativeBuffer::from_raw(
                library,
                library.label_jpeg(raw, &mut width, &mut height, &mut size),
            )
        };

        if size == 0 {
            return Err(ReadError::LabelUnavailable);
        }

        // SAFETY: the library reports `size` readable bytes.
        let bytes = unsafe { jpeg.as_slice(size) }.ok_or(ReadError::LabelUnavailable)?;
        debug!(width, height, size, "read label image");

        Ok(Bytes::copy_from_slice(bytes))
    }

    /// Decode the label image into an RGB image.
    ///
    /// The compressed bytes are decoded in memory; the native buffer is
    /// released before decoding starts.
    pub fn label_image(&self) -> Result<RgbImage, ReadError> {
        let jpeg = self.label_jpeg()?;

        let image = image::load_from_memory_with_format(&jpeg, ImageFormat::Jpeg).map_err(|e| {
            ReadError::LabelDecode {
                message: e.to_string(),
            }
        })?;

        Ok(image.to_rgb8())
    }

    /// Dispose of the native slide.
    ///
    /// Runs the native close at most once; later calls do nothing. Never
    /// panics: a failing close is logged and the handle is abandoned.
    pub fn close(&mut self) {
        let Some(raw) = self.raw.take() else {
            return;
        };

        let library = self.library.as_ref();
        // SAFETY: `raw` was open and has been taken out of `self`, so it is
        // never used again.
        let result = panic::catch_unwind(AssertUnwindSafe(|| unsafe { library.close(raw) }));

        match result {
            Ok(()) => debug!(path = %self.path.display(), "closed slide"),
            Err(_) => error!(path = %self.path.display(), "native close failed; handle abandoned"),
        }
    }
}

impl<L: DecoderLibrary> SlideReader for SdpcSlide<L> {
    fn level_dimensions(&self) -> &[(u32, u32)] {
        &self.level_dimensions
    }

    fn level_downsamples(&self) -> &[f64] {
        &self.level_downsamples
    }

    fn properties(&self) -> &SlideProperties {
        &self.properties
    }

    fn read_region(
        &self,
        location: (u32, u32),
        level: usize,
        size: (u32, u32),
    ) -> Result<RgbImage, ReadError> {
        let raw = self.raw.ok_or(ReadError::Closed)?;
        let (width, height) = size;

        let (native_x, native_y) = self
            .native_origin(location, level)
            .ok_or(ReadError::LevelOutOfRange {
                level,
                level_count: self.level_count(),
            })?;
        if width == 0 || height == 0 {
            return Err(ReadError::EmptyRegion { width, height });
        }
        let len = region_buffer_len(width, height)
            .filter(|_| c_int::try_from(width).is_ok() && c_int::try_from(height).is_ok())
            .ok_or(ReadError::RegionTooLarge { width, height })?;

        let library = self.library.as_ref();
        let mut pixels = NativeBuffer::empty(library);

        // SAFETY: `raw` is open and `out_ptr` points into the guard.
        let status = unsafe {
            library.decode_region(
                raw,
                pixels.out_ptr(),
                width as c_int,
                height as c_int,
                native_x,
                native_y,
                level as c_int,
            )
        };

        if status != 0 {
            return Err(ReadError::Decode {
                x: location.0,
                y: location.1,
                level,
                width,
                height,
                status,
            });
        }

        // SAFETY: on success the library allocates width * height * 3 bytes.
        let bgr = unsafe { pixels.as_slice(len) }.ok_or(ReadError::NullBuffer {
            x: location.0,
            y: location.1,
            level,
        })?;

        rgb_region(bgr, width, height)
    }

    fn close(&mut self) {
        SdpcSlide::close(self);
    }
}

impl<L: DecoderLibrary> Drop for SdpcSlide<L> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<L: DecoderLibrary> std::fmt::Debug for SdpcSlide<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SdpcSlide")
            .field("path", &self.path)
            .field("closed", &self.is_closed())
            .field("level_dimensions", &self.level_dimensions)
            .field("level_downsamples", &self.level_downsamples)
            .finish()
    }
}

// =============================================================================
// Helpers
// =============================================================================

#[cfg(unix)]
fn path_to_c_string(path: &Path) -> Result<CString, OpenError> {
    use std::os::unix::ffi::OsStrExt;

    CString::new(path.as_os_str().as_bytes()).map_err(|_| OpenError::InvalidPath {
        path: path.to_path_buf(),
    })
}

#[cfg(not(unix))]
fn path_to_c_string(path: &Path) -> Result<CString, OpenError> {
    CString::new(path.to_string_lossy().as_bytes()).map_err(|_| OpenError::InvalidPath {
        path: path.to_path_buf(),
    })
}

/// Reinterpret a decoded BGR buffer as an RGB region.
fn rgb_region(bgr: &[u8], width: u32, height: u32) -> Result<RgbImage, ReadError> {
    bgr_to_rgb(bgr, width, height).ok_or(ReadError::Reinterpret {
        width,
        height,
        len: bgr.len(),
    })
}

/// Upper bound on the header level count.
///
/// Real pyramids have well under twenty levels; anything larger is a corrupt
/// header and is rejected before any per-level allocation.
pub const MAX_LEVEL_COUNT: usize = 64;

/// Check the header and return the level count.
fn validate_header(header: &SlideHeader) -> Result<usize, OpenError> {
    let level_count = usize::try_from(header.hierarchy)
        .ok()
        .filter(|count| (1..=MAX_LEVEL_COUNT).contains(count))
        .ok_or_else(|| OpenError::InvalidHeader {
            reason: format!(
                "level count must be between 1 and {MAX_LEVEL_COUNT}, got {}",
                header.hierarchy
            ),
        })?;

    if !header.scale.is_finite() || header.scale <= 0.0 {
        return Err(OpenError::InvalidHeader {
            reason: format!("scale must be positive, got {}", header.scale),
        });
    }

    // Downsamples must increase strictly with level
    if level_count > 1 && header.scale >= 1.0 {
        return Err(OpenError::InvalidHeader {
            reason: format!(
                "scale must be below 1 for a {level_count}-level pyramid, got {}",
                header.scale
            ),
        });
    }

    Ok(level_count)
}

/// Downsample of every level: `(1 / scale)^level`.
fn level_downsamples(scale: f64, level_count: usize) -> Vec<f64> {
    let rate = 1.0 / scale;
    (0..level_count).map(|level| rate.powi(level as i32)).collect()
}

/// Level 0 must be at least as large as every other level.
fn check_pyramid(dimensions: &[(u32, u32)]) -> Result<(), OpenError> {
    let Some(&(base_width, base_height)) = dimensions.first() else {
        return Ok(());
    };

    for (level, &(width, height)) in dimensions.iter().enumerate().skip(1) {
        if width > base_width || height > base_height {
            return Err(OpenError::InconsistentPyramid {
                level,
                width,
                height,
                base_width,
                base_height,
            });
        }
    }

    Ok(())
}

fn build_properties(header: &SlideHeader, level_count: usize) -> SlideProperties {
    let mut properties = SlideProperties::new();
    properties.insert(PROPERTY_MPP_X.to_string(), header.scale.to_string());
    properties.insert(PROPERTY_MPP_Y.to_string(), header.scale.to_string());
    properties.insert(PROPERTY_VENDOR.to_string(), SDPC_VENDOR.to_string());
    properties.insert(PROPERTY_OBJECTIVE_POWER.to_string(), header.rate.to_string());
    properties.insert(PROPERTY_LEVEL_COUNT.to_string(), level_count.to_string());
    properties
}

// =============================================================================
// Tests
// =============================================================================
