//! SlideReader trait for OpenSlide-style slide access.
//!
//! This module defines the `SlideReader` trait, the slide-like capability the
//! dataset layer consumes. It mirrors the OpenSlide object model (level
//! count, per-level dimensions and downsamples, string properties, region
//! reads and thumbnails) so that pipelines written against OpenSlide slides
//! can take an SDPC slide unchanged.
//!
//! # Usage
//!
//! The trait is implemented by [`crate::slide::SdpcSlide`]. Tests and
//! alternative backends can implement it directly.

use std::collections::BTreeMap;

use image::imageops::{self, FilterType};
use image::RgbImage;
use serde::Serialize;

use crate::error::ReadError;

/// String properties of a slide, keyed with OpenSlide property names.
pub type SlideProperties = BTreeMap<String, String>;

/// Microns per pixel along X.
pub const PROPERTY_MPP_X: &str = "openslide.mpp-x";

/// Microns per pixel along Y.
pub const PROPERTY_MPP_Y: &str = "openslide.mpp-y";

/// Scanner vendor.
pub const PROPERTY_VENDOR: &str = "openslide.vendor";

/// Scan magnification.
pub const PROPERTY_OBJECTIVE_POWER: &str = "openslide.objective-power";

/// Number of pyramid levels.
pub const PROPERTY_LEVEL_COUNT: &str = "openslide.level-count";

// =============================================================================
// Level Information
// =============================================================================

/// Information about a single pyramid level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LevelInfo {
    /// Width of this level in pixels
    pub width: u32,

    /// Height of this level in pixels
    pub height: u32,

    /// Downsample factor relative to level 0
    ///
    /// Level 0 has downsample 1.0, level 1 might have 4.0, etc.
    pub downsample: f64,
}

// =============================================================================
// SlideReader Trait
// =============================================================================

/// OpenSlide-style interface over an opened whole-slide image.
///
/// Level 0 is the highest resolution; level index increases toward lower
/// resolution. Region locations are always given in level-0 coordinates.
///
/// Implementations are not required to be `Sync`: one reader serves one
/// caller at a time. See [`crate::slide::SharedSlide`] for shared access.
pub trait SlideReader {
    /// Dimensions `(width, height)` of every level, level 0 first.
    fn level_dimensions(&self) -> &[(u32, u32)];

    /// Downsample factor of every level, level 0 first.
    fn level_downsamples(&self) -> &[f64];

    /// String properties (microns per pixel, vendor, ...).
    fn properties(&self) -> &SlideProperties;

    /// Read a region as an RGB image.
    ///
    /// # Arguments
    ///
    /// * `location` - Top-left corner `(x, y)` in level-0 coordinates
    /// * `level` - Pyramid level index (0 = highest resolution)
    /// * `size` - `(width, height)` of the region in pixels of that level
    ///
    /// # Errors
    ///
    /// A [`ReadError`] concerns this region only; the reader stays usable.
    fn read_region(
        &self,
        location: (u32, u32),
        level: usize,
        size: (u32, u32),
    ) -> Result<RgbImage, ReadError>;

    /// Release the underlying resources. Safe to call more than once.
    fn close(&mut self);

    /// Get the number of pyramid levels.
    fn level_count(&self) -> usize {
        self.level_dimensions().len()
    }

    /// Get dimensions of the full-resolution (level 0) image.
    ///
    /// Returns `(0, 0)` if the slide has no levels.
    fn dimensions(&self) -> (u32, u32) {
        self.level_dimensions().first().copied().unwrap_or((0, 0))
    }

    /// Get complete information about a level.
    ///
    /// Returns `None` if level is out of range.
    fn level_info(&self, level: usize) -> Option<LevelInfo> {
        let (width, height) = *self.level_dimensions().get(level)?;
        let downsample = *self.level_downsamples().get(level)?;
        Some(LevelInfo {
            width,
            height,
            downsample,
        })
    }

    /// Find the level best matching a downsample factor.
    ///
    /// Each level's downsample is squared before being compared with
    /// `downsample`; the level with the smallest absolute difference wins,
    /// ties going to the lower level. Existing SDPC pipelines depend on this
    /// convention, so it differs from OpenSlide's direct comparison.
    fn get_best_level_for_downsample(&self, downsample: f64) -> usize {
        best_level_by_squared_downsample(self.level_downsamples(), downsample)
    }

    /// Read the whole lowest-resolution level and resize it to `size`.
    ///
    /// The aspect ratio is not preserved: the result is exactly `size`.
    fn get_thumbnail(&self, size: (u32, u32)) -> Result<RgbImage, ReadError> {
        let (width, height) = size;
        if width == 0 || height == 0 {
            return Err(ReadError::EmptyRegion { width, height });
        }

        let level = self.level_count().checked_sub(1).ok_or(ReadError::LevelOutOfRange {
            level: 0,
            level_count: 0,
        })?;
        let extent = self.level_dimensions()[level];
        let region = self.read_region((0, 0), level, extent)?;

        Ok(imageops::resize(&region, width, height, FilterType::Triangle))
    }
}

/// Index of the level whose squared downsample is closest to `target`.
///
/// Returns 0 for an empty slice.
pub fn best_level_by_squared_downsample(downsamples: &[f64], target: f64) -> usize {
    let mut best = (0, f64::INFINITY);
    for (level, downsample) in downsamples.iter().enumerate() {
        let error = (downsample * downsample - target).abs();
        if error < best.1 {
            best = (level, error);
        }
    }
    best.0
}

// =============================================================================
// Slide Summary
// =============================================================================

/// Serializable summary of an opened slide.
#[derive(Debug, Clone, Serialize)]
pub struct SlideInfo {
    /// Full-resolution dimensions
    pub dimensions: (u32, u32),

    /// Number of pyramid levels
    pub level_count: usize,

    /// Per-level geometry, level 0 first
    pub levels: Vec<LevelInfo>,

    /// String properties
    pub properties: SlideProperties,
}

impl SlideInfo {
    /// Snapshot the metadata of a reader.
    pub fn from_reader<S: SlideReader + ?Sized>(slide: &S) -> Self {
        SlideInfo {
            dimensions: slide.dimensions(),
            level_count: slide.level_count(),
            levels: (0..slide.level_count())
                .filter_map(|level| slide.level_info(level))
                .collect(),
            properties: slide.properties().clone(),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
