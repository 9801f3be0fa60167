//! Patch bags: indexed access to the patches of one slide.
//!
//! Two flavours exist, matching the two kinds of patch files:
//!
//! - [`PatchBag`] serves patches that were already cut out and stored in the
//!   `imgs` array.
//! - [`CoordinateBag`] stores only coordinates and reads every patch live from
//!   the slide.
//!
//! # Read failures
//!
//! A transient [`ReadError`](crate::error::ReadError) from the slide (a
//! failed decode, a missing buffer, a timeout) never aborts iteration:
//! [`CoordinateBag`] logs the failing coordinates and substitutes a white
//! patch of the requested size. Errors that point at the caller, such as a
//! closed slide or an unknown level, are returned as
//! [`DatasetError::Read`]. Store errors, bad coordinates and a failing
//! [`PatchTransform`] are returned as well.

use image::imageops::{self, FilterType};
use image::RgbImage;
use tracing::{info, warn};

use crate::error::DatasetError;
use crate::format::placeholder_region;
use crate::slide::SlideReader;

use super::store::{int_attribute, ArrayStore, COORDS, IMGS, PATCH_LEVEL, PATCH_SIZE};

/// One dataset item: a patch and its level-0 coordinate.
pub type Patch = (RgbImage, [i64; 2]);

// =============================================================================
// PatchTransform
// =============================================================================

/// Post-read step applied to every patch read from a slide.
///
/// This is the hook for optional processing such as stain normalization.
/// Implementations are fitted once up front; `apply` is called per patch.
pub trait PatchTransform: Send + Sync {
    fn apply(&self, patch: RgbImage) -> Result<RgbImage, DatasetError>;
}

impl<F> PatchTransform for F
where
    F: Fn(RgbImage) -> Result<RgbImage, DatasetError> + Send + Sync,
{
    fn apply(&self, patch: RgbImage) -> Result<RgbImage, DatasetError> {
        self(patch)
    }
}

fn resize_to(patch: RgbImage, target: Option<u32>) -> RgbImage {
    match target {
        Some(size) if patch.dimensions() != (size, size) => {
            imageops::resize(&patch, size, size, FilterType::Triangle)
        }
        _ => patch,
    }
}

// =============================================================================
// PatchBag
// =============================================================================

/// Patches stored in the `imgs` array, with their coordinates.
pub struct PatchBag<A> {
    store: A,
    length: usize,
    patch_width: u32,
    patch_height: u32,
    target_patch_size: Option<u32>,
}

impl<A: ArrayStore> PatchBag<A> {
    /// Open a bag over `store`.
    ///
    /// Patches are resized to `target_patch_size` squared when it is set.
    pub fn new(store: A, target_patch_size: Option<u32>) -> Result<Self, DatasetError> {
        let shape = store.shape(IMGS)?;
        let &[length, height, width, 3] = shape.as_slice() else {
            return Err(DatasetError::Shape {
                array: IMGS.to_string(),
                message: format!("expected N x H x W x 3, got {shape:?}"),
            });
        };

        let to_u32 = |v: usize| {
            u32::try_from(v).map_err(|_| DatasetError::Shape {
                array: IMGS.to_string(),
                message: format!("patch extent {v} is too large"),
            })
        };

        let bag = PatchBag {
            patch_width: to_u32(width)?,
            patch_height: to_u32(height)?,
            store,
            length,
            target_patch_size: target_patch_size.filter(|size| *size > 0),
        };
        bag.summary()?;
        Ok(bag)
    }

    /// Number of patches.
    pub fn len(&self) -> usize {
        self.length
    }

    /// Whether the bag holds no patches.
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Edge length patches are resized to, if any.
    pub fn target_patch_size(&self) -> Option<u32> {
        self.target_patch_size
    }

    /// Log the `imgs` attributes and the bag settings.
    pub fn summary(&self) -> Result<(), DatasetError> {
        for (name, value) in self.store.attributes(IMGS)? {
            info!(array = IMGS, "{name} {value}");
        }
        info!(
            patches = self.length,
            target_patch_size = ?self.target_patch_size,
            "patch bag ready"
        );
        Ok(())
    }

    /// Read patch `index` and its coordinate.
    pub fn get(&self, index: usize) -> Result<Patch, DatasetError> {
        let pixels = self.store.read_u8(IMGS, index)?;
        let patch = RgbImage::from_raw(self.patch_width, self.patch_height, pixels).ok_or_else(
            || DatasetError::Shape {
                array: IMGS.to_string(),
                message: format!("row {index} does not match the patch size"),
            },
        )?;
        let coord = read_coord(&self.store, index)?;

        Ok((resize_to(patch, self.target_patch_size), coord))
    }
}

fn read_coord<A: ArrayStore>(store: &A, index: usize) -> Result<[i64; 2], DatasetError> {
    let row = store.read_i64(COORDS, index)?;
    <[i64; 2]>::try_from(row.as_slice()).map_err(|_| DatasetError::Shape {
        array: COORDS.to_string(),
        message: format!("row {index} has {} values, expected 2", row.len()),
    })
}

// =============================================================================
// CoordinateBag
// =============================================================================

/// Settings for a [`CoordinateBag`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BagOptions {
    /// Divide `patch_size` by this factor to get the output size.
    ///
    /// Ignored when `target_patch_size` is set or the factor is 1.
    pub custom_downsample: u32,

    /// Resize every patch to this edge length.
    pub target_patch_size: Option<u32>,

    /// Load all coordinates into memory when the bag is opened.
    pub fast_read: bool,
}

impl Default for BagOptions {
    fn default() -> Self {
        BagOptions {
            custom_downsample: 1,
            target_patch_size: None,
            fast_read: false,
        }
    }
}

/// Coordinates from the store, pixels read live from a slide.
pub struct CoordinateBag<A, S> {
    store: A,
    slide: S,
    length: usize,
    patch_level: usize,
    patch_size: u32,
    target_patch_size: Option<u32>,
    coords: Option<Vec<[i64; 2]>>,
    transform: Option<Box<dyn PatchTransform>>,
}

impl<A: ArrayStore, S: SlideReader> CoordinateBag<A, S> {
    /// Open a bag over the `coords` array of `store`, reading from `slide`.
    ///
    /// # Errors
    ///
    /// Fails if `coords` is missing, is not `N x 2`, lacks valid
    /// `patch_level`/`patch_size` attributes, or names a level the slide
    /// does not have.
    pub fn new(store: A, slide: S, options: BagOptions) -> Result<Self, DatasetError> {
        let shape = store.shape(COORDS)?;
        let &[length, 2] = shape.as_slice() else {
            return Err(DatasetError::Shape {
                array: COORDS.to_string(),
                message: format!("expected N x 2, got {shape:?}"),
            });
        };

        let attrs = store.attributes(COORDS)?;
        let patch_level = int_attribute(&attrs, COORDS, PATCH_LEVEL)? as usize;
        let patch_size = u32::try_from(int_attribute(&attrs, COORDS, PATCH_SIZE)?)
            .ok()
            .filter(|size| *size > 0)
            .ok_or_else(|| DatasetError::InvalidAttribute {
                array: COORDS.to_string(),
                attribute: PATCH_SIZE.to_string(),
                message: "patch size must be between 1 and u32::MAX".to_string(),
            })?;

        if patch_level >= slide.level_count() {
            return Err(DatasetError::InvalidAttribute {
                array: COORDS.to_string(),
                attribute: PATCH_LEVEL.to_string(),
                message: format!(
                    "level {patch_level} does not exist (slide has {} levels)",
                    slide.level_count()
                ),
            });
        }

        let target_patch_size = match options.target_patch_size.filter(|size| *size > 0) {
            Some(size) => Some(size),
            None if options.custom_downsample > 1 => {
                Some(patch_size / options.custom_downsample).filter(|size| *size > 0)
            }
            None => None,
        };

        let coords = if options.fast_read {
            info!(array = COORDS, "loading all coordinates");
            let flat = store.read_all_i64(COORDS)?;
            Some(flat.chunks_exact(2).map(|c| [c[0], c[1]]).collect())
        } else {
            None
        };

        let bag = CoordinateBag {
            store,
            slide,
            length,
            patch_level,
            patch_size,
            target_patch_size,
            coords,
            transform: None,
        };
        bag.summary()?;
        Ok(bag)
    }

    /// Apply `transform` to every patch after it is read.
    pub fn with_transform(mut self, transform: impl PatchTransform + 'static) -> Self {
        self.transform = Some(Box::new(transform));
        self
    }

    /// Number of patches.
    pub fn len(&self) -> usize {
        self.length
    }

    /// Whether the bag holds no patches.
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Level patches are read at.
    pub fn patch_level(&self) -> usize {
        self.patch_level
    }

    /// Edge length of patches as read from the slide.
    pub fn patch_size(&self) -> u32 {
        self.patch_size
    }

    /// Edge length patches are resized to, if any.
    pub fn target_patch_size(&self) -> Option<u32> {
        self.target_patch_size
    }

    /// The slide patches are read from.
    pub fn slide(&self) -> &S {
        &self.slide
    }

    /// Log the `coords` attributes and the bag settings.
    pub fn summary(&self) -> Result<(), DatasetError> {
        for (name, value) in self.store.attributes(COORDS)? {
            info!(array = COORDS, "{name} {value}");
        }
        info!(
            patches = self.length,
            target_patch_size = ?self.target_patch_size,
            transform = self.transform.is_some(),
            "coordinate bag ready"
        );
        Ok(())
    }

    fn coord(&self, index: usize) -> Result<[i64; 2], DatasetError> {
        match &self.coords {
            Some(coords) => coords
                .get(index)
                .copied()
                .ok_or(DatasetError::IndexOutOfRange {
                    array: COORDS.to_string(),
                    index,
                    len: coords.len(),
                }),
            None => read_coord(&self.store, index),
        }
    }

    /// Read patch `index` from the slide.
    ///
    /// A transient read failure yields a white patch; see the module docs.
    /// Any other [`ReadError`](crate::error::ReadError) is returned as
    /// [`DatasetError::Read`].
    pub fn get(&self, index: usize) -> Result<Patch, DatasetError> {
        let coord = self.coord(index)?;
        let [x, y] = coord;
        let location = u32::try_from(x)
            .ok()
            .zip(u32::try_from(y).ok())
            .ok_or(DatasetError::InvalidCoordinate { index, x, y })?;

        let size = (self.patch_size, self.patch_size);
        let patch = match self.slide.read_region(location, self.patch_level, size) {
            Ok(patch) => match &self.transform {
                Some(transform) => transform.apply(patch)?,
                None => patch,
            },
            Err(e) if e.is_transient() => {
                warn!(x, y, error = %e, "Failed to read region: {},{}", x, y);
                placeholder_region(self.patch_size, self.patch_size)
            }
            Err(e) => return Err(e.into()),
        };

        Ok((resize_to(patch, self.target_patch_size), coord))
    }
}

// =============================================================================
// Tests
// =============================================================================
