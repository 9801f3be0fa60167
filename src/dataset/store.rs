//! Array store boundary.
//!
//! Patch files produced by the tiling step hold two arrays:
//!
//! - `imgs`: `N x H x W x 3` unsigned bytes, one RGB patch per row
//! - `coords`: `N x 2` signed integers, the level-0 `(x, y)` of each patch,
//!   with `patch_level` and `patch_size` attributes
//!
//! The on-disk container is not this crate's concern. [`ArrayStore`] is the
//! narrow interface the bags need: shapes, attributes and row reads by index.
//! [`MemoryStore`] implements it in memory.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::error::DatasetError;

/// Name of the patch pixel array.
pub const IMGS: &str = "imgs";

/// Name of the patch coordinate array.
pub const COORDS: &str = "coords";

/// Pyramid level the coordinates were extracted at.
pub const PATCH_LEVEL: &str = "patch_level";

/// Edge length of the square patches, in pixels of `patch_level`.
pub const PATCH_SIZE: &str = "patch_size";

// =============================================================================
// Attributes
// =============================================================================

/// A scalar attribute attached to an array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Int(v) => write!(f, "{v}"),
            AttrValue::Float(v) => write!(f, "{v}"),
            AttrValue::Text(v) => f.write_str(v),
        }
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        AttrValue::Int(v)
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        AttrValue::Float(v)
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        AttrValue::Text(v.to_string())
    }
}

/// Attributes of one array, sorted by name.
pub type Attributes = BTreeMap<String, AttrValue>;

/// Read a non-negative integer attribute.
pub fn int_attribute(attrs: &Attributes, array: &str, name: &str) -> Result<i64, DatasetError> {
    match attrs.get(name) {
        Some(AttrValue::Int(v)) if *v >= 0 => Ok(*v),
        Some(other) => Err(DatasetError::InvalidAttribute {
            array: array.to_string(),
            attribute: name.to_string(),
            message: format!("expected a non-negative integer, got {other}"),
        }),
        None => Err(DatasetError::MissingAttribute {
            array: array.to_string(),
            attribute: name.to_string(),
        }),
    }
}

// =============================================================================
// ArrayStore Trait
// =============================================================================

/// Read access to named arrays with attached attributes.
pub trait ArrayStore {
    /// Shape of an array, outermost dimension first.
    fn shape(&self, name: &str) -> Result<Vec<usize>, DatasetError>;

    /// Attributes attached to an array.
    fn attributes(&self, name: &str) -> Result<Attributes, DatasetError>;

    /// Read one row of an unsigned byte array.
    fn read_u8(&self, name: &str, index: usize) -> Result<Vec<u8>, DatasetError>;

    /// Read one row of a signed integer array.
    fn read_i64(&self, name: &str, index: usize) -> Result<Vec<i64>, DatasetError>;

    /// Number of rows in an array.
    fn len(&self, name: &str) -> Result<usize, DatasetError> {
        Ok(self.shape(name)?.first().copied().unwrap_or(0))
    }

    /// Read a whole signed integer array, row after row.
    fn read_all_i64(&self, name: &str) -> Result<Vec<i64>, DatasetError> {
        let mut all = Vec::new();
        for index in 0..self.len(name)? {
            all.extend(self.read_i64(name, index)?);
        }
        Ok(all)
    }
}

// =============================================================================
// MemoryStore
// =============================================================================

#[derive(Debug, Clone)]
enum ArrayData {
    U8(Vec<u8>),
    I64(Vec<i64>),
}

#[derive(Debug, Clone)]
struct MemoryArray {
    shape: Vec<usize>,
    data: ArrayData,
    attributes: Attributes,
}

impl MemoryArray {
    fn row_len(&self) -> usize {
        self.shape.iter().skip(1).product()
    }

    fn row_range(&self, name: &str, index: usize) -> Result<std::ops::Range<usize>, DatasetError> {
        let rows = self.shape.first().copied().unwrap_or(0);
        if index >= rows {
            return Err(DatasetError::IndexOutOfRange {
                array: name.to_string(),
                index,
                len: rows,
            });
        }
        let row_len = self.row_len();
        Ok(index * row_len..(index + 1) * row_len)
    }
}

/// In-memory [`ArrayStore`].
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    arrays: HashMap<String, MemoryArray>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(
        &mut self,
        name: &str,
        shape: Vec<usize>,
        data: ArrayData,
        len: usize,
    ) -> Result<(), DatasetError> {
        let expected: usize = shape.iter().product();
        if expected != len {
            return Err(DatasetError::Shape {
                array: name.to_string(),
                message: format!("shape {shape:?} needs {expected} elements, got {len}"),
            });
        }
        self.arrays.insert(
            name.to_string(),
            MemoryArray {
                shape,
                data,
                attributes: Attributes::new(),
            },
        );
        Ok(())
    }

    /// Add an unsigned byte array.
    pub fn with_u8_array(
        mut self,
        name: &str,
        shape: Vec<usize>,
        data: Vec<u8>,
    ) -> Result<Self, DatasetError> {
        let len = data.len();
        self.insert(name, shape, ArrayData::U8(data), len)?;
        Ok(self)
    }

    /// Add a signed integer array.
    pub fn with_i64_array(
        mut self,
        name: &str,
        shape: Vec<usize>,
        data: Vec<i64>,
    ) -> Result<Self, DatasetError> {
        let len = data.len();
        self.insert(name, shape, ArrayData::I64(data), len)?;
        Ok(self)
    }

    /// Attach an attribute to an existing array.
    pub fn with_attribute(
        mut self,
        array: &str,
        name: &str,
        value: impl Into<AttrValue>,
    ) -> Result<Self, DatasetError> {
        let entry = self
            .arrays
            .get_mut(array)
            .ok_or_else(|| DatasetError::MissingArray(array.to_string()))?;
        entry.attributes.insert(name.to_string(), value.into());
        Ok(self)
    }

    /// Store equally sized patches as the `imgs` array.
    pub fn with_patches(self, patches: &[RgbImage]) -> Result<Self, DatasetError> {
        let (width, height) = patches.first().map(|p| p.dimensions()).unwrap_or((0, 0));
        let mut data = Vec::with_capacity(patches.len() * (width * height * 3) as usize);
        for (index, patch) in patches.iter().enumerate() {
            if patch.dimensions() != (width, height) {
                return Err(DatasetError::Shape {
                    array: IMGS.to_string(),
                    message: format!(
                        "patch {index} is {:?}, expected {:?}",
                        patch.dimensions(),
                        (width, height)
                    ),
                });
            }
            data.extend_from_slice(patch.as_raw());
        }
        self.with_u8_array(
            IMGS,
            vec![patches.len(), height as usize, width as usize, 3],
            data,
        )
    }

    /// Store coordinates as the `coords` array with its attributes.
    pub fn with_coords(
        self,
        coords: &[[i64; 2]],
        patch_level: usize,
        patch_size: u32,
    ) -> Result<Self, DatasetError> {
        let data = coords.iter().flatten().copied().collect();
        self.with_i64_array(COORDS, vec![coords.len(), 2], data)?
            .with_attribute(COORDS, PATCH_LEVEL, patch_level as i64)?
            .with_attribute(COORDS, PATCH_SIZE, i64::from(patch_size))
    }

    fn array(&self, name: &str) -> Result<&MemoryArray, DatasetError> {
        self.arrays
            .get(name)
            .ok_or_else(|| DatasetError::MissingArray(name.to_string()))
    }
}

impl ArrayStore for MemoryStore {
    fn shape(&self, name: &str) -> Result<Vec<usize>, DatasetError> {
        Ok(self.array(name)?.shape.clone())
    }

    fn attributes(&self, name: &str) -> Result<Attributes, DatasetError> {
        Ok(self.array(name)?.attributes.clone())
    }

    fn read_u8(&self, name: &str, index: usize) -> Result<Vec<u8>, DatasetError> {
        let array = self.array(name)?;
        let range = array.row_range(name, index)?;
        match &array.data {
            ArrayData::U8(data) => Ok(data[range].to_vec()),
            ArrayData::I64(_) => Err(DatasetError::Shape {
                array: name.to_string(),
                message: "expected u8 elements, array holds i64".to_string(),
            }),
        }
    }

    fn read_i64(&self, name: &str, index: usize) -> Result<Vec<i64>, DatasetError> {
        let array = self.array(name)?;
        let range = array.row_range(name, index)?;
        match &array.data {
            ArrayData::I64(data) => Ok(data[range].to_vec()),
            ArrayData::U8(_) => Err(DatasetError::Shape {
                array: name.to_string(),
                message: "expected i64 elements, array holds u8".to_string(),
            }),
        }
    }
}
