use std::path::PathBuf;

use thiserror::Error;

/// Errors produced while parsing a per-level descriptor string.
///
/// The descriptor carries four positional `key=value` segments: raw width,
/// raw height, bound width and bound height.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Fewer than four segments before the terminator
    #[error("Descriptor has {found} field(s), expected 4")]
    MissingField { found: usize },

    /// A segment has no `=` between its key and value
    #[error("Missing '=' in {field} segment")]
    MissingSeparator { field: &'static str },

    /// A value is not a base-10 integer
    #[error("Invalid integer for {field}: {value:?}")]
    InvalidInteger { field: &'static str, value: String },

    /// The crop margin is larger than the raw extent
    #[error("Bound {bound} exceeds raw extent {raw}")]
    NegativeExtent { raw: i64, bound: i64 },

    /// The cropped extent does not fit in 32 bits
    #[error("Extent {extent} does not fit in 32 bits")]
    ExtentOverflow { extent: i64 },
}

/// Errors that can occur when opening a slide.
///
/// No partially usable slide is ever returned: every variant is fatal to
/// handle construction.
#[derive(Debug, Clone, Error)]
pub enum OpenError {
    /// Path cannot be passed to the native library
    #[error("Invalid slide path {path:?}: contains an interior NUL byte")]
    InvalidPath { path: PathBuf },

    /// The native open primitive returned a null handle
    ///
    /// The library does not distinguish a missing file from a corrupt header
    /// or an unsupported version.
    #[error("Failed to open slide {path:?}: decoder returned a null handle")]
    Open { path: PathBuf },

    /// Header fields are out of range
    #[error("Invalid slide header: {reason}")]
    InvalidHeader { reason: String },

    /// The native library returned no descriptor for a level
    #[error("No descriptor for level {level}")]
    MissingDescriptor { level: usize },

    /// A level descriptor could not be parsed
    #[error("Malformed descriptor for level {level}: {source}")]
    Descriptor {
        level: usize,
        #[source]
        source: ParseError,
    },

    /// A lower-resolution level is larger than level 0
    #[error("Level {level} ({width}x{height}) is larger than level 0 ({base_width}x{base_height})")]
    InconsistentPyramid {
        level: usize,
        width: u32,
        height: u32,
        base_width: u32,
        base_height: u32,
    },
}

/// Errors local to a single region, thumbnail or label read.
///
/// A `ReadError` never invalidates the slide; callers decide how to recover.
/// The default recovery strategy expected by dataset consumers is to
/// substitute a white image of the requested size and continue.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReadError {
    /// Slide has already been closed
    #[error("Slide is closed")]
    Closed,

    /// Requested level does not exist
    #[error("Level {level} out of range (slide has {level_count} levels)")]
    LevelOutOfRange { level: usize, level_count: usize },

    /// Requested region has zero width or height
    #[error("Region size {width}x{height} is empty")]
    EmptyRegion { width: u32, height: u32 },

    /// Requested region does not fit the native buffer size type
    #[error("Region size {width}x{height} is too large")]
    RegionTooLarge { width: u32, height: u32 },

    /// The native decode primitive reported failure
    #[error("Failed to decode {width}x{height} at ({x}, {y}) level {level}: status {status}")]
    Decode {
        x: u32,
        y: u32,
        level: usize,
        width: u32,
        height: u32,
        status: i32,
    },

    /// Decoded buffer cannot be viewed as a `width x height` RGB image
    #[error("Decoded buffer of {len} bytes does not hold a {width}x{height} BGR region")]
    Reinterpret { width: u32, height: u32, len: usize },

    /// Decode reported success but produced no pixels
    #[error("Decoder returned no pixel buffer for region at ({x}, {y}) level {level}")]
    NullBuffer { x: u32, y: u32, level: usize },

    /// The slide has no embedded label image
    #[error("Slide has no label image")]
    LabelUnavailable,

    /// Label bytes could not be decoded
    #[error("Failed to decode label image: {message}")]
    LabelDecode { message: String },

    /// The read did not complete in time
    #[error("Region read at ({x}, {y}) level {level} timed out after {millis} ms")]
    TimedOut {
        x: u32,
        y: u32,
        level: usize,
        millis: u128,
    },

    /// A shared slide cannot be used any more
    #[error("Slide unavailable: {reason}")]
    Unavailable { reason: String },
}

impl ReadError {
    /// Whether the failure belongs to the data rather than the caller.
    ///
    /// Decoder failures, missing buffers and timeouts can hit any single
    /// region of a healthy slide. Every other variant means the request or
    /// the handle is wrong and retrying elsewhere will not help.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ReadError::Decode { .. }
                | ReadError::NullBuffer { .. }
                | ReadError::TimedOut { .. }
                | ReadError::Unavailable { .. }
        )
    }
}

/// Umbrella error for callers that both open and read slides.
#[derive(Debug, Clone, Error)]
pub enum SlideError {
    #[error(transparent)]
    Open(#[from] OpenError),

    #[error(transparent)]
    Read(#[from] ReadError),
}

/// Errors from the patch dataset layer.
#[derive(Debug, Error)]
pub enum DatasetError {
    /// Named array is absent from the store
    #[error("Array not found: {0}")]
    MissingArray(String),

    /// Required attribute is absent
    #[error("Attribute {attribute} not found on {array}")]
    MissingAttribute { array: String, attribute: String },

    /// Attribute exists but has the wrong type or value
    #[error("Invalid attribute {attribute} on {array}: {message}")]
    InvalidAttribute {
        array: String,
        attribute: String,
        message: String,
    },

    /// Row index beyond the array length
    #[error("Index {index} out of range for {array} (length {len})")]
    IndexOutOfRange {
        array: String,
        index: usize,
        len: usize,
    },

    /// Row data does not match the declared shape
    #[error("Shape mismatch in {array}: {message}")]
    Shape { array: String, message: String },

    /// Stored coordinate cannot be used as a slide location
    #[error("Invalid coordinate ({x}, {y}) at index {index}")]
    InvalidCoordinate { index: usize, x: i64, y: i64 },

    /// Slide read failed in a way a placeholder patch must not hide
    #[error("Slide read failed: {0}")]
    Read(#[from] ReadError),

    /// Post-read transform failed
    #[error("Patch transform failed: {0}")]
    Transform(String),

    /// Slide list could not be parsed
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Underlying file error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
