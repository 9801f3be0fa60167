//! # sdpc-slide
//!
//! OpenSlide-style access to SDPC whole slide images.
//!
//! SDPC slides can only be decoded by the vendor's closed `libDecodeSdpc`
//! library. This crate wraps that library behind a safe, owned slide object
//! and builds the patch datasets used for feature extraction on top of it.
//!
//! ## Features
//!
//! - **Safe handle**: every native buffer is released exactly once, and the
//!   slide closes itself when dropped
//! - **OpenSlide-style API**: level dimensions, downsamples, properties,
//!   region reads, best-level search and thumbnails
//! - **Async access**: [`SharedSlide`] serializes calls onto tokio's blocking
//!   pool with optional timeouts
//! - **Patch datasets**: bags of stored patches or of coordinates read live
//!   from a slide, and CSV slide lists
//!
//! ## Architecture
//!
//! - [`ffi`] - Vendor library boundary and buffer ownership
//! - [`mod@format`] - Level descriptor parsing and pixel conversion
//! - [`slide`] - Slide trait, SDPC handle and shared wrapper
//! - [`dataset`] - Patch bags and slide lists
//! - [`config`] - CLI configuration types
//!
//! The real library binding is compiled with the `native` feature, which
//! links against `libDecodeSdpc`.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use sdpc_slide::{NativeLibrary, SdpcSlide, SlideReader};
//!
//! let slide = SdpcSlide::open(Arc::new(NativeLibrary), "case-01.sdpc")?;
//! println!("{:?}", slide.level_dimensions());
//! let region = slide.read_region((4096, 4096), 1, (512, 512))?;
//! region.save("region.png")?;
//! ```

pub mod config;
pub mod dataset;
pub mod error;
pub mod ffi;
pub mod format;
pub mod slide;

// Re-export commonly used types
pub use config::{Cli, Command, InfoConfig, LabelConfig, RegionConfig, ThumbnailConfig};
pub use dataset::{
    ArrayStore, BagOptions, CoordinateBag, MemoryStore, Patch, PatchBag, PatchTransform,
    SlideEntry, SlideList,
};
pub use error::{DatasetError, OpenError, ParseError, ReadError, SlideError};
pub use ffi::{DecoderLibrary, NativeBuffer, RawSlide, SlideHeader};
#[cfg(feature = "native")]
pub use ffi::NativeLibrary;
pub use format::{parse_level_descriptor, LevelDescriptor};
pub use slide::{
    LevelInfo, SdpcSlide, SharedSlide, SlideInfo, SlideProperties, SlideReader, SDPC_VENDOR,
};
