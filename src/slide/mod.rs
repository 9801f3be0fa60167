//! Slide abstraction layer.
//!
//! This module wraps the vendor decoder in an OpenSlide-style slide object.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │        Dataset layer / callers          │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │           SlideReader Trait             │
//! │  (OpenSlide-style slide interface)      │
//! └──────────┬───────────────────┬──────────┘
//!            ▼                   ▼
//! ┌─────────────────┐  ┌─────────────────────┐
//! │   SdpcSlide     │  │   SharedSlide       │
//! │ (owns handle)   │  │ (mutex + blocking)  │
//! └────────┬────────┘  └─────────────────────┘
//!          ▼
//! ┌─────────────────────────────────────────┐
//! │       DecoderLibrary (vendor FFI)       │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use sdpc_slide::ffi::NativeLibrary;
//! use sdpc_slide::slide::{SdpcSlide, SlideReader};
//!
//! let slide = SdpcSlide::open(Arc::new(NativeLibrary), "case-01.sdpc")?;
//! let level = slide.get_best_level_for_downsample(16.0);
//! let patch = slide.read_region((10_000, 8_000), level, (256, 256))?;
//! let thumb = slide.get_thumbnail((512, 512))?;
//! ```

mod reader;
mod sdpc;
mod shared;

pub use reader::{
    best_level_by_squared_downsample, LevelInfo, SlideInfo, SlideProperties, SlideReader,
    PROPERTY_LEVEL_COUNT, PROPERTY_MPP_X, PROPERTY_MPP_Y, PROPERTY_OBJECTIVE_POWER,
    PROPERTY_VENDOR,
};
pub use sdpc::{SdpcSlide, MAX_LEVEL_COUNT, SDPC_VENDOR};
pub use shared::SharedSlide;
