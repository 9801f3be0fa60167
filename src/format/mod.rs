//! Format helpers for SDPC slides.
//!
//! The pyramid codec itself lives in the vendor library. This module holds the
//! small pieces of format knowledge the wrapper needs on its side of the
//! boundary:
//!
//! - [`descriptor`]: parsing of the per-level `key=value|...` geometry string
//! - [`pixels`]: BGR decoder buffers to RGB images

pub mod descriptor;
pub mod pixels;

pub use descriptor::{parse_level_descriptor, LevelDescriptor};
pub use pixels::{bgr_to_rgb, placeholder_region, region_buffer_len};
