//! Command-line configuration for the `sdpc` tool.
//!
//! Every option can also be set through an environment variable with the
//! `SDPC_` prefix:
//!
//! - `SDPC_VERBOSE` - Enable debug logging
//! - `SDPC_SLIDE` - Slide file to open
//! - `SDPC_OUTPUT` - Output image path
//! - `SDPC_LEVEL` - Pyramid level for region reads (default: 0)
//! - `SDPC_SIZE` - Region or thumbnail size as `WIDTHxHEIGHT`
//!
//! # Example
//!
//! ```text
//! sdpc info case-01.sdpc --json
//! sdpc region case-01.sdpc --x 20000 --y 15000 --level 1 --size 512x512 -o patch.png
//! sdpc thumbnail case-01.sdpc --size 1024x768 -o thumb.jpg
//! sdpc label case-01.sdpc --raw -o label.jpg
//! ```

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use image::ImageFormat;

// =============================================================================
// Default Values
// =============================================================================

/// Default edge length of a region read.
pub const DEFAULT_REGION_SIZE: &str = "256x256";

/// Default thumbnail bounding size.
pub const DEFAULT_THUMBNAIL_SIZE: &str = "512x512";

/// Largest edge accepted for any requested image.
pub const MAX_IMAGE_EDGE: u32 = 65_536;

// =============================================================================
// CLI Arguments
// =============================================================================

/// sdpc - Inspect and extract images from SDPC whole slide files.
#[derive(Parser, Debug, Clone)]
#[command(name = "sdpc")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging (debug level).
    #[arg(short, long, global = true, default_value_t = false, env = "SDPC_VERBOSE")]
    pub verbose: bool,
}

/// Available subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Print levels, downsamples and properties of a slide.
    Info(InfoConfig),

    /// Read one region and save it as an image.
    Region(RegionConfig),

    /// Render a thumbnail of the whole slide.
    Thumbnail(ThumbnailConfig),

    /// Extract the slide label image.
    Label(LabelConfig),
}

/// Options for `sdpc info`.
#[derive(Args, Debug, Clone)]
pub struct InfoConfig {
    /// Slide file to open.
    #[arg(env = "SDPC_SLIDE")]
    pub slide: PathBuf,

    /// Print the slide summary as JSON.
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

/// Options for `sdpc region`.
#[derive(Args, Debug, Clone)]
pub struct RegionConfig {
    /// Slide file to open.
    #[arg(env = "SDPC_SLIDE")]
    pub slide: PathBuf,

    /// Left edge of the region, in level-0 pixels.
    #[arg(long, default_value_t = 0)]
    pub x: u32,

    /// Top edge of the region, in level-0 pixels.
    #[arg(long, default_value_t = 0)]
    pub y: u32,

    /// Pyramid level to read from.
    #[arg(short, long, default_value_t = 0, env = "SDPC_LEVEL")]
    pub level: usize,

    /// Region size as `WIDTHxHEIGHT` (or a single edge length).
    #[arg(short, long, default_value = DEFAULT_REGION_SIZE, env = "SDPC_SIZE")]
    pub size: String,

    /// Output image (`.png` or `.jpg`).
    #[arg(short, long, env = "SDPC_OUTPUT")]
    pub output: PathBuf,
}

/// Options for `sdpc thumbnail`.
#[derive(Args, Debug, Clone)]
pub struct ThumbnailConfig {
    /// Slide file to open.
    #[arg(env = "SDPC_SLIDE")]
    pub slide: PathBuf,

    /// Thumbnail size as `WIDTHxHEIGHT` (or a single edge length).
    #[arg(short, long, default_value = DEFAULT_THUMBNAIL_SIZE, env = "SDPC_SIZE")]
    pub size: String,

    /// Output image (`.png` or `.jpg`).
    #[arg(short, long, env = "SDPC_OUTPUT")]
    pub output: PathBuf,
}

/// Options for `sdpc label`.
#[derive(Args, Debug, Clone)]
pub struct LabelConfig {
    /// Slide file to open.
    #[arg(env = "SDPC_SLIDE")]
    pub slide: PathBuf,

    /// Write the stored JPEG bytes as-is instead of re-encoding.
    #[arg(long, default_value_t = false)]
    pub raw: bool,

    /// Output image (`.png` or `.jpg`; `.jpg` when `--raw`).
    #[arg(short, long, env = "SDPC_OUTPUT")]
    pub output: PathBuf,
}

// =============================================================================
// Validation
// =============================================================================

impl RegionConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        parse_size(&self.size)?;
        output_format(&self.output)?;
        Ok(())
    }

    /// Parsed region size; call `validate()` first.
    pub fn dimensions(&self) -> Result<(u32, u32), String> {
        parse_size(&self.size)
    }
}

impl ThumbnailConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        parse_size(&self.size)?;
        output_format(&self.output)?;
        Ok(())
    }

    /// Parsed thumbnail size; call `validate()` first.
    pub fn dimensions(&self) -> Result<(u32, u32), String> {
        parse_size(&self.size)
    }
}

impl LabelConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        let format = output_format(&self.output)?;
        if self.raw && format != ImageFormat::Jpeg {
            return Err(format!(
                "--raw writes JPEG bytes; use a .jpg output instead of {}",
                self.output.display()
            ));
        }
        Ok(())
    }
}

/// Parse `WIDTHxHEIGHT`, or a single number for a square.
pub fn parse_size(value: &str) -> Result<(u32, u32), String> {
    let value = value.trim();
    let (width, height) = match value.split_once(['x', 'X']) {
        Some((w, h)) => (w.trim(), h.trim()),
        None => (value, value),
    };

    let parse = |part: &str| -> Result<u32, String> {
        let edge: u32 = part
            .parse()
            .map_err(|_| format!("invalid size '{value}': expected WIDTHxHEIGHT"))?;
        if edge == 0 || edge > MAX_IMAGE_EDGE {
            return Err(format!(
                "invalid size '{value}': edges must be between 1 and {MAX_IMAGE_EDGE}"
            ));
        }
        Ok(edge)
    };

    Ok((parse(width)?, parse(height)?))
}

/// Image format implied by an output path; PNG and JPEG only.
pub fn output_format(path: &Path) -> Result<ImageFormat, String> {
    match ImageFormat::from_path(path) {
        Ok(format @ (ImageFormat::Png | ImageFormat::Jpeg)) => Ok(format),
        _ => Err(format!(
            "unsupported output '{}': use a .png or .jpg extension",
            path.display()
        )),
    }
}

// =============================================================================
// Tests
// =============================================================================
