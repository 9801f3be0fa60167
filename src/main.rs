//! sdpc - Inspect SDPC slides and extract images from them.
//!
//! This binary links against the vendor decoding library and is only built
//! with the `native` feature.

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use image::RgbImage;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sdpc_slide::{
    config::{output_format, Cli, Command, InfoConfig, LabelConfig, RegionConfig, ThumbnailConfig},
    NativeLibrary, SdpcSlide, SlideInfo, SlideReader,
};

type Slide = SdpcSlide<NativeLibrary>;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Info(config) => run_info(config),
        Command::Region(config) => run_region(config),
        Command::Thumbnail(config) => run_thumbnail(config),
        Command::Label(config) => run_label(config),
    }
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "sdpc_slide=debug,sdpc=debug"
    } else {
        "sdpc_slide=info,sdpc=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Open a slide, logging the failure.
fn open_slide(path: &Path) -> Option<Slide> {
    match SdpcSlide::open(Arc::new(NativeLibrary), path) {
        Ok(slide) => Some(slide),
        Err(e) => {
            error!("Failed to open {}: {}", path.display(), e);
            None
        }
    }
}

/// Save an image in the format implied by the output extension.
fn save_image(image: &RgbImage, path: &Path) -> ExitCode {
    let format = match output_format(path) {
        Ok(format) => format,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    match image.save_with_format(path, format) {
        Ok(()) => {
            info!(
                "Wrote {}x{} image to {}",
                image.width(),
                image.height(),
                path.display()
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Failed to write {}: {}", path.display(), e);
            ExitCode::FAILURE
        }
    }
}

// =============================================================================
// Info Command
// =============================================================================

fn run_info(config: InfoConfig) -> ExitCode {
    let Some(slide) = open_slide(&config.slide) else {
        return ExitCode::FAILURE;
    };
    let summary = SlideInfo::from_reader(&slide);

    if config.json {
        match serde_json::to_string_pretty(&summary) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                error!("Failed to serialize slide info: {}", e);
                return ExitCode::FAILURE;
            }
        }
        return ExitCode::SUCCESS;
    }

    println!("Slide: {}", config.slide.display());
    println!("═════════════════════════════════");
    println!(
        "Dimensions: {} x {}",
        summary.dimensions.0, summary.dimensions.1
    );
    println!("Levels: {}", summary.level_count);
    println!();
    println!("  Level   Width    Height   Downsample");
    println!("  ─────   ──────   ──────   ──────────");
    for (level, info) in summary.levels.iter().enumerate() {
        println!(
            "  {:<5}   {:<6}   {:<6}   {:.3}",
            level, info.width, info.height, info.downsample
        );
    }
    println!();
    println!("Properties:");
    for (key, value) in &summary.properties {
        println!("  {} = {}", key, value);
    }

    ExitCode::SUCCESS
}

// =============================================================================
// Region Command
// =============================================================================

fn run_region(config: RegionConfig) -> ExitCode {
    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }
    let size = match config.dimensions() {
        Ok(size) => size,
        Err(e) => {
            error!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let Some(slide) = open_slide(&config.slide) else {
        return ExitCode::FAILURE;
    };

    match slide.read_region((config.x, config.y), config.level, size) {
        Ok(region) => save_image(&region, &config.output),
        Err(e) => {
            error!("Failed to read region: {}", e);
            ExitCode::FAILURE
        }
    }
}

// =============================================================================
// Thumbnail Command
// =============================================================================

fn run_thumbnail(config: ThumbnailConfig) -> ExitCode {
    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }
    let size = match config.dimensions() {
        Ok(size) => size,
        Err(e) => {
            error!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let Some(slide) = open_slide(&config.slide) else {
        return ExitCode::FAILURE;
    };

    match slide.get_thumbnail(size) {
        Ok(thumbnail) => save_image(&thumbnail, &config.output),
        Err(e) => {
            error!("Failed to render thumbnail: {}", e);
            ExitCode::FAILURE
        }
    }
}

// =============================================================================
// Label Command
// =============================================================================

fn run_label(config: LabelConfig) -> ExitCode {
    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let Some(slide) = open_slide(&config.slide) else {
        return ExitCode::FAILURE;
    };

    if config.raw {
        let jpeg = match slide.label_jpeg() {
            Ok(jpeg) => jpeg,
            Err(e) => {
                error!("Failed to read label: {}", e);
                return ExitCode::FAILURE;
            }
        };
        return match std::fs::write(&config.output, &jpeg) {
            Ok(()) => {
                info!("Wrote {} label bytes to {}", jpeg.len(), config.output.display());
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!("Failed to write {}: {}", config.output.display(), e);
                ExitCode::FAILURE
            }
        };
    }

    match slide.label_image() {
        Ok(label) => save_image(&label, &config.output),
        Err(e) => {
            error!("Failed to decode label: {}", e);
            ExitCode::FAILURE
        }
    }
}
