//! Pixel layout conversion between the decoder and [`image`].
//!
//! The decoder emits interleaved 8-bit samples in BGR order, row-major with a
//! top-left origin. Regions handed to callers are standard RGB images.

use image::{Rgb, RgbImage};

/// Samples per pixel in decoder buffers.
pub const CHANNELS: usize = 3;

/// White, the placeholder colour for unreadable regions.
pub const PLACEHOLDER_PIXEL: Rgb<u8> = Rgb([255, 255, 255]);

/// Byte length of a `width x height` BGR buffer, or `None` on overflow.
pub fn region_buffer_len(width: u32, height: u32) -> Option<usize> {
    (width as usize)
        .checked_mul(height as usize)?
        .checked_mul(CHANNELS)
}

/// Copy a BGR buffer into a freshly allocated RGB image.
///
/// The channel axis is reversed exactly once. Returns `None` if `bgr` does
/// not hold exactly `width * height * 3` bytes.
pub fn bgr_to_rgb(bgr: &[u8], width: u32, height: u32) -> Option<RgbImage> {
    if Some(bgr.len()) != region_buffer_len(width, height) {
        return None;
    }

    let mut rgb = Vec::with_capacity(bgr.len());
    for pixel in bgr.chunks_exact(CHANNELS) {
        rgb.extend_from_slice(&[pixel[2], pixel[1], pixel[0]]);
    }

    RgbImage::from_raw(width, height, rgb)
}

/// A white image of the given size.
pub fn placeholder_region(width: u32, height: u32) -> RgbImage {
    RgbImage::from_pixel(width, height, PLACEHOLDER_PIXEL)
}
