//! Decoding and canonical sizing of input photos.

use std::path::Path;

use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, RgbImage};

/// Width every photo is resized to before analysis. The thresholds assume it.
pub const CANONICAL_WIDTH: u32 = 500;

/// Decode an image file and bring it to the canonical width.
pub fn load_canonical<P: AsRef<Path>>(path: P) -> crate::Result<RgbImage> {
    let image = image::open(path)?;
    Ok(to_canonical(image))
}

/// Convert to 8-bit RGB and resize to [`CANONICAL_WIDTH`], keeping the
/// aspect ratio. The new height is truncated, never below one pixel.
pub fn to_canonical(image: DynamicImage) -> RgbImage {
    let rgb = image.into_rgb8();
    let (width, height) = rgb.dimensions();
    if width == CANONICAL_WIDTH || width == 0 {
        return rgb;
    }

    let new_height = ((height as f64 * CANONICAL_WIDTH as f64 / width as f64) as u32).max(1);
    imageops::resize(&rgb, CANONICAL_WIDTH, new_height, FilterType::Triangle)
}

/// Luma plane used for face detection and landmark prediction.
pub fn to_gray(image: &RgbImage) -> GrayImage {
    imageops::grayscale(image)
}
