//! Image processing module - turns a staged original into a resized variant
//!
//! Includes:
//! - Image decoding
//! - Aspect-preserving dimension calculation
//! - Re-encoding in the format implied by the output extension

use anyhow::{Context, Result, anyhow, bail};
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use std::{fs::read, path::Path};

use crate::common::MAX_OUTPUT_PIXELS;
use crate::utils::PathExt;

// ────────────────────────────────────────────────────────────────
// Public API
// ────────────────────────────────────────────────────────────────

/// Decode `source`, scale it to `width` and write it to `target`.
///
/// The output format follows the extension of `target`; unsupported
/// extensions fail before the source is read.
pub fn resize_to_width(source: &Path, target: &Path, width: u32) -> Result<()> {
    if width == 0 {
        bail!("target width must be positive");
    }
    let format = output_format(target)?;

    let dynamic_image = generate_dynamic_image_from_path(source)
        .context(format!("failed to decode image: {:?}", source))?;

    let (new_width, new_height) =
        scaled_dimensions(dynamic_image.width(), dynamic_image.height(), width);
    ensure_pixel_budget(new_width, new_height, MAX_OUTPUT_PIXELS)?;
    let resized = dynamic_image.resize_exact(new_width, new_height, FilterType::Lanczos3);

    // JPEG has no alpha channel
    let resized = match format {
        ImageFormat::Jpeg => DynamicImage::ImageRgb8(resized.to_rgb8()),
        _ => resized,
    };

    resized
        .save_with_format(target, format)
        .context(format!("failed to encode resized image to {:?}", target))?;

    Ok(())
}

// ────────────────────────────────────────────────────────────────
// DynamicImage Generation
// ────────────────────────────────────────────────────────────────

pub fn generate_dynamic_image_from_path(file_path: &Path) -> Result<DynamicImage> {
    let file_in_memory =
        read(file_path).context(format!("failed to read file into memory: {:?}", file_path))?;

    image_crate_decoder(&file_in_memory)
}

fn image_crate_decoder(file_in_memory: &[u8]) -> Result<DynamicImage> {
    let dynamic_image = image::load_from_memory(file_in_memory)
        .context("image crate failed to decode image from memory")?;
    Ok(dynamic_image)
}

// ────────────────────────────────────────────────────────────────
// Helper Functions
// ────────────────────────────────────────────────────────────────

fn output_format(target: &Path) -> Result<ImageFormat> {
    let ext = target.ext_lower();
    match ext.as_str() {
        "jpg" | "jpeg" => Ok(ImageFormat::Jpeg),
        "png" => Ok(ImageFormat::Png),
        "gif" => Ok(ImageFormat::Gif),
        _ => Err(anyhow!(".{} is not supported", ext)),
    }
}

/// Refuse outputs whose buffer would exceed `max_pixels`.
fn ensure_pixel_budget(width: u32, height: u32, max_pixels: u64) -> Result<()> {
    match (width as u64).checked_mul(height as u64) {
        Some(pixels) if pixels <= max_pixels => Ok(()),
        _ => bail!(
            "resized image would be {}x{}, over the {} pixel limit",
            width,
            height,
            max_pixels
        ),
    }
}

/// Scale to `target_width`, keeping the aspect ratio; height never drops below 1.
pub fn scaled_dimensions(width: u32, height: u32, target_width: u32) -> (u32, u32) {
    if width == 0 {
        return (target_width, height.max(1));
    }
    let scaled = (height as u64 * target_width as u64 + width as u64 / 2) / width as u64;
    let new_height = scaled.clamp(1, u32::MAX as u64) as u32;
    (target_width, new_height)
}
