//! Thumbnail pipeline: bounded-size previews as inline `data:` URLs.
//!
//! Decodes the source, scales it uniformly so neither side exceeds
//! `max_dimension` (never enlarging), and re-encodes it as JPEG.

use crate::node::Thumb;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use std::io::Cursor;
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_MAX_DIMENSION: u32 = 320;
pub const DEFAULT_QUALITY: f32 = 0.82;

#[derive(Debug, Error)]
pub enum ThumbnailError {
    #[error("Could not decode image: {0}")]
    Decode(String),

    #[error("Could not encode thumbnail: {0}")]
    Encode(String),

    #[error("Image has no pixels")]
    EmptyImage,
}

pub type Result<T> = std::result::Result<T, ThumbnailError>;

/// Per-call pipeline parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThumbnailOptions {
    /// Longest allowed side in pixels
    pub max_dimension: u32,
    /// JPEG quality in `0.0..=1.0`
    pub quality: f32,
}

impl Default for ThumbnailOptions {
    fn default() -> Self {
        Self {
            max_dimension: DEFAULT_MAX_DIMENSION,
            quality: DEFAULT_QUALITY,
        }
    }
}

impl ThumbnailOptions {
    fn jpeg_quality(&self) -> u8 {
        (self.quality * 100.0).round().clamp(1.0, 100.0) as u8
    }
}

/// Scale `width`×`height` to fit within `max_dimension`, preserving aspect
/// ratio and never enlarging. Each side is at least one pixel.
pub fn fit_within(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (width, height);
    }
    let max = f64::from(max_dimension);
    let scale = (max / f64::from(width))
        .min(max / f64::from(height))
        .min(1.0);
    let scaled = |side: u32| ((f64::from(side) * scale).round() as u32).max(1);
    (scaled(width), scaled(height))
}

/// Width and height of an encoded image, read from its header.
pub fn source_dimensions(source: &[u8]) -> Result<(u32, u32)> {
    image::ImageReader::new(Cursor::new(source))
        .with_guessed_format()
        .map_err(|e| ThumbnailError::Decode(e.to_string()))?
        .into_dimensions()
        .map_err(|e| ThumbnailError::Decode(e.to_string()))
}

/// Produce a thumbnail from encoded image bytes (PNG, JPEG, GIF, WebP, BMP).
pub fn generate_thumbnail(source: &[u8], options: ThumbnailOptions) -> Result<Thumb> {
    let image = image::load_from_memory(source).map_err(|e| ThumbnailError::Decode(e.to_string()))?;
    let (width, height) = (image.width(), image.height());
    if width == 0 || height == 0 {
        return Err(ThumbnailError::EmptyImage);
    }

    let (target_width, target_height) = fit_within(width, height, options.max_dimension);
    let image = if (target_width, target_height) == (width, height) {
        image
    } else {
        image.resize_exact(target_width, target_height, FilterType::Triangle)
    };

    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, options.jpeg_quality())
        .encode_image(&image.to_rgb8())
        .map_err(|e| ThumbnailError::Encode(e.to_string()))?;

    debug!(
        "Thumbnail {}x{} -> {}x{} ({} bytes)",
        width,
        height,
        target_width,
        target_height,
        jpeg.len()
    );

    Ok(Thumb {
        width: target_width,
        height: target_height,
        data_url: format!("data:image/jpeg;base64,{}", STANDARD.encode(&jpeg)),
    })
}
