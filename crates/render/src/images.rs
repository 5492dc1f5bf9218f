//! Decoding, filtering and embedding of image layer sources.

use std::io::Cursor;

use base64::Engine;
use image::{DynamicImage, ImageFormat};
use imprint_core::scene::ImageFilters;

use crate::fetch::FetchError;

/// Gaussian sigma, in source pixels, applied at `blur = 1.0`.
pub const MAX_BLUR_SIGMA: f32 = 20.0;

/// A decoded, filtered image ready to be referenced from SVG markup.
#[derive(Debug, Clone)]
pub struct EmbeddedImage {
    pub width: u32,
    pub height: u32,
    /// `data:image/png;base64,...`
    pub data_uri: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ImageLoadError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("image could not be decoded: {0}")]
    Decode(#[from] image::ImageError),

    #[error("image task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Decode `bytes`, apply `filters` and re-encode as a PNG data URI.
///
/// CPU-bound; call from a blocking context.
pub fn prepare_image(
    bytes: &[u8],
    filters: Option<&ImageFilters>,
) -> Result<EmbeddedImage, image::ImageError> {
    let mut img = image::load_from_memory(bytes)?;
    if let Some(filters) = filters.filter(|f| !f.is_identity()) {
        img = apply_filters(img, filters);
    }
    let rgba = DynamicImage::ImageRgba8(img.to_rgba8());

    let mut png = Vec::new();
    rgba.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
    Ok(EmbeddedImage {
        width: rgba.width(),
        height: rgba.height(),
        data_uri: format!(
            "data:image/png;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(&png)
        ),
    })
}

/// Apply grayscale, then blur, then brightness. Out-of-range magnitudes are
/// clamped (`blur` to `0..=1`, `brightness` to `-1..=1`).
pub fn apply_filters(mut img: DynamicImage, filters: &ImageFilters) -> DynamicImage {
    if filters.grayscale {
        img = DynamicImage::ImageRgba8(img.grayscale().to_rgba8());
    }
    let blur = filters.blur.clamp(0.0, 1.0) as f32;
    if blur > 0.0 {
        img = img.blur(blur * MAX_BLUR_SIGMA);
    }
    let brightness = filters.brightness.clamp(-1.0, 1.0);
    if brightness != 0.0 {
        img = img.brighten((brightness * 255.0).round() as i32);
    }
    img
}
