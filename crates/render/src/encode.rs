//! Pixmap encoders.

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder};
use imprint_core::output::{OutputFormat, RenderOptions};
use resvg::tiny_skia::Pixmap;

use crate::error::RenderError;
use crate::pdf;

/// Encode a rendered surface in the requested format.
pub fn encode(pixmap: &Pixmap, options: &RenderOptions) -> Result<Vec<u8>, RenderError> {
    match options.format {
        OutputFormat::Png => encode_png(pixmap),
        OutputFormat::Jpeg => encode_jpeg(pixmap, options.effective_quality()),
        OutputFormat::Pdf => {
            let (rgb, alpha) = split_alpha(pixmap);
            pdf::encode_pdf(pixmap.width(), pixmap.height(), &rgb, &alpha)
        }
    }
}

/// Lossless RGBA PNG at native canvas size.
pub fn encode_png(pixmap: &Pixmap) -> Result<Vec<u8>, RenderError> {
    let rgba = unpremultiplied_rgba(pixmap);
    let mut out = Vec::new();
    PngEncoder::new(&mut out).write_image(
        &rgba,
        pixmap.width(),
        pixmap.height(),
        ExtendedColorType::Rgba8,
    )?;
    Ok(out)
}

/// Baseline JPEG with transparency flattened onto white.
pub fn encode_jpeg(pixmap: &Pixmap, quality: u8) -> Result<Vec<u8>, RenderError> {
    let rgb = flatten_on_white(pixmap);
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100)).write_image(
        &rgb,
        pixmap.width(),
        pixmap.height(),
        ExtendedColorType::Rgb8,
    )?;
    Ok(out)
}

fn unpremultiplied_rgba(pixmap: &Pixmap) -> Vec<u8> {
    pixmap
        .pixels()
        .iter()
        .flat_map(|p| {
            let c = p.demultiply();
            [c.red(), c.green(), c.blue(), c.alpha()]
        })
        .collect()
}

/// Composite over opaque white. With premultiplied input this is
/// `channel + (255 - alpha)` per channel.
fn flatten_on_white(pixmap: &Pixmap) -> Vec<u8> {
    pixmap
        .pixels()
        .iter()
        .flat_map(|p| {
            let cover = 255 - p.alpha();
            [
                p.red().saturating_add(cover),
                p.green().saturating_add(cover),
                p.blue().saturating_add(cover),
            ]
        })
        .collect()
}

/// Straight-alpha RGB plus a separate alpha plane, as PDF soft masks expect.
fn split_alpha(pixmap: &Pixmap) -> (Vec<u8>, Vec<u8>) {
    let pixels = pixmap.pixels();
    let mut rgb = Vec::with_capacity(pixels.len() * 3);
    let mut alpha = Vec::with_capacity(pixels.len());
    for p in pixels {
        let c = p.demultiply();
        rgb.extend_from_slice(&[c.red(), c.green(), c.blue()]);
        alpha.push(c.alpha());
    }
    (rgb, alpha)
}

#[cfg(test)]
mod tests {
    use resvg::tiny_skia::Color;

    use super::*;

    fn filled(color: Color) -> Pixmap {
        let mut pixmap = Pixmap::new(4, 4).unwrap();
        pixmap.fill(color);
        pixmap
    }

    #[test]
    fn transparent_pixels_flatten_to_white() {
        let rgb = flatten_on_white(&Pixmap::new(2, 2).unwrap());
        assert!(rgb.iter().all(|&b| b == 255));
    }

    #[test]
    fn opaque_pixels_flatten_unchanged() {
        let rgb = flatten_on_white(&filled(Color::from_rgba8(10, 20, 30, 255)));
        assert_eq!(&rgb[..3], &[10, 20, 30]);
    }

    #[test]
    fn png_keeps_alpha() {
        let bytes = encode_png(&filled(Color::from_rgba8(255, 0, 0, 128))).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap().to_rgba8();
        let px = decoded.get_pixel(1, 1);
        assert_eq!(px[3], 128);
        assert!(px[0] >= 250);
    }

    #[test]
    fn split_alpha_separates_planes() {
        let (rgb, alpha) = split_alpha(&filled(Color::from_rgba8(0, 0, 255, 255)));
        assert_eq!(rgb.len(), 4 * 4 * 3);
        assert_eq!(alpha.len(), 4 * 4);
        assert!(alpha.iter().all(|&a| a == 255));
        assert_eq!(&rgb[..3], &[0, 0, 255]);
    }
}
