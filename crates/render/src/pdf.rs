//! Single-page PDF output.
//!
//! The page is sized to the canvas, one pixel per point, and carries the
//! rendered surface as a Flate-compressed RGB image with an alpha soft mask.

use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use pdf_writer::{Content, Filter, Finish, Name, Pdf, Rect, Ref};

use crate::error::RenderError;

const IMAGE_NAME: Name<'static> = Name(b"Im0");

/// Build a PDF from straight-alpha RGB samples and an alpha plane.
///
/// The soft mask is omitted when every pixel is opaque.
pub fn encode_pdf(
    width: u32,
    height: u32,
    rgb: &[u8],
    alpha: &[u8],
) -> Result<Vec<u8>, RenderError> {
    let catalog_id = Ref::new(1);
    let page_tree_id = Ref::new(2);
    let page_id = Ref::new(3);
    let image_id = Ref::new(4);
    let mask_id = Ref::new(5);
    let content_id = Ref::new(6);

    let (w, h) = (width as f32, height as f32);
    let has_alpha = alpha.iter().any(|&a| a < 255);
    let rgb = deflate(rgb)?;
    let mask = if has_alpha { Some(deflate(alpha)?) } else { None };

    let mut pdf = Pdf::new();
    pdf.catalog(catalog_id).pages(page_tree_id);
    pdf.pages(page_tree_id).kids([page_id]).count(1);

    let mut page = pdf.page(page_id);
    page.media_box(Rect::new(0.0, 0.0, w, h));
    page.parent(page_tree_id);
    page.contents(content_id);
    page.resources().x_objects().pair(IMAGE_NAME, image_id);
    page.finish();

    let mut image = pdf.image_xobject(image_id, &rgb);
    image.filter(Filter::FlateDecode);
    image.width(width as i32);
    image.height(height as i32);
    image.color_space().device_rgb();
    image.bits_per_component(8);
    if mask.is_some() {
        image.s_mask(mask_id);
    }
    image.finish();

    if let Some(mask) = &mask {
        let mut s_mask = pdf.image_xobject(mask_id, mask);
        s_mask.filter(Filter::FlateDecode);
        s_mask.width(width as i32);
        s_mask.height(height as i32);
        s_mask.color_space().device_gray();
        s_mask.bits_per_component(8);
        s_mask.finish();
    }

    // Image space is the unit square; stretch it over the page.
    let mut content = Content::new();
    content.save_state();
    content.transform([w, 0.0, 0.0, h, 0.0, 0.0]);
    content.x_object(IMAGE_NAME);
    content.restore_state();
    pdf.stream(content_id, &content.finish());

    Ok(pdf.finish())
}

fn deflate(data: &[u8]) -> Result<Vec<u8>, RenderError> {
    let to_err = |e: std::io::Error| RenderError::Encode(format!("deflate: {e}"));
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).map_err(to_err)?;
    encoder.finish().map_err(to_err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opaque_surface_has_no_soft_mask() {
        let bytes = encode_pdf(2, 1, &[0; 6], &[255; 2]).unwrap();
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.starts_with("%PDF-"));
        assert!(!text.contains("/SMask"));
    }

    #[test]
    fn translucent_surface_carries_soft_mask() {
        let bytes = encode_pdf(2, 1, &[0; 6], &[255, 10]).unwrap();
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains("/SMask"));
        assert!(text.contains("/DeviceGray"));
    }
}
