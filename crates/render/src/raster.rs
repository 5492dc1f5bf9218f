//! SVG markup to pixels.

use resvg::tiny_skia::{Pixmap, Transform};

use crate::context::RenderContext;
use crate::error::RenderError;

/// Parse `svg` with the context's fonts and paint it into a fresh
/// `width x height` pixmap (premultiplied RGBA).
///
/// CPU-bound; call from a blocking context.
pub fn rasterize(
    ctx: &RenderContext,
    svg: &str,
    width: u32,
    height: u32,
) -> Result<Pixmap, RenderError> {
    let options = ctx.usvg_options();
    let tree =
        usvg::Tree::from_str(svg, &options).map_err(|e| RenderError::Parse(e.to_string()))?;
    let mut pixmap = Pixmap::new(width, height).ok_or(RenderError::Surface { width, height })?;
    resvg::render(&tree, Transform::identity(), &mut pixmap.as_mut());
    Ok(pixmap)
}
