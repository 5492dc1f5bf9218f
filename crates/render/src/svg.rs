//! Lowering of a scene document to SVG markup.
//!
//! Every layer becomes one `<g>` carrying its placement transform and
//! opacity, with an inner group for the optional drop shadow. Geometry is
//! written in layer-local coordinates with the origin at the layer's
//! top-left corner, so `translate(left, top) rotate(angle) scale(sx, sy)`
//! reproduces editor placement.

use std::collections::HashMap;
use std::fmt::Write;

use imprint_core::scene::{
    ImageLayer, Layer, LayerKind, SceneDocument, ShapeLayer, Shadow, TextAlign, TextLayer,
};

use crate::images::EmbeddedImage;

/// Distance from the top of a line box to its baseline, as a fraction of
/// the font size.
pub const BASELINE_RATIO: f64 = 0.89;

/// Embedded images keyed by layer index. Image layers without an entry are
/// skipped.
pub type LayerImages = HashMap<usize, EmbeddedImage>;

/// Build a complete SVG document for `scene`.
pub fn scene_to_svg(scene: &SceneDocument, images: &LayerImages) -> String {
    let (w, h) = (scene.canvas_width, scene.canvas_height);
    let mut defs = String::new();
    let mut body = String::new();

    if let Some(color) = scene.background() {
        let _ = write!(
            body,
            r#"<rect x="0" y="0" width="{w}" height="{h}" fill="{}"/>"#,
            escape(color)
        );
    }
    for (index, layer) in scene.layers.iter().enumerate() {
        if layer.is_paintable() {
            write_layer(&mut defs, &mut body, index, layer, images);
        }
    }

    let mut svg = String::with_capacity(body.len() + defs.len() + 256);
    let _ = write!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#
    );
    if !defs.is_empty() {
        let _ = write!(svg, "<defs>{defs}</defs>");
    }
    svg.push_str(&body);
    svg.push_str("</svg>");
    svg
}

fn write_layer(
    defs: &mut String,
    body: &mut String,
    index: usize,
    layer: &Layer,
    images: &LayerImages,
) {
    let mut content = String::new();
    match &layer.kind {
        LayerKind::Text(text) => write_text(&mut content, text),
        LayerKind::Rectangle(shape) => write_rect(&mut content, shape),
        LayerKind::Ellipse(shape) => write_ellipse(&mut content, shape),
        LayerKind::Image(image) => match images.get(&index) {
            Some(embedded) => write_image(defs, &mut content, index, image, embedded),
            None => return,
        },
        LayerKind::Placeholder(_) => return,
    }
    if content.is_empty() {
        return;
    }

    let c = &layer.common;
    body.push_str("<g");
    let transform = transform_attr(c.left, c.top, c.angle, c.scale_x, c.scale_y);
    if !transform.is_empty() {
        let _ = write!(body, r#" transform="{transform}""#);
    }
    let opacity = c.effective_opacity();
    if opacity < 1.0 {
        let _ = write!(body, r#" opacity="{opacity}""#);
    }
    body.push('>');

    match &c.shadow {
        Some(shadow) => {
            let id = format!("shadow-{index}");
            write_shadow_filter(defs, &id, shadow);
            let _ = write!(body, r#"<g filter="url(#{id})">{content}</g>"#);
        }
        None => body.push_str(&content),
    }
    body.push_str("</g>");
}

fn transform_attr(left: f64, top: f64, angle: f64, sx: f64, sy: f64) -> String {
    let mut parts = Vec::new();
    if left != 0.0 || top != 0.0 {
        parts.push(format!("translate({left} {top})"));
    }
    if angle != 0.0 {
        parts.push(format!("rotate({angle})"));
    }
    if sx != 1.0 || sy != 1.0 {
        parts.push(format!("scale({sx} {sy})"));
    }
    parts.join(" ")
}

fn write_shadow_filter(defs: &mut String, id: &str, shadow: &Shadow) {
    // CSS blur radius to gaussian standard deviation.
    let std_dev = shadow.blur.max(0.0) / 2.0;
    let _ = write!(
        defs,
        r#"<filter id="{id}" x="-50%" y="-50%" width="200%" height="200%"><feDropShadow dx="{}" dy="{}" stdDeviation="{std_dev}" flood-color="{}"/></filter>"#,
        shadow.offset_x,
        shadow.offset_y,
        escape(&shadow.color)
    );
}

// ---------------------------------------------------------------------------
// Text
// ---------------------------------------------------------------------------

fn write_text(out: &mut String, text: &TextLayer) {
    // Justify has no multi-line reflow here and falls back to left.
    let (x, anchor) = match (text.text_align, text.width) {
        (TextAlign::Center, Some(w)) => (w / 2.0, "middle"),
        (TextAlign::Right, Some(w)) => (w, "end"),
        _ => (0.0, "start"),
    };
    let line_advance = text.font_size * text.line_height;
    let decoration = if text.underline {
        r#" text-decoration="underline""#
    } else {
        ""
    };

    for (i, line) in text.content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let y = text.font_size * BASELINE_RATIO + i as f64 * line_advance;
        let _ = write!(
            out,
            r#"<text x="{x}" y="{y}" text-anchor="{anchor}" font-family="{}" font-size="{}" font-weight="{}" font-style="{}" fill="{}"{decoration} xml:space="preserve">{}</text>"#,
            escape(&text.font_family),
            text.font_size,
            text.font_weight.numeric(),
            text.font_style.as_css(),
            escape(&text.fill_color),
            escape(line),
        );
    }
}

// ---------------------------------------------------------------------------
// Shapes
// ---------------------------------------------------------------------------

fn paint_attrs(shape: &ShapeLayer) -> String {
    let fill = shape.fill_color.as_deref().map_or("none".to_string(), escape);
    let mut attrs = format!(r#" fill="{fill}""#);
    if let Some(stroke) = shape.stroke_color.as_deref() {
        let width = shape.stroke_width.unwrap_or(1.0);
        if width > 0.0 {
            let _ = write!(attrs, r#" stroke="{}" stroke-width="{width}""#, escape(stroke));
        }
    }
    attrs
}

fn write_rect(out: &mut String, shape: &ShapeLayer) {
    let radius = shape
        .corner_radius
        .map(|r| r.min(shape.width / 2.0).min(shape.height / 2.0))
        .filter(|r| *r > 0.0);
    let _ = write!(out, r#"<rect x="0" y="0" width="{}" height="{}""#, shape.width, shape.height);
    if let Some(r) = radius {
        let _ = write!(out, r#" rx="{r}" ry="{r}""#);
    }
    let _ = write!(out, "{}/>", paint_attrs(shape));
}

fn write_ellipse(out: &mut String, shape: &ShapeLayer) {
    let (rx, ry) = (shape.width / 2.0, shape.height / 2.0);
    let _ = write!(
        out,
        r#"<ellipse cx="{rx}" cy="{ry}" rx="{rx}" ry="{ry}"{}/>"#,
        paint_attrs(shape)
    );
}

// ---------------------------------------------------------------------------
// Images
// ---------------------------------------------------------------------------

fn write_image(
    defs: &mut String,
    out: &mut String,
    index: usize,
    layer: &ImageLayer,
    embedded: &EmbeddedImage,
) {
    let (w, h) = (layer.width, layer.height);
    let clip = layer
        .clip_radius
        .map(|r| r.min(w / 2.0).min(h / 2.0))
        .filter(|r| *r > 0.0)
        .map(|r| {
            let id = format!("clip-{index}");
            let _ = write!(
                defs,
                r#"<clipPath id="{id}"><rect x="0" y="0" width="{w}" height="{h}" rx="{r}" ry="{r}"/></clipPath>"#
            );
            format!(r#" clip-path="url(#{id})""#)
        })
        .unwrap_or_default();
    let _ = write!(
        out,
        r#"<image x="0" y="0" width="{w}" height="{h}" preserveAspectRatio="none"{clip} xlink:href="{}"/>"#,
        embedded.data_uri
    );
}

/// Escape text for use in XML content and double-quoted attributes.
pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use imprint_core::scene::{Layer, PlaceholderLayer};

    use super::*;

    fn text_layer(content: &str) -> Layer {
        Layer::new(LayerKind::Text(TextLayer::new(content)))
    }

    #[test]
    fn document_has_canvas_size_and_background() {
        let scene = SceneDocument::new(1200, 630).with_background("#ffffff");
        let svg = scene_to_svg(&scene, &LayerImages::new());
        assert!(svg.contains(r#"width="1200" height="630" viewBox="0 0 1200 630""#));
        assert!(svg.contains(r##"fill="#ffffff""##));
    }

    #[test]
    fn text_content_is_escaped() {
        let scene = SceneDocument::new(100, 100).with_layer(text_layer(r#"<b>"Tom & Jerry"</b>"#));
        let svg = scene_to_svg(&scene, &LayerImages::new());
        assert!(svg.contains("&lt;b&gt;&quot;Tom &amp; Jerry&quot;&lt;/b&gt;"));
        assert!(!svg.contains("<b>"));
    }

    #[test]
    fn multi_line_text_emits_one_element_per_line() {
        let scene = SceneDocument::new(100, 100).with_layer(text_layer("one\ntwo\nthree"));
        let svg = scene_to_svg(&scene, &LayerImages::new());
        assert_eq!(svg.matches("<text ").count(), 3);
    }

    #[test]
    fn center_alignment_anchors_within_width() {
        let mut text = TextLayer::new("hi");
        text.text_align = TextAlign::Center;
        text.width = Some(300.0);
        let scene = SceneDocument::new(300, 100).with_layer(Layer::new(LayerKind::Text(text)));
        let svg = scene_to_svg(&scene, &LayerImages::new());
        assert!(svg.contains(r#"x="150""#));
        assert!(svg.contains(r#"text-anchor="middle""#));
    }

    #[test]
    fn transform_is_composed_in_editor_order() {
        let mut layer = Layer::new(LayerKind::Rectangle(ShapeLayer::filled(10.0, 10.0, "red")))
            .at(5.0, 7.0);
        layer.common.angle = 30.0;
        layer.common.scale_x = 2.0;
        let scene = SceneDocument::new(100, 100).with_layer(layer);
        let svg = scene_to_svg(&scene, &LayerImages::new());
        assert!(svg.contains(r#"transform="translate(5 7) rotate(30) scale(2 1)""#));
    }

    #[test]
    fn hidden_placeholder_and_unloaded_image_layers_are_skipped() {
        let mut hidden = text_layer("secret");
        hidden.common.visible = false;
        let image = Layer::new(LayerKind::Image(ImageLayer {
            source_url: "https://cdn.test/missing.png".into(),
            width: 10.0,
            height: 10.0,
            filters: None,
            clip_radius: Some(4.0),
        }));
        let placeholder = Layer::new(LayerKind::Placeholder(PlaceholderLayer::default()));
        let scene = SceneDocument::new(100, 100)
            .with_layer(hidden)
            .with_layer(image)
            .with_layer(placeholder);

        let svg = scene_to_svg(&scene, &LayerImages::new());
        assert!(!svg.contains("secret"));
        assert!(!svg.contains("<image"));
        assert!(!svg.contains("<g"));
    }

    #[test]
    fn shadow_and_clip_register_defs() {
        let mut layer = Layer::new(LayerKind::Image(ImageLayer {
            source_url: "data:,".into(),
            width: 40.0,
            height: 20.0,
            filters: None,
            clip_radius: Some(50.0),
        }));
        layer.common.shadow = Some(Shadow {
            color: "rgba(0,0,0,0.5)".into(),
            blur: 8.0,
            offset_x: 2.0,
            offset_y: 3.0,
        });
        let images = LayerImages::from([(
            0,
            EmbeddedImage {
                width: 1,
                height: 1,
                data_uri: "data:image/png;base64,AAAA".into(),
            },
        )]);
        let svg = scene_to_svg(&SceneDocument::new(100, 100).with_layer(layer), &images);

        assert!(svg.contains(r#"<filter id="shadow-0""#));
        assert!(svg.contains(r#"stdDeviation="4""#));
        // Clip radius is capped at half the shorter side.
        assert!(svg.contains(r#"<clipPath id="clip-0"><rect x="0" y="0" width="40" height="20" rx="10""#));
        assert!(svg.contains(r#"clip-path="url(#clip-0)""#));
    }

    #[test]
    fn shape_without_fill_is_unfilled() {
        let shape = ShapeLayer {
            fill_color: None,
            stroke_color: Some("#123456".into()),
            ..ShapeLayer::filled(10.0, 10.0, "")
        };
        let scene = SceneDocument::new(20, 20).with_layer(Layer::new(LayerKind::Ellipse(shape)));
        let svg = scene_to_svg(&scene, &LayerImages::new());
        assert!(svg.contains(r##"fill="none" stroke="#123456" stroke-width="1""##));
    }
}
