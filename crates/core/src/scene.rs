//! Scene document: the serialized description of a template's visual content.
//!
//! A scene is pure data. It is produced by the template editor, stored as
//! JSON, and consumed read-only by variable substitution and the renderer.
//! Layer order in [`SceneDocument::layers`] is the z-order: index 0 is painted
//! first, the last layer ends up on top.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Largest accepted canvas side, in pixels.
pub const MAX_CANVAS_SIZE: u32 = 10_000;

/// Default font size for text layers when the document omits it.
pub const DEFAULT_FONT_SIZE: f64 = 40.0;

/// Default line height multiplier for text layers.
pub const DEFAULT_LINE_HEIGHT: f64 = 1.16;

/// Default font family for text layers.
pub const DEFAULT_FONT_FAMILY: &str = "sans-serif";

/// Default text fill color.
pub const DEFAULT_TEXT_COLOR: &str = "#000000";

// ---------------------------------------------------------------------------
// SceneDocument
// ---------------------------------------------------------------------------

/// The visual content of a template: canvas size, background and layers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneDocument {
    pub canvas_width: u32,
    pub canvas_height: u32,
    /// CSS color; `None` or an empty string means a transparent background.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
    #[serde(default)]
    pub layers: Vec<Layer>,
}

impl SceneDocument {
    /// An empty scene of the given size with a transparent background.
    pub fn new(canvas_width: u32, canvas_height: u32) -> Self {
        Self {
            canvas_width,
            canvas_height,
            background_color: None,
            layers: Vec::new(),
        }
    }

    /// Append a layer on top of the existing ones.
    pub fn with_layer(mut self, layer: Layer) -> Self {
        self.layers.push(layer);
        self
    }

    /// Set the background color.
    pub fn with_background(mut self, color: impl Into<String>) -> Self {
        self.background_color = Some(color.into());
        self
    }

    /// The background color, treating an empty string as absent.
    pub fn background(&self) -> Option<&str> {
        self.background_color
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }

    /// Parse a scene from its stored JSON form.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, CoreError> {
        serde_json::from_value(value.clone())
            .map_err(|e| CoreError::Validation(format!("Invalid scene document: {e}")))
    }

    /// Check that the document can be rendered.
    ///
    /// Rejects empty or oversized canvases and non-finite or negative
    /// geometry. Rendering never starts on a document that fails here.
    pub fn validate(&self) -> Result<(), CoreError> {
        for (side, value) in [("width", self.canvas_width), ("height", self.canvas_height)] {
            if value == 0 || value > MAX_CANVAS_SIZE {
                return Err(CoreError::Validation(format!(
                    "Canvas {side} must be between 1 and {MAX_CANVAS_SIZE} (got {value})"
                )));
            }
        }
        for (index, layer) in self.layers.iter().enumerate() {
            layer
                .validate()
                .map_err(|msg| CoreError::Validation(format!("Layer {index}: {msg}")))?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Layer
// ---------------------------------------------------------------------------

/// One visual element with its placement and kind-specific content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    #[serde(flatten)]
    pub common: LayerCommon,
    #[serde(flatten)]
    pub kind: LayerKind,
}

impl Layer {
    pub fn new(kind: LayerKind) -> Self {
        Self {
            common: LayerCommon::default(),
            kind,
        }
    }

    /// Place the layer's origin at `(left, top)`.
    pub fn at(mut self, left: f64, top: f64) -> Self {
        self.common.left = left;
        self.common.top = top;
        self
    }

    /// Whether the renderer should paint anything for this layer.
    pub fn is_paintable(&self) -> bool {
        self.common.visible && !matches!(self.kind, LayerKind::Placeholder(_))
    }

    fn validate(&self) -> Result<(), String> {
        let c = &self.common;
        for (name, value) in [
            ("left", c.left),
            ("top", c.top),
            ("scaleX", c.scale_x),
            ("scaleY", c.scale_y),
            ("angle", c.angle),
            ("opacity", c.opacity),
        ] {
            if !value.is_finite() {
                return Err(format!("{name} must be a finite number"));
            }
        }
        if let Some(shadow) = &c.shadow {
            if !(shadow.blur.is_finite() && shadow.offset_x.is_finite() && shadow.offset_y.is_finite())
                || shadow.blur < 0.0
            {
                return Err("shadow values must be finite and blur non-negative".into());
            }
        }
        match &self.kind {
            LayerKind::Text(text) => {
                if !(text.font_size.is_finite() && text.font_size > 0.0) {
                    return Err("fontSize must be a positive number".into());
                }
                if !(text.line_height.is_finite() && text.line_height > 0.0) {
                    return Err("lineHeight must be a positive number".into());
                }
                if text.width.is_some_and(|w| !w.is_finite() || w < 0.0) {
                    return Err("width must be a non-negative number".into());
                }
            }
            LayerKind::Rectangle(shape) | LayerKind::Ellipse(shape) => {
                non_negative("width", shape.width)?;
                non_negative("height", shape.height)?;
                if let Some(w) = shape.stroke_width {
                    non_negative("strokeWidth", w)?;
                }
                if let Some(r) = shape.corner_radius {
                    non_negative("cornerRadius", r)?;
                }
            }
            LayerKind::Image(image) => {
                non_negative("width", image.width)?;
                non_negative("height", image.height)?;
                if let Some(r) = image.clip_radius {
                    non_negative("clipRadius", r)?;
                }
            }
            LayerKind::Placeholder(_) => {}
        }
        Ok(())
    }
}

fn non_negative(name: &str, value: f64) -> Result<(), String> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(format!("{name} must be a non-negative number (got {value})"))
    }
}

/// Placement, transform and effects shared by every layer kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerCommon {
    /// Editor label; ignored by the renderer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub left: f64,
    #[serde(default)]
    pub top: f64,
    #[serde(default = "default_one")]
    pub scale_x: f64,
    #[serde(default = "default_one")]
    pub scale_y: f64,
    /// Rotation in degrees about the layer origin.
    #[serde(default)]
    pub angle: f64,
    #[serde(default = "default_one")]
    pub opacity: f64,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shadow: Option<Shadow>,
}

impl Default for LayerCommon {
    fn default() -> Self {
        Self {
            name: None,
            left: 0.0,
            top: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            angle: 0.0,
            opacity: 1.0,
            visible: true,
            shadow: None,
        }
    }
}

impl LayerCommon {
    /// Opacity clamped to `0..=1`.
    pub fn effective_opacity(&self) -> f64 {
        self.opacity.clamp(0.0, 1.0)
    }
}

/// A blurred, offset copy drawn beneath a layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shadow {
    pub color: String,
    #[serde(default)]
    pub blur: f64,
    #[serde(default)]
    pub offset_x: f64,
    #[serde(default)]
    pub offset_y: f64,
}

/// Kind-specific layer content, tagged by `kind` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum LayerKind {
    Text(TextLayer),
    Rectangle(ShapeLayer),
    Ellipse(ShapeLayer),
    Image(ImageLayer),
    /// Editor-only marker. Never substituted, never painted.
    Placeholder(PlaceholderLayer),
}

// ---------------------------------------------------------------------------
// Text
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextLayer {
    /// May contain `{{name}}` tokens.
    pub content: String,
    #[serde(default = "default_font_family")]
    pub font_family: String,
    #[serde(default = "default_font_size")]
    pub font_size: f64,
    #[serde(default)]
    pub font_weight: FontWeight,
    #[serde(default)]
    pub font_style: FontStyle,
    #[serde(default)]
    pub underline: bool,
    #[serde(default)]
    pub text_align: TextAlign,
    #[serde(default = "default_text_color")]
    pub fill_color: String,
    /// Text box width; alignment is computed within it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default = "default_line_height")]
    pub line_height: f64,
}

impl TextLayer {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            font_family: default_font_family(),
            font_size: DEFAULT_FONT_SIZE,
            font_weight: FontWeight::default(),
            font_style: FontStyle::default(),
            underline: false,
            text_align: TextAlign::default(),
            fill_color: default_text_color(),
            width: None,
            line_height: DEFAULT_LINE_HEIGHT,
        }
    }
}

/// CSS font weight: a keyword or a numeric weight.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FontWeight {
    Numeric(u16),
    Keyword(FontWeightKeyword),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontWeightKeyword {
    Normal,
    Bold,
    Lighter,
    Bolder,
}

impl Default for FontWeight {
    fn default() -> Self {
        Self::Keyword(FontWeightKeyword::Normal)
    }
}

impl FontWeight {
    /// The numeric weight, clamped to the CSS range `1..=1000`.
    pub fn numeric(self) -> u16 {
        match self {
            Self::Numeric(w) => w.clamp(1, 1000),
            Self::Keyword(FontWeightKeyword::Normal) => 400,
            Self::Keyword(FontWeightKeyword::Bold) => 700,
            Self::Keyword(FontWeightKeyword::Lighter) => 300,
            Self::Keyword(FontWeightKeyword::Bolder) => 900,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontStyle {
    #[default]
    Normal,
    Italic,
    Oblique,
}

impl FontStyle {
    pub fn as_css(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Italic => "italic",
            Self::Oblique => "oblique",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
    /// Rendered as `Left`; kept so stored documents round-trip.
    Justify,
}

// ---------------------------------------------------------------------------
// Shapes
// ---------------------------------------------------------------------------

/// Geometry and paint for rectangles and ellipses.
///
/// For ellipses, `width`/`height` are the bounding box and `corner_radius`
/// is ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShapeLayer {
    pub width: f64,
    pub height: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke_width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corner_radius: Option<f64>,
}

impl ShapeLayer {
    pub fn filled(width: f64, height: f64, color: impl Into<String>) -> Self {
        Self {
            width,
            height,
            fill_color: Some(color.into()),
            stroke_color: None,
            stroke_width: None,
            corner_radius: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Image
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageLayer {
    /// `http(s)://` URL or `data:` URI.
    pub source_url: String,
    pub width: f64,
    pub height: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters: Option<ImageFilters>,
    /// Corner rounding applied as a clip on the image bounds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clip_radius: Option<f64>,
}

/// Pixel filters applied to an image before compositing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImageFilters {
    pub grayscale: bool,
    /// Blur magnitude in `0..=1`.
    pub blur: f64,
    /// Brightness shift in `-1..=1`.
    pub brightness: f64,
}

impl ImageFilters {
    /// True when applying the filters would leave the image unchanged.
    pub fn is_identity(&self) -> bool {
        !self.grayscale && self.blur <= 0.0 && self.brightness == 0.0
    }
}

// ---------------------------------------------------------------------------
// Placeholder
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlaceholderLayer {
    pub width: f64,
    pub height: f64,
}

// ---------------------------------------------------------------------------
// serde defaults
// ---------------------------------------------------------------------------

fn default_one() -> f64 {
    1.0
}

fn default_true() -> bool {
    true
}

fn default_font_family() -> String {
    DEFAULT_FONT_FAMILY.to_string()
}

fn default_font_size() -> f64 {
    DEFAULT_FONT_SIZE
}

fn default_text_color() -> String {
    DEFAULT_TEXT_COLOR.to_string()
}

fn default_line_height() -> f64 {
    DEFAULT_LINE_HEIGHT
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    fn sample_json() -> serde_json::Value {
        json!({
            "canvasWidth": 1200,
            "canvasHeight": 630,
            "backgroundColor": "#ffffff",
            "layers": [
                {"kind": "rectangle", "left": 10, "top": 20, "width": 100, "height": 50,
                 "fillColor": "#ff0000", "cornerRadius": 8},
                {"kind": "text", "content": "Hello {{name}}", "fontSize": 64,
                 "fontWeight": "bold", "textAlign": "center", "width": 1200, "angle": 15},
                {"kind": "image", "sourceUrl": "https://example.com/a.png", "width": 200,
                 "height": 200, "clipRadius": 20, "filters": {"grayscale": true}},
                {"kind": "placeholder", "width": 300, "height": 300}
            ]
        })
    }

    #[test]
    fn parses_tagged_layers_with_defaults() {
        let scene = SceneDocument::from_json(&sample_json()).unwrap();
        assert_eq!(scene.canvas_width, 1200);
        assert_eq!(scene.layers.len(), 4);

        let rect = &scene.layers[0];
        assert_eq!(rect.common.left, 10.0);
        assert_eq!(rect.common.scale_x, 1.0);
        assert_eq!(rect.common.opacity, 1.0);
        assert!(rect.common.visible);
        assert_matches!(&rect.kind, LayerKind::Rectangle(s) if s.corner_radius == Some(8.0));

        let text = &scene.layers[1];
        assert_eq!(text.common.angle, 15.0);
        assert_matches!(&text.kind, LayerKind::Text(t) => {
            assert_eq!(t.font_weight.numeric(), 700);
            assert_eq!(t.text_align, TextAlign::Center);
            assert_eq!(t.font_family, DEFAULT_FONT_FAMILY);
            assert_eq!(t.line_height, DEFAULT_LINE_HEIGHT);
        });

        assert_matches!(&scene.layers[2].kind, LayerKind::Image(img) => {
            let filters = img.filters.as_ref().unwrap();
            assert!(filters.grayscale);
            assert_eq!(filters.blur, 0.0);
        });
        assert!(!scene.layers[3].is_paintable());
    }

    #[test]
    fn numeric_font_weight_is_accepted() {
        let layer: Layer =
            serde_json::from_value(json!({"kind": "text", "content": "x", "fontWeight": 600}))
                .unwrap();
        assert_matches!(layer.kind, LayerKind::Text(t) if t.font_weight.numeric() == 600);
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let err = SceneDocument::from_json(&json!({
            "canvasWidth": 10, "canvasHeight": 10,
            "layers": [{"kind": "triangle"}]
        }))
        .unwrap_err();
        assert_matches!(err, CoreError::Validation(_));
    }

    #[test]
    fn json_round_trip_preserves_document() {
        let scene = SceneDocument::from_json(&sample_json()).unwrap();
        let value = serde_json::to_value(&scene).unwrap();
        assert_eq!(SceneDocument::from_json(&value).unwrap(), scene);
    }

    #[test]
    fn empty_background_is_transparent() {
        let scene = SceneDocument::new(10, 10).with_background("  ");
        assert_eq!(scene.background(), None);
        let scene = SceneDocument::new(10, 10).with_background("#000");
        assert_eq!(scene.background(), Some("#000"));
    }

    #[test]
    fn validate_rejects_bad_canvas() {
        assert_matches!(SceneDocument::new(0, 10).validate(), Err(CoreError::Validation(_)));
        assert_matches!(
            SceneDocument::new(10, MAX_CANVAS_SIZE + 1).validate(),
            Err(CoreError::Validation(_))
        );
        assert!(SceneDocument::new(1200, 630).validate().is_ok());
    }

    #[test]
    fn validate_reports_offending_layer() {
        let scene = SceneDocument::new(100, 100)
            .with_layer(Layer::new(LayerKind::Rectangle(ShapeLayer::filled(10.0, 10.0, "red"))))
            .with_layer(Layer::new(LayerKind::Ellipse(ShapeLayer::filled(-1.0, 10.0, "red"))));
        let err = scene.validate().unwrap_err();
        assert!(err.to_string().contains("Layer 1"), "got: {err}");
    }

    #[test]
    fn hidden_layers_are_not_paintable() {
        let mut layer = Layer::new(LayerKind::Text(TextLayer::new("hi")));
        assert!(layer.is_paintable());
        layer.common.visible = false;
        assert!(!layer.is_paintable());
    }
}
