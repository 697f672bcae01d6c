//! Object payload types for the template document model.
//!
//! All types derive `Serialize + Deserialize` so the same types work for
//! in-memory editing, history snapshots, and persisted records.
//!
//! Each payload implements [`ObjectMeta`] to declare its display label
//! and editor default.

use serde::{Deserialize, Serialize};

/// Metadata that every object payload must provide.
pub trait ObjectMeta: Sized {
    /// Human-readable display label (e.g. "Text", "QR Code").
    fn label() -> &'static str;

    /// Sensible starter value when the object is created from a toolbar.
    ///
    /// Distinct from `Default`: editor defaults have example content so new
    /// objects are visible immediately.
    fn editor_default() -> Self;
}

fn default_one() -> f64 {
    1.0
}

// ============================================================================
// GEOMETRY
// ============================================================================

/// Axis-aligned rectangle in canvas pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Whether `other` lies entirely within this rectangle (edges inclusive).
    pub fn contains_rect(&self, other: &Rect) -> bool {
        const EPS: f64 = 1e-6;
        other.x >= self.x - EPS
            && other.y >= self.y - EPS
            && other.right() <= self.right() + EPS
            && other.bottom() <= self.bottom() + EPS
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }
}

/// Position, size, scale and rotation of an object.
///
/// `width`/`height` are the unscaled size; the rendered size is
/// `width * scale_x` by `height * scale_y`. Rotation is in degrees around the
/// top-left corner and always applies to the unscaled box, so resizing never
/// shears text.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Geometry {
    #[serde(default)]
    pub left: f64,
    #[serde(default)]
    pub top: f64,
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub height: f64,
    #[serde(default = "default_one")]
    pub scale_x: f64,
    #[serde(default = "default_one")]
    pub scale_y: f64,
    #[serde(default)]
    pub angle: f64,
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            left: 0.0,
            top: 0.0,
            width: 0.0,
            height: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            angle: 0.0,
        }
    }
}

impl Geometry {
    /// Geometry at a position with the given unscaled size.
    pub fn at(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
            ..Default::default()
        }
    }

    /// Rendered width (after scale).
    pub fn scaled_width(&self) -> f64 {
        self.width * self.scale_x
    }

    /// Rendered height (after scale).
    pub fn scaled_height(&self) -> f64 {
        self.height * self.scale_y
    }

    /// Normalize rotation into `[0, 360)`.
    pub fn normalize_angle(&mut self) {
        let a = self.angle % 360.0;
        self.angle = if a < 0.0 { a + 360.0 } else { a };
        if self.angle >= 360.0 {
            self.angle = 0.0;
        }
    }

    /// Axis-aligned bounding box of the rotated, scaled object.
    pub fn bounds(&self) -> Rect {
        let w = self.scaled_width();
        let h = self.scaled_height();
        if self.angle == 0.0 {
            return Rect::new(self.left, self.top, w, h);
        }

        let (sin, cos) = self.angle.to_radians().sin_cos();
        let corners = [(0.0, 0.0), (w, 0.0), (w, h), (0.0, h)];
        let mut min_x = f64::INFINITY;
        let mut min_y = f64::INFINITY;
        let mut max_x = f64::NEG_INFINITY;
        let mut max_y = f64::NEG_INFINITY;
        for (cx, cy) in corners {
            let x = self.left + cx * cos - cy * sin;
            let y = self.top + cx * sin + cy * cos;
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
        Rect::new(min_x, min_y, max_x - min_x, max_y - min_y)
    }
}

// ============================================================================
// STYLE
// ============================================================================

/// Paint attributes of an object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Style {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke: Option<String>,
    #[serde(default)]
    pub stroke_width: f64,
    #[serde(default = "default_one")]
    pub opacity: f64,
}

impl Default for Style {
    fn default() -> Self {
        Self {
            fill: None,
            stroke: None,
            stroke_width: 0.0,
            opacity: 1.0,
        }
    }
}

impl Style {
    pub fn filled(color: impl Into<String>) -> Self {
        Self {
            fill: Some(color.into()),
            ..Default::default()
        }
    }
}

/// Selection-style decoration drawn around an object in the editor.
///
/// Variable text objects get a distinctive border, corner handles and a chip
/// background. Images never carry chrome: changing it on an image shifts its
/// rendered position after zooming.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chrome {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub border_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corner_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub border_dash: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chip_color: Option<String>,
}

impl Chrome {
    /// Whether this is the default (undecorated) appearance.
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

// ============================================================================
// TEXT
// ============================================================================

/// Horizontal text alignment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
    Justify,
}

fn default_font_family() -> String {
    "Inter".into()
}

fn default_font_size() -> f64 {
    48.0
}

fn default_font_weight() -> String {
    "normal".into()
}

fn default_line_height() -> f64 {
    1.16
}

/// A text box. Its content may contain `{fieldName}` merge tokens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextData {
    #[serde(default)]
    pub content: String,
    #[serde(default = "default_font_family")]
    pub font_family: String,
    #[serde(default = "default_font_size")]
    pub font_size: f64,
    #[serde(default = "default_font_weight")]
    pub font_weight: String,
    #[serde(default)]
    pub text_align: TextAlign,
    #[serde(default = "default_line_height")]
    pub line_height: f64,
}

impl Default for TextData {
    fn default() -> Self {
        Self {
            content: String::new(),
            font_family: default_font_family(),
            font_size: default_font_size(),
            font_weight: default_font_weight(),
            text_align: TextAlign::default(),
            line_height: default_line_height(),
        }
    }
}

impl TextData {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }

    /// Approximate box size for a fresh text object: one line per `\n`,
    /// average glyph width of 0.6 em.
    pub fn estimated_size(&self) -> (f64, f64) {
        let lines: Vec<&str> = self.content.split('\n').collect();
        let longest = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0);
        let width = (longest.max(1) as f64) * self.font_size * 0.6;
        let height = lines.len() as f64 * self.font_size * self.line_height;
        (width, height)
    }
}

impl ObjectMeta for TextData {
    fn label() -> &'static str {
        "Text"
    }
    fn editor_default() -> Self {
        Self::new("Hello {firstName}")
    }
}

// ============================================================================
// SHAPES
// ============================================================================

/// Vector shape kinds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeKind {
    #[default]
    Rect,
    Ellipse,
    Line,
    /// Square placeholder replaced by a per-recipient QR code at merge time.
    Qr,
}

/// A vector shape.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShapeData {
    #[serde(default)]
    pub shape: ShapeKind,
    #[serde(default)]
    pub corner_radius: f64,
    /// Sample payload rendered in previews for QR placeholders.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qr_payload: Option<String>,
}

impl ShapeData {
    pub fn new(shape: ShapeKind) -> Self {
        Self {
            shape,
            ..Default::default()
        }
    }

    /// A QR placeholder with a sample payload.
    pub fn qr(payload: impl Into<String>) -> Self {
        Self {
            shape: ShapeKind::Qr,
            qr_payload: Some(payload.into()),
            ..Default::default()
        }
    }

    /// Whether the shape must keep a 1:1 aspect ratio.
    pub fn is_square_locked(&self) -> bool {
        self.shape == ShapeKind::Qr
    }
}

impl ObjectMeta for ShapeData {
    fn label() -> &'static str {
        "Shape"
    }
    fn editor_default() -> Self {
        Self::new(ShapeKind::Rect)
    }
}

// ============================================================================
// IMAGES
// ============================================================================

/// A bitmap image. `src` is an uploaded data URL or an asset library URL.
///
/// Geometry `width`/`height` hold the natural pixel size; the displayed size
/// comes from the scale factors.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageData {
    #[serde(default)]
    pub src: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_id: Option<String>,
}

impl ImageData {
    pub fn new(src: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            asset_id: None,
        }
    }
}

impl ObjectMeta for ImageData {
    fn label() -> &'static str {
        "Image"
    }
    fn editor_default() -> Self {
        Self::default()
    }
}

// ============================================================================
// TESTS
// ============================================================================
