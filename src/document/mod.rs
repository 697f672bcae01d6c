//! # Template Document Model
//!
//! The scene graph of one printable side is an ordered list of
//! [`GraphicObject`]s; list order is z-order (first = bottom).
//!
//! ```
//! use mailcraft::document::*;
//!
//! // Rust construction
//! let title = GraphicObject::text("Hello {firstName}").with_position(100.0, 100.0);
//!
//! // JSON, including shorthand objects
//! let objects = parse_object_list(r#"[{"text": "Hi"}, {"type": "shape", "shape": "ellipse"}]"#).unwrap();
//! assert_eq!(objects.len(), 2);
//! assert!(objects[0].is_text());
//! # let _ = title;
//! ```

pub mod fragment;
pub mod types;

pub use fragment::{AssetLibrary, AssetReference, DesignFragment, DesignGenerator};
pub use types::*;

use serde::{Deserialize, Serialize};

use crate::variables::VariableBinding;

/// Stable identifier of an object across its whole lifetime.
pub type ObjectId = String;

/// Generate a fresh object id.
pub fn new_object_id() -> ObjectId {
    uuid::Uuid::new_v4().to_string()
}

// ============================================================================
// SHORTHAND DESERIALIZATION
// ============================================================================

/// Shorthand keys: (shorthand_key, type_name, target_field, preset).
///
/// When an object has no `"type"` field, these shorthands are checked in
/// order. The shorthand key's value is moved to `target_field`, `"type"` is
/// set to `type_name`, and the optional preset `(field, value)` is inserted.
///
/// Example: `{"qr_code": "https://x.io/r/1"}` →
/// `{"type": "shape", "qrPayload": "https://x.io/r/1", "shape": "qr"}`
const SHORTHANDS: &[(&str, &str, &str, Option<(&str, &str)>)] = &[
    ("text", "text", "content", None),
    ("image", "image", "src", None),
    ("shape", "shape", "shape", None),
    ("qr_code", "shape", "qrPayload", Some(("shape", "qr"))),
];

/// Rewrite a shorthand JSON object to canonical `{"type": ...}` form.
/// Only called when the map has no `"type"` key.
fn normalize_shorthand(map: &mut serde_json::Map<String, serde_json::Value>) -> Result<(), String> {
    for &(key, type_name, field, preset) in SHORTHANDS {
        if let Some(val) = map.remove(key) {
            map.insert("type".into(), serde_json::Value::String(type_name.into()));
            map.insert(field.into(), val);
            if let Some((preset_key, preset_val)) = preset {
                map.insert(preset_key.into(), serde_json::Value::String(preset_val.into()));
            }
            return Ok(());
        }
    }
    Err(format!(
        "object has no 'type' field and no shorthand key ({})",
        SHORTHANDS
            .iter()
            .map(|(k, _, _, _)| *k)
            .collect::<Vec<_>>()
            .join(", ")
    ))
}

/// Deserialize a `Vec<GraphicObject>` with shorthand support.
///
/// Each element is first parsed as raw JSON. If it lacks a `"type"` field,
/// shorthand normalization rewrites it to canonical form before passing it
/// to `GraphicObject`'s derived deserializer.
pub(crate) fn deserialize_objects<'de, D>(deserializer: D) -> Result<Vec<GraphicObject>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let values: Vec<serde_json::Value> = Vec::deserialize(deserializer)?;
    values
        .into_iter()
        .enumerate()
        .map(|(i, v)| object_from_value(v).map_err(|e| serde::de::Error::custom(format!("objects[{}]: {}", i, e))))
        .collect()
}

fn object_from_value(v: serde_json::Value) -> Result<GraphicObject, String> {
    let mut obj = match v {
        serde_json::Value::Object(map) => map,
        other => return Err(format!("expected object, got {}", other)),
    };
    let positioned = obj
        .get("geometry")
        .and_then(serde_json::Value::as_object)
        .is_some_and(|g| g.contains_key("left") || g.contains_key("top"));
    if !obj.contains_key("type") {
        normalize_shorthand(&mut obj)?;
    }
    let mut parsed: GraphicObject = serde_json::from_value(serde_json::Value::Object(obj)).map_err(|e| e.to_string())?;
    parsed.needs_placement = !positioned;
    Ok(parsed)
}

/// Parse a pasted object list (canonical or shorthand JSON array).
pub fn parse_object_list(json: &str) -> Result<Vec<GraphicObject>, crate::MailcraftError> {
    #[derive(Deserialize)]
    struct Wrapper(#[serde(deserialize_with = "deserialize_objects")] Vec<GraphicObject>);

    let Wrapper(objects) = serde_json::from_str(json)?;
    Ok(objects)
}

// ============================================================================
// GRAPHIC OBJECT
// ============================================================================

/// The type-specific payload of an object. Serialized as the `"type"` tag
/// plus the payload's fields, inline with the rest of the object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ObjectBody {
    Text(TextData),
    Shape(ShapeData),
    Image(ImageData),
}

impl ObjectBody {
    /// Human-readable display label (from [`ObjectMeta::label`]).
    pub fn label(&self) -> &'static str {
        match self {
            ObjectBody::Text(_) => TextData::label(),
            ObjectBody::Shape(s) if s.shape == ShapeKind::Qr => "QR Code",
            ObjectBody::Shape(_) => ShapeData::label(),
            ObjectBody::Image(_) => ImageData::label(),
        }
    }

    /// Editor defaults for every object type.
    pub fn all_editor_defaults() -> Vec<Self> {
        vec![
            ObjectBody::Text(TextData::editor_default()),
            ObjectBody::Shape(ShapeData::editor_default()),
            ObjectBody::Image(ImageData::editor_default()),
        ]
    }
}

/// A single placeable element on a surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphicObject {
    #[serde(default = "new_object_id")]
    pub id: ObjectId,
    #[serde(flatten)]
    pub body: ObjectBody,
    #[serde(default)]
    pub geometry: Geometry,
    #[serde(default)]
    pub style: Style,
    #[serde(default, skip_serializing_if = "Chrome::is_default")]
    pub chrome: Chrome,
    #[serde(default, skip_serializing_if = "VariableBinding::is_none")]
    pub binding: VariableBinding,
    /// Created without a position; the editor centres it when it is added.
    #[serde(skip)]
    pub(crate) needs_placement: bool,
}

impl GraphicObject {
    /// A new object with a fresh id and default geometry.
    pub fn new(body: ObjectBody) -> Self {
        Self {
            id: new_object_id(),
            body,
            geometry: Geometry::default(),
            style: Style::default(),
            chrome: Chrome::default(),
            binding: VariableBinding::default(),
            needs_placement: true,
        }
    }

    /// A text object sized to its content.
    pub fn text(content: impl Into<String>) -> Self {
        let data = TextData::new(content);
        let (w, h) = data.estimated_size();
        let mut obj = Self::new(ObjectBody::Text(data));
        obj.geometry.width = w;
        obj.geometry.height = h;
        obj.style = Style::filled("#111827");
        obj
    }

    /// A shape with the given unscaled size.
    pub fn shape(shape: ShapeData, width: f64, height: f64) -> Self {
        let mut obj = Self::new(ObjectBody::Shape(shape));
        obj.geometry.width = width;
        obj.geometry.height = height;
        obj.style = Style::filled("#d1d5db");
        obj
    }

    /// An image at its natural size.
    pub fn image(src: impl Into<String>, natural_width: u32, natural_height: u32) -> Self {
        let mut obj = Self::new(ObjectBody::Image(ImageData::new(src)));
        obj.geometry.width = f64::from(natural_width);
        obj.geometry.height = f64::from(natural_height);
        obj
    }

    /// Builder: move to a position.
    pub fn with_position(mut self, left: f64, top: f64) -> Self {
        self.geometry.left = left;
        self.geometry.top = top;
        self.needs_placement = false;
        self
    }

    /// Whether the object still waits for a default position.
    pub fn needs_placement(&self) -> bool {
        self.needs_placement
    }

    /// Keep the current position as is.
    pub fn mark_placed(&mut self) {
        self.needs_placement = false;
    }

    /// Builder: replace the binding.
    pub fn with_binding(mut self, binding: VariableBinding) -> Self {
        self.binding = binding;
        self
    }

    pub fn is_text(&self) -> bool {
        matches!(self.body, ObjectBody::Text(_))
    }

    pub fn is_image(&self) -> bool {
        matches!(self.body, ObjectBody::Image(_))
    }

    /// Text content, for text objects.
    pub fn text_content(&self) -> Option<&str> {
        match &self.body {
            ObjectBody::Text(t) => Some(&t.content),
            _ => None,
        }
    }

    /// Mutable text payload, for text objects.
    pub fn text_data_mut(&mut self) -> Option<&mut TextData> {
        match &mut self.body {
            ObjectBody::Text(t) => Some(t),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        self.body.label()
    }

    /// Axis-aligned bounding box on the canvas.
    pub fn bounds(&self) -> Rect {
        self.geometry.bounds()
    }

    /// Fold text scaling into its dimensions so the stored scale stays 1.
    ///
    /// Repeated resize gestures otherwise compound scale factors and stretch
    /// glyphs. Returns true when anything changed. Non-text objects are left
    /// alone.
    pub fn bake_text_scale(&mut self) -> bool {
        let ObjectBody::Text(text) = &mut self.body else {
            return false;
        };
        let g = &mut self.geometry;
        if g.scale_x == 1.0 && g.scale_y == 1.0 {
            return false;
        }
        g.width *= g.scale_x;
        g.height *= g.scale_y;
        text.font_size *= g.scale_y;
        g.scale_x = 1.0;
        g.scale_y = 1.0;
        true
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variables::VariableType;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_canonical_json_shape() {
        let obj = GraphicObject::text("Hi").with_position(10.0, 20.0);
        let json = serde_json::to_value(&obj).unwrap();
        assert_eq!(json["type"], "text");
        assert_eq!(json["content"], "Hi");
        assert_eq!(json["geometry"]["left"], 10.0);
        assert!(json.get("binding").is_none());
        assert!(json.get("chrome").is_none());
    }

    #[test]
    fn test_serialize_roundtrip() {
        let obj = GraphicObject::shape(ShapeData::qr("https://example.com"), 300.0, 300.0)
            .with_position(40.0, 40.0)
            .with_binding(VariableBinding::of(VariableType::QrCode));
        let json = serde_json::to_string(&obj).unwrap();
        let back: GraphicObject = serde_json::from_str(&json).unwrap();
        assert_eq!(obj, back);
    }

    #[test]
    fn test_missing_id_is_generated() {
        let obj: GraphicObject =
            serde_json::from_str(r#"{"type": "image", "src": "a.png"}"#).unwrap();
        assert!(!obj.id.is_empty());
        assert!(obj.is_image());
    }

    #[test]
    fn test_shorthand_objects() {
        let objects = parse_object_list(
            r#"[
                {"text": "Hello {firstName}"},
                {"image": "https://cdn.example.com/logo.png"},
                {"shape": "ellipse"},
                {"qr_code": "https://x.io/r/1"}
            ]"#,
        )
        .unwrap();
        assert_eq!(objects[0].text_content(), Some("Hello {firstName}"));
        assert!(matches!(&objects[1].body, ObjectBody::Image(i) if i.src.ends_with("logo.png")));
        assert!(matches!(&objects[2].body, ObjectBody::Shape(s) if s.shape == ShapeKind::Ellipse));
        assert!(matches!(&objects[3].body, ObjectBody::Shape(s) if s.shape == ShapeKind::Qr));
        assert_eq!(objects[3].label(), "QR Code");
    }

    #[test]
    fn test_placement_follows_input_position() {
        let objects = parse_object_list(
            r#"[
                {"text": "floating"},
                {"text": "corner", "geometry": {"left": 0, "top": 0}},
                {"type": "shape", "shape": "rect", "geometry": {"width": 50, "height": 50}}
            ]"#,
        )
        .unwrap();
        assert!(objects[0].needs_placement());
        assert!(!objects[1].needs_placement());
        assert!(objects[2].needs_placement());

        assert!(GraphicObject::text("new").needs_placement());
        assert!(!GraphicObject::text("set").with_position(0.0, 0.0).needs_placement());
    }

    #[test]
    fn test_shorthand_unknown_key() {
        let err = parse_object_list(r#"[{"sparkle": true}]"#).unwrap_err();
        assert!(err.to_string().contains("objects[0]"));
    }

    #[test]
    fn test_bake_text_scale() {
        let mut obj = GraphicObject::text("Hi");
        obj.geometry.width = 100.0;
        obj.geometry.height = 50.0;
        obj.geometry.scale_x = 2.0;
        obj.geometry.scale_y = 1.5;
        assert!(obj.bake_text_scale());
        assert_eq!(obj.geometry.width, 200.0);
        assert_eq!(obj.geometry.height, 75.0);
        assert_eq!(obj.geometry.scale_x, 1.0);
        let ObjectBody::Text(t) = &obj.body else { unreachable!() };
        assert_eq!(t.font_size, 72.0);
        assert!(!obj.bake_text_scale());
    }

    #[test]
    fn test_bake_ignores_images() {
        let mut obj = GraphicObject::image("a.png", 100, 100);
        obj.geometry.scale_x = 0.5;
        assert!(!obj.bake_text_scale());
        assert_eq!(obj.geometry.scale_x, 0.5);
    }
}
