//! # Variable Detection
//!
//! Turns ordinary text and image objects into mail-merge fields.
//!
//! ## Token Grammar
//!
//! Any `{identifier}` substring, where the identifier is one or more ASCII
//! letters, digits or underscores, references a field:
//!
//! ```
//! use mailcraft::variables::{extract_field_names, has_variables};
//!
//! assert!(has_variables("Hello {firstName}!"));
//! assert!(!has_variables("Hello {first name}"));
//! assert_eq!(
//!     extract_field_names("{a} {b} {a}"),
//!     vec!["a".to_string(), "b".to_string()],
//! );
//! ```
//!
//! ## Styling
//!
//! Variable text objects carry a border/corner/chip [`Chrome`] in edit mode.
//! Preview mode suppresses the chrome but keeps the binding. Images can be
//! bound (per-recipient QR codes, logos) but their chrome is never touched.

pub mod catalog;

pub use catalog::{Applies, CATALOG, VariableType, VariableTypeInfo};

use serde::{Deserialize, Serialize};

use crate::config::EditorConfig;
use crate::document::{Chrome, GraphicObject};

/// Mail-merge metadata attached to an object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableBinding {
    #[serde(default)]
    pub variable_type: VariableType,
    /// `true` = same value for every recipient.
    #[serde(default = "default_reusable")]
    pub is_reusable: bool,
    /// Field names found in the text, in first-seen order (custom bindings only).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub field_names: Vec<String>,
}

fn default_reusable() -> bool {
    true
}

impl Default for VariableBinding {
    fn default() -> Self {
        Self {
            variable_type: VariableType::None,
            is_reusable: true,
            field_names: Vec::new(),
        }
    }
}

impl VariableBinding {
    /// A binding of the given type with the catalog's reusability default.
    pub fn of(variable_type: VariableType) -> Self {
        Self {
            variable_type,
            is_reusable: variable_type.default_reusable(),
            field_names: Vec::new(),
        }
    }

    /// A personalized custom binding over the given fields.
    pub fn custom(field_names: Vec<String>) -> Self {
        Self {
            variable_type: VariableType::Custom,
            is_reusable: false,
            field_names,
        }
    }

    pub fn is_none(&self) -> bool {
        self.variable_type.is_none()
    }
}

/// Whether the editor shows editing decorations or a print preview.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    #[default]
    Edit,
    Preview,
}

/// Colours used to mark variable text.
#[derive(Debug, Clone, PartialEq)]
pub struct VariablePalette {
    pub border_color: String,
    pub chip_color: String,
}

impl VariablePalette {
    pub fn from_config(config: &EditorConfig) -> Self {
        Self {
            border_color: config.variable_border_color.clone(),
            chip_color: config.variable_chip_color.clone(),
        }
    }

    /// The chrome applied to variable text in edit mode.
    pub fn chrome(&self) -> Chrome {
        Chrome {
            border_color: Some(self.border_color.clone()),
            corner_color: Some(self.border_color.clone()),
            border_dash: Some(vec![6.0, 4.0]),
            chip_color: Some(self.chip_color.clone()),
        }
    }
}

impl Default for VariablePalette {
    fn default() -> Self {
        Self::from_config(&EditorConfig::default())
    }
}

// ============================================================================
// TOKENS
// ============================================================================

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Iterate over `{identifier}` tokens, yielding the identifiers.
fn tokens(text: &str) -> impl Iterator<Item = &str> {
    let bytes = text.as_bytes();
    let mut pos = 0;
    std::iter::from_fn(move || {
        while pos < bytes.len() {
            if bytes[pos] != b'{' {
                pos += 1;
                continue;
            }
            let start = pos + 1;
            let mut end = start;
            while end < bytes.len() && is_ident_byte(bytes[end]) {
                end += 1;
            }
            if end > start && end < bytes.len() && bytes[end] == b'}' {
                pos = end + 1;
                return Some(&text[start..end]);
            }
            // Not a token: resume at the next byte so `{{name}` still finds `{name}`.
            pos = start;
        }
        None
    })
}

/// Whether the text contains at least one field token.
pub fn has_variables(text: &str) -> bool {
    tokens(text).next().is_some()
}

/// Distinct field names in first-seen order.
pub fn extract_field_names(text: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for name in tokens(text) {
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    names
}

/// Order-independent comparison of two field name sets.
pub fn same_field_set(a: &[String], b: &[String]) -> bool {
    a.len() == b.len() && a.iter().all(|n| b.contains(n))
}

// ============================================================================
// DETECTION
// ============================================================================

/// What a detection pass did to one object.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DetectionOutcome {
    /// The object is a custom variable after this pass.
    pub is_variable: bool,
    /// Field names after this pass.
    pub field_names: Vec<String>,
    /// The field set differs from before. Only this should reach the user.
    pub fields_changed: bool,
    /// The object lost its last token and was reverted to `none`.
    pub reverted: bool,
}

/// Re-evaluate a text object's membership in the variable system.
///
/// Non-text objects are left untouched. Text that gains tokens becomes a
/// personalized custom variable; an object that already was one keeps its
/// reusability and only has its field names refreshed. A text object whose
/// tokens all disappeared reverts to `none` only when its binding came from
/// detection (custom); a catalog binding assigned by hand is kept.
pub fn detect(obj: &mut GraphicObject, mode: DisplayMode, palette: &VariablePalette) -> DetectionOutcome {
    let Some(content) = obj.text_content() else {
        return DetectionOutcome::default();
    };
    let fields = extract_field_names(content);
    let previous = obj.binding.field_names.clone();

    if !fields.is_empty() {
        let fields_changed = !same_field_set(&previous, &fields);
        if obj.binding.variable_type == VariableType::Custom {
            obj.binding.field_names = fields.clone();
        } else {
            obj.binding = VariableBinding::custom(fields.clone());
        }
        apply_mode_chrome(obj, mode, palette);
        tracing::debug!(id = %obj.id, ?fields, fields_changed, "variable text detected");
        return DetectionOutcome {
            is_variable: true,
            field_names: fields,
            fields_changed,
            reverted: false,
        };
    }

    if obj.binding.variable_type == VariableType::Custom || !previous.is_empty() {
        obj.binding = VariableBinding::default();
        clear_chrome(obj);
        tracing::debug!(id = %obj.id, "variable text reverted");
        return DetectionOutcome {
            is_variable: false,
            field_names: Vec::new(),
            fields_changed: !previous.is_empty(),
            reverted: true,
        };
    }

    DetectionOutcome::default()
}

/// Assign a catalog binding by hand (e.g. from a "mark as variable" menu).
///
/// Setting [`VariableType::None`] removes the binding. Chrome follows the
/// binding for text and is never touched for images.
pub fn assign(
    obj: &mut GraphicObject,
    variable_type: VariableType,
    mode: DisplayMode,
    palette: &VariablePalette,
) {
    if variable_type.is_none() {
        obj.binding = VariableBinding::default();
        clear_chrome(obj);
        return;
    }

    let mut binding = VariableBinding::of(variable_type);
    if variable_type == VariableType::Custom {
        binding.field_names = obj.text_content().map(extract_field_names).unwrap_or_default();
    }
    obj.binding = binding;
    apply_mode_chrome(obj, mode, palette);
}

/// Apply or clear chrome to match the binding and display mode.
pub fn apply_mode_chrome(obj: &mut GraphicObject, mode: DisplayMode, palette: &VariablePalette) {
    if obj.is_image() {
        return;
    }
    if obj.binding.is_none() || mode == DisplayMode::Preview {
        clear_chrome(obj);
    } else {
        obj.chrome = palette.chrome();
    }
}

/// Reset chrome to the default appearance. Images are skipped.
pub fn clear_chrome(obj: &mut GraphicObject) {
    if obj.is_image() {
        return;
    }
    obj.chrome = Chrome::default();
}

/// Totals from a bulk sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SweepSummary {
    pub scanned: usize,
    pub variables: usize,
    pub styled: usize,
}

/// Scan every text object, re-detect tokens and apply or remove chip styling
/// in bulk. Used when toggling between edit and preview, and after loading.
///
/// Unbound text with tokens is promoted to custom and custom bindings get
/// fresh field names. Catalog bindings are kept as stored.
pub fn sweep(objects: &mut [GraphicObject], mode: DisplayMode, palette: &VariablePalette) -> SweepSummary {
    let mut summary = SweepSummary::default();
    for obj in objects.iter_mut().filter(|o| o.is_text()) {
        summary.scanned += 1;
        if matches!(obj.binding.variable_type, VariableType::None | VariableType::Custom) {
            detect(obj, mode, palette);
        }
        apply_mode_chrome(obj, mode, palette);
        if !obj.binding.is_none() {
            summary.variables += 1;
        }
        if !obj.chrome.is_default() {
            summary.styled += 1;
        }
    }
    summary
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::ShapeData;
    use pretty_assertions::assert_eq;

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_token_grammar() {
        assert!(has_variables("{a}"));
        assert!(has_variables("x{first_Name2}y"));
        assert!(!has_variables("{}"));
        assert!(!has_variables("{first-name}"));
        assert!(!has_variables("{unterminated"));
        assert!(!has_variables("no tokens"));
        assert_eq!(extract_field_names("{{name}}"), names(&["name"]));
        assert_eq!(extract_field_names("{ {b}"), names(&["b"]));
    }

    #[test]
    fn test_extract_ordered_distinct() {
        assert_eq!(
            extract_field_names("Hi {lastName}, {firstName} {lastName}"),
            names(&["lastName", "firstName"])
        );
    }

    #[test]
    fn test_non_ascii_text_is_safe() {
        assert_eq!(extract_field_names("¡Hola {nombre}! ☕ {"), names(&["nombre"]));
    }

    #[test]
    fn test_same_field_set_ignores_order() {
        assert!(same_field_set(&names(&["a", "b"]), &names(&["b", "a"])));
        assert!(!same_field_set(&names(&["a"]), &names(&["a", "b"])));
    }

    #[test]
    fn test_detect_round_trip() {
        let palette = VariablePalette::default();
        let mut obj = GraphicObject::text("Hello {firstName} {lastName}");

        let outcome = detect(&mut obj, DisplayMode::Edit, &palette);
        assert!(outcome.fields_changed);
        assert_eq!(obj.binding.variable_type, VariableType::Custom);
        assert!(!obj.binding.is_reusable);
        assert_eq!(obj.binding.field_names, names(&["firstName", "lastName"]));
        assert_eq!(obj.chrome, palette.chrome());

        obj.text_data_mut().unwrap().content = "Hello {firstName}".into();
        let outcome = detect(&mut obj, DisplayMode::Edit, &palette);
        assert!(outcome.fields_changed);
        assert_eq!(obj.binding.field_names, names(&["firstName"]));

        obj.text_data_mut().unwrap().content = "Hello there".into();
        let outcome = detect(&mut obj, DisplayMode::Edit, &palette);
        assert!(outcome.reverted);
        assert_eq!(obj.binding.variable_type, VariableType::None);
        assert!(obj.chrome.is_default());
    }

    #[test]
    fn test_unchanged_fields_do_not_notify() {
        let palette = VariablePalette::default();
        let mut obj = GraphicObject::text("{b} and {a}");
        assert!(detect(&mut obj, DisplayMode::Edit, &palette).fields_changed);

        obj.text_data_mut().unwrap().content = "{a} or {b}!".into();
        let outcome = detect(&mut obj, DisplayMode::Edit, &palette);
        assert!(!outcome.fields_changed);
        assert_eq!(obj.binding.field_names, names(&["a", "b"]));
    }

    #[test]
    fn test_preview_mode_suppresses_chrome() {
        let palette = VariablePalette::default();
        let mut obj = GraphicObject::text("{code}");
        detect(&mut obj, DisplayMode::Preview, &palette);
        assert_eq!(obj.binding.variable_type, VariableType::Custom);
        assert!(obj.chrome.is_default());
    }

    #[test]
    fn test_plain_text_without_binding_is_untouched() {
        let palette = VariablePalette::default();
        let mut obj = GraphicObject::text("plain");
        assert_eq!(detect(&mut obj, DisplayMode::Edit, &palette), DetectionOutcome::default());
    }

    #[test]
    fn test_manual_catalog_binding_survives_detection() {
        let palette = VariablePalette::default();
        let mut obj = GraphicObject::text("Jane");
        assign(&mut obj, VariableType::FirstName, DisplayMode::Edit, &palette);
        let outcome = detect(&mut obj, DisplayMode::Edit, &palette);
        assert!(!outcome.reverted);
        assert_eq!(obj.binding.variable_type, VariableType::FirstName);
    }

    #[test]
    fn test_image_binding_never_touches_chrome() {
        let palette = VariablePalette::default();
        let mut img = GraphicObject::image("qr.png", 200, 200);
        img.chrome.border_color = Some("#123456".into());
        let before = img.chrome.clone();

        for kind in CATALOG.iter().map(|i| i.variable_type).chain([VariableType::None]) {
            assign(&mut img, kind, DisplayMode::Edit, &palette);
            assert_eq!(img.chrome, before);
            assert_eq!(img.binding.variable_type, kind);
        }
        clear_chrome(&mut img);
        assert_eq!(img.chrome, before);
    }

    #[test]
    fn test_custom_binding_keeps_reusability() {
        let palette = VariablePalette::default();
        let mut obj = GraphicObject::text("Visit {storeName}");
        detect(&mut obj, DisplayMode::Edit, &palette);
        obj.binding.is_reusable = true;

        obj.text_data_mut().unwrap().content = "Visit {storeName} at {storeUrl}".into();
        let outcome = detect(&mut obj, DisplayMode::Edit, &palette);
        assert!(outcome.fields_changed);
        assert!(obj.binding.is_reusable);
        assert_eq!(obj.binding.field_names, names(&["storeName", "storeUrl"]));
    }

    #[test]
    fn test_sweep_keeps_stored_bindings() {
        let palette = VariablePalette::default();
        let mut catalog = GraphicObject::text("Dear {firstName}").with_binding(VariableBinding::of(VariableType::FirstName));
        let mut reusable = GraphicObject::text("{storeName}").with_binding(VariableBinding::custom(names(&["old"])));
        reusable.binding.is_reusable = true;
        let mut objects = vec![catalog.clone(), reusable, GraphicObject::text("Hi {city}")];

        let summary = sweep(&mut objects, DisplayMode::Preview, &palette);
        assert_eq!(summary.variables, 3);
        assert_eq!(objects[0].binding, VariableBinding::of(VariableType::FirstName));
        assert!(objects[1].binding.is_reusable);
        assert_eq!(objects[1].binding.field_names, names(&["storeName"]));
        assert_eq!(objects[2].binding, VariableBinding::custom(names(&["city"])));

        // A direct edit still turns tokenized text into a custom field.
        detect(&mut catalog, DisplayMode::Edit, &palette);
        assert_eq!(catalog.binding.variable_type, VariableType::Custom);
    }

    #[test]
    fn test_sweep_toggles_chrome() {
        let palette = VariablePalette::default();
        let mut objects = vec![
            GraphicObject::text("{a}"),
            GraphicObject::text("plain"),
            GraphicObject::shape(ShapeData::default(), 10.0, 10.0),
        ];

        let summary = sweep(&mut objects, DisplayMode::Edit, &palette);
        assert_eq!(summary, SweepSummary { scanned: 2, variables: 1, styled: 1 });

        let summary = sweep(&mut objects, DisplayMode::Preview, &palette);
        assert_eq!(summary.styled, 0);
        assert_eq!(objects[0].binding.variable_type, VariableType::Custom);
    }
}
