//! # Persistence Adapter
//!
//! Converts a [`Surface`] into the record written to storage and back.
//!
//! ## Surface record
//!
//! ```json
//! {
//!   "side": "back",
//!   "objects": [ ... ],
//!   "variableMappings": { "0": { "variableType": "custom", "isReusable": false, "fieldNames": ["firstName"] } },
//!   "thumbnail": "data:image/png;base64,...",
//!   "addressBlockZone": { "x": 1500.0, "y": 525.0, "width": 1125.0, "height": 600.0 },
//!   "backgroundColor": "#ffffff"
//! }
//! ```
//!
//! | Field | Notes |
//! |-------|-------|
//! | `variableMappings` | keyed by object index, only objects with a binding |
//! | `addressBlockZone` | back side of postal formats only |
//! | `thumbnail` | PNG data URL, may be empty |
//!
//! Older records without `side` (or a bare object array) load as the front
//! surface.

pub mod thumbnail;

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::MailcraftError;
use crate::config::EditorConfig;
use crate::document::{GraphicObject, Rect, deserialize_objects};
use crate::format::PrintFormat;
use crate::surface::{DEFAULT_BACKGROUND, Side, Surface};
use crate::variables::VariableBinding;

/// One persisted side of a template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedSurfaceRecord {
    pub side: Side,
    #[serde(default, deserialize_with = "deserialize_objects")]
    pub objects: Vec<GraphicObject>,
    /// Object index (as a string key) to binding.
    #[serde(default)]
    pub variable_mappings: BTreeMap<String, VariableBinding>,
    #[serde(default)]
    pub thumbnail: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_block_zone: Option<Rect>,
    #[serde(default = "default_background")]
    pub background_color: String,
}

fn default_background() -> String {
    DEFAULT_BACKGROUND.to_string()
}

impl PersistedSurfaceRecord {
    /// An empty record for `side`.
    pub fn empty(side: Side) -> Self {
        Self {
            side,
            objects: Vec::new(),
            variable_mappings: BTreeMap::new(),
            thumbnail: String::new(),
            address_block_zone: None,
            background_color: default_background(),
        }
    }

    /// Objects with the stored mappings applied over any inline bindings.
    ///
    /// Mapping keys that are not a valid index are skipped with a warning.
    pub fn objects_with_bindings(&self) -> Vec<GraphicObject> {
        let mut objects = self.objects.clone();
        for (key, binding) in &self.variable_mappings {
            match key.parse::<usize>().ok().and_then(|i| objects.get_mut(i)) {
                Some(obj) => obj.binding = binding.clone(),
                None => tracing::warn!(side = %self.side, key, "variable mapping points at no object"),
            }
        }
        objects
    }
}

/// Pre-`side` record layout.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacySurfaceRecord {
    #[serde(default, deserialize_with = "deserialize_objects")]
    objects: Vec<GraphicObject>,
    #[serde(default)]
    variable_mappings: BTreeMap<String, VariableBinding>,
    #[serde(default)]
    thumbnail: String,
    #[serde(default, alias = "background")]
    background_color: Option<String>,
}

impl From<LegacySurfaceRecord> for PersistedSurfaceRecord {
    fn from(legacy: LegacySurfaceRecord) -> Self {
        Self {
            side: Side::Front,
            objects: legacy.objects,
            variable_mappings: legacy.variable_mappings,
            thumbnail: legacy.thumbnail,
            address_block_zone: None,
            background_color: legacy.background_color.unwrap_or_else(default_background),
        }
    }
}

/// Parse a surface record, accepting the legacy layouts.
pub fn parse_surface_record(json: &str) -> Result<PersistedSurfaceRecord, MailcraftError> {
    surface_record_from_value(serde_json::from_str(json)?)
}

/// Interpret a JSON value as a surface record, accepting the legacy layouts.
pub fn surface_record_from_value(value: Value) -> Result<PersistedSurfaceRecord, MailcraftError> {
    match value {
        Value::Array(_) => {
            let legacy = LegacySurfaceRecord::deserialize(serde_json::json!({ "objects": value }))?;
            tracing::debug!("loading bare object array as front surface");
            Ok(legacy.into())
        }
        Value::Object(map) if map.contains_key("side") => Ok(serde_json::from_value(Value::Object(map))?),
        Value::Object(_) => {
            tracing::debug!("loading record without side as front surface");
            Ok(LegacySurfaceRecord::deserialize(value)?.into())
        }
        other => Err(MailcraftError::Serialization(<serde_json::Error as serde::de::Error>::custom(
            format!("expected a surface record, got {}", other),
        ))),
    }
}

/// Both sides of a saved template plus the format they were laid out for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateRecord {
    pub format_id: String,
    #[serde(deserialize_with = "deserialize_surfaces")]
    pub surfaces: Vec<PersistedSurfaceRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<DateTime<Utc>>,
}

fn deserialize_surfaces<'de, D>(deserializer: D) -> Result<Vec<PersistedSurfaceRecord>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let values: Vec<Value> = Vec::deserialize(deserializer)?;
    values
        .into_iter()
        .enumerate()
        .map(|(i, v)| {
            surface_record_from_value(v).map_err(|e| serde::de::Error::custom(format!("surfaces[{}]: {}", i, e)))
        })
        .collect()
}

impl TemplateRecord {
    pub fn surface(&self, side: Side) -> Option<&PersistedSurfaceRecord> {
        self.surfaces.iter().find(|s| s.side == side)
    }

    pub fn format(&self) -> Result<PrintFormat, MailcraftError> {
        PrintFormat::parse(&self.format_id)
    }
}

/// Parse a template record. A bare surface record (any layout) becomes a
/// single-surface template on the default format.
pub fn parse_template_record(json: &str) -> Result<TemplateRecord, MailcraftError> {
    let value: Value = serde_json::from_str(json)?;
    if value.get("surfaces").is_some() {
        return Ok(serde_json::from_value(value)?);
    }
    let format_id = value
        .get("formatId")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| PrintFormat::default_format().id);
    Ok(TemplateRecord {
        format_id,
        surfaces: vec![surface_record_from_value(value)?],
        saved_at: None,
    })
}

/// Serialize a surface.
///
/// Geometry is read at 1:1 zoom; the surface's zoom is restored afterwards.
/// A thumbnail failure is logged and leaves the thumbnail empty.
pub fn extract(surface: &mut Surface, format: &PrintFormat, config: &EditorConfig) -> PersistedSurfaceRecord {
    let view = surface.canonical_view();
    let objects = view.objects().to_vec();

    let variable_mappings = objects
        .iter()
        .enumerate()
        .filter(|(_, o)| !o.binding.is_none())
        .map(|(i, o)| (i.to_string(), o.binding.clone()))
        .collect();

    let thumbnail = match thumbnail::render_data_url(&objects, view.background_color(), format, config.thumbnail_width)
    {
        Ok(url) => url,
        Err(e) => {
            tracing::warn!(side = %view.side(), error = %e, "thumbnail generation failed");
            String::new()
        }
    };

    let address_block_zone = match view.side() {
        Side::Back => view.address_zone(),
        Side::Front => None,
    };

    PersistedSurfaceRecord {
        side: view.side(),
        objects,
        variable_mappings,
        thumbnail,
        address_block_zone,
        background_color: view.background_color().to_string(),
    }
}

// ============================================================================
// STORAGE CONTRACT
// ============================================================================

/// Where template records live. The editor never talks to storage itself;
/// hosts pass records in and take them out.
pub trait TemplateStore {
    fn save(&mut self, id: &str, record: TemplateRecord) -> Result<(), MailcraftError>;
    fn load(&self, id: &str) -> Result<Option<TemplateRecord>, MailcraftError>;
    fn delete(&mut self, id: &str) -> Result<bool, MailcraftError>;
    fn list(&self) -> Result<Vec<String>, MailcraftError>;
}

/// Records kept as JSON strings in memory, so a save/load round trip goes
/// through the same serialization as real storage.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    records: HashMap<String, String>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TemplateStore for InMemoryStore {
    fn save(&mut self, id: &str, mut record: TemplateRecord) -> Result<(), MailcraftError> {
        record.saved_at.get_or_insert_with(Utc::now);
        self.records.insert(id.to_string(), serde_json::to_string(&record)?);
        Ok(())
    }

    fn load(&self, id: &str) -> Result<Option<TemplateRecord>, MailcraftError> {
        self.records.get(id).map(|json| parse_template_record(json)).transpose()
    }

    fn delete(&mut self, id: &str) -> Result<bool, MailcraftError> {
        Ok(self.records.remove(id).is_some())
    }

    fn list(&self) -> Result<Vec<String>, MailcraftError> {
        let mut ids: Vec<String> = self.records.keys().cloned().collect();
        ids.sort();
        Ok(ids)
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

    fn back_surface() -> Surface {
        let format = PrintFormat::default();
        let mut s = Surface::new(Side::Back, 10);
        s.set_address_zone(format.address_block_zone());
        s.push(GraphicObject::text("Plain"));
        s.push(GraphicObject::text("Hi {firstName}").with_binding(VariableBinding::custom(vec!["firstName".into()])));
        s.push(GraphicObject::image("logo.png", 200, 100).with_binding(VariableBinding::of(VariableType::Logo)));
        s
    }

    #[test]
    fn test_extract_maps_only_bound_objects() {
        let mut s = back_surface();
        let record = extract(&mut s, &PrintFormat::default(), &EditorConfig::default());
        assert_eq!(record.side, Side::Back);
        assert_eq!(record.variable_mappings.keys().cloned().collect::<Vec<_>>(), ["1", "2"]);
        assert_eq!(record.variable_mappings["2"].variable_type, VariableType::Logo);
        assert!(record.address_block_zone.is_some());
        assert!(record.thumbnail.starts_with("data:image/png;base64,"));
    }

    #[test]
    fn test_extract_front_has_no_zone() {
        let mut s = Surface::new(Side::Front, 10);
        s.set_address_zone(PrintFormat::default().address_block_zone());
        let record = extract(&mut s, &PrintFormat::default(), &EditorConfig::default());
        assert_eq!(record.address_block_zone, None);
    }

    #[test]
    fn test_extract_restores_zoom() {
        let mut s = back_surface();
        s.set_zoom(0.35);
        let record = extract(&mut s, &PrintFormat::default(), &EditorConfig::default());
        assert_eq!(s.zoom(), 0.35);
        assert_eq!(record.objects, s.objects());
    }

    #[test]
    fn test_record_json_layout() {
        let mut s = back_surface();
        let record = extract(&mut s, &PrintFormat::default(), &EditorConfig::default());
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["side"], "back");
        assert_eq!(json["variableMappings"]["1"]["variableType"], "custom");
        assert_eq!(json["variableMappings"]["1"]["isReusable"], false);
        assert!(json.get("addressBlockZone").is_some());

        let parsed = parse_surface_record(&json.to_string()).unwrap();
        assert_eq!(parsed.side, record.side);
        assert_eq!(parsed.variable_mappings, record.variable_mappings);
        assert_eq!(parsed.address_block_zone, record.address_block_zone);
        assert_eq!(parsed.objects.len(), 3);
    }

    #[test]
    fn test_legacy_record_without_side() {
        let json = r##"{
            "objects": [{"text": "Hello {firstName}"}, {"type": "shape", "shape": "rect"}],
            "variableMappings": {"0": {"variableType": "firstName", "isReusable": false}},
            "background": "#fafafa"
        }"##;
        let record = parse_surface_record(json).unwrap();
        assert_eq!(record.side, Side::Front);
        assert_eq!(record.objects.len(), 2);
        assert_eq!(record.background_color, "#fafafa");
        let objects = record.objects_with_bindings();
        assert_eq!(objects[0].binding.variable_type, VariableType::FirstName);
    }

    #[test]
    fn test_legacy_bare_array() {
        let record = parse_surface_record(r#"[{"text": "Hi"}]"#).unwrap();
        assert_eq!(record.side, Side::Front);
        assert_eq!(record.objects.len(), 1);
    }

    #[test]
    fn test_rejects_scalar_record() {
        assert!(matches!(parse_surface_record("42"), Err(MailcraftError::Serialization(_))));
    }

    #[test]
    fn test_mapping_out_of_range_is_skipped() {
        let mut record = PersistedSurfaceRecord::empty(Side::Front);
        record.objects.push(GraphicObject::text("A"));
        record.variable_mappings.insert("7".into(), VariableBinding::of(VariableType::City));
        record.variable_mappings.insert("x".into(), VariableBinding::of(VariableType::City));
        let objects = record.objects_with_bindings();
        assert!(objects[0].binding.is_none());
    }

    #[test]
    fn test_template_record_from_bare_surface() {
        let template = parse_template_record(r#"{"objects": [{"text": "Hi"}]}"#).unwrap();
        assert_eq!(template.format_id, PrintFormat::default_format().id);
        assert_eq!(template.surfaces.len(), 1);
        assert!(template.surface(Side::Front).is_some());
        assert!(template.surface(Side::Back).is_none());
    }

    #[test]
    fn test_in_memory_store() {
        let mut store = InMemoryStore::new();
        let record = TemplateRecord {
            format_id: "postcard_6x9".into(),
            surfaces: vec![PersistedSurfaceRecord::empty(Side::Front), PersistedSurfaceRecord::empty(Side::Back)],
            saved_at: None,
        };
        store.save("spring", record.clone()).unwrap();
        let loaded = store.load("spring").unwrap().unwrap();
        assert_eq!(loaded.surfaces, record.surfaces);
        assert!(loaded.saved_at.is_some());
        assert_eq!(store.list().unwrap(), ["spring"]);
        assert!(store.delete("spring").unwrap());
        assert!(store.load("spring").unwrap().is_none());
    }
}
