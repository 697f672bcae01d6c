//! End-to-end behaviour of the template editor through the public API.

use mailcraft::{
    EditorConfig, MailcraftError, PrintFormat, TemplateEditor,
    document::{AssetLibrary, AssetReference, DesignFragment, DesignGenerator, GraphicObject},
    editor::{NoticeLevel, RestoreResult, SurfaceLayout, Transform},
    persist::{self, InMemoryStore, TemplateStore},
    resize::{self, ResizeStrategy},
    surface::Side,
    variables::{VariableBinding, VariableType},
};
use pretty_assertions::assert_eq;
use std::collections::HashMap;

fn blank() -> TemplateEditor {
    TemplateEditor::blank(PrintFormat::default())
}

fn serialized(editor: &TemplateEditor) -> String {
    serde_json::to_string(editor.active_surface().unwrap().objects()).unwrap()
}

// ============================================================================
// HISTORY
// ============================================================================

#[test]
fn test_example_scenario() {
    let mut editor = blank();
    assert_eq!(editor.format().width_pixels, 1800);
    assert_eq!(editor.format().height_pixels, 1200);

    let id = editor
        .add_object(GraphicObject::text("Save {discount}% today").with_position(100.0, 100.0))
        .unwrap();
    let added = editor.active_surface().unwrap().get(&id).unwrap().clone();
    assert_eq!(
        added.binding,
        VariableBinding {
            variable_type: VariableType::Custom,
            is_reusable: false,
            field_names: vec!["discount".to_string()],
        }
    );
    assert_eq!(editor.active_surface().unwrap().history().len(), 2);

    assert_eq!(editor.undo().unwrap(), RestoreResult::Applied { index: 0 });
    assert_eq!(editor.active_surface().unwrap().history().current_index(), Some(0));
    assert!(editor.active_surface().unwrap().is_empty());
    editor.settle_restore();

    assert_eq!(editor.redo().unwrap(), RestoreResult::Applied { index: 1 });
    editor.settle_restore();
    let restored = editor.active_surface().unwrap().get(&id).unwrap();
    assert_eq!(restored.binding, added.binding);
    assert_eq!(restored.geometry, added.geometry);
}

#[test]
fn test_undo_redo_inverse_law() {
    let mut editor = blank();
    let id = editor.add_object(GraphicObject::text("Hello {firstName}")).unwrap();
    editor.transform(&id, Transform::move_to(300.0, 200.0)).unwrap();
    editor.set_text(&id, "Hello {firstName} {lastName}").unwrap();
    editor.add_object(GraphicObject::text("Second")).unwrap();
    editor.transform(&id, Transform::rotate(15.0)).unwrap();
    let n = 5;
    let final_state = serialized(&editor);

    for _ in 0..n {
        assert!(matches!(editor.undo().unwrap(), RestoreResult::Applied { .. }));
        editor.settle_restore();
    }
    assert_eq!(editor.undo().unwrap(), RestoreResult::AtLimit);
    for _ in 0..n {
        assert!(matches!(editor.redo().unwrap(), RestoreResult::Applied { .. }));
        editor.settle_restore();
    }
    assert_eq!(serialized(&editor), final_state);
}

#[test]
fn test_truncation_law() {
    let mut editor = blank();
    for i in 0..4 {
        editor.add_object(GraphicObject::text(format!("item {}", i))).unwrap();
    }
    for _ in 0..2 {
        editor.undo().unwrap();
        editor.settle_restore();
    }
    editor.add_object(GraphicObject::text("fresh")).unwrap();
    assert_eq!(editor.redo().unwrap(), RestoreResult::AtLimit);
    assert_eq!(editor.active_surface().unwrap().len(), 3);
}

#[test]
fn test_bounded_window() {
    let mut editor = blank();
    let id = editor.add_object(GraphicObject::text("drag me")).unwrap();
    for i in 0..149 {
        editor.transform(&id, Transform::move_to(f64::from(i), 0.0)).unwrap();
    }
    // 1 initial + 150 mutations, capped to the window
    let history = editor.active_surface().unwrap().history();
    assert_eq!(history.len(), 100);
    assert_eq!(history.current_index(), Some(99));
    assert_eq!(history.oldest().unwrap().step, 51);
    assert!(!history.can_redo());
}

#[test]
fn test_sides_have_independent_history() {
    let mut editor = blank();
    editor.add_object(GraphicObject::text("front")).unwrap();
    editor.set_active_side(Side::Back).unwrap();
    assert_eq!(editor.undo().unwrap(), RestoreResult::AtLimit);
    editor.set_active_side(Side::Front).unwrap();
    assert_eq!(editor.undo().unwrap(), RestoreResult::Applied { index: 0 });
}

// ============================================================================
// VARIABLES
// ============================================================================

#[test]
fn test_variable_round_trip() {
    let mut editor = blank();
    let id = editor.add_object(GraphicObject::text("Hello {firstName} {lastName}")).unwrap();
    let fields = |e: &TemplateEditor| e.active_surface().unwrap().get(&id).unwrap().binding.field_names.clone();
    assert_eq!(fields(&editor), ["firstName", "lastName"]);

    editor.set_text(&id, "Hello {firstName}").unwrap();
    assert_eq!(fields(&editor), ["firstName"]);

    editor.set_text(&id, "Hello friend").unwrap();
    let obj = editor.active_surface().unwrap().get(&id).unwrap();
    assert_eq!(obj.binding.variable_type, VariableType::None);
    assert!(obj.chrome.is_default());
}

#[test]
fn test_image_binding_never_touches_chrome() {
    let mut editor = blank();
    let id = editor.add_object(GraphicObject::image("https://cdn.example/qr.png", 400, 400)).unwrap();
    let chrome = editor.active_surface().unwrap().get(&id).unwrap().chrome.clone();
    for variable_type in [
        VariableType::QrCode,
        VariableType::Logo,
        VariableType::FirstName,
        VariableType::Custom,
        VariableType::None,
    ] {
        editor.set_variable_type(&id, variable_type).unwrap();
        let obj = editor.active_surface().unwrap().get(&id).unwrap();
        assert_eq!(obj.chrome, chrome);
        assert_eq!(obj.binding.variable_type, variable_type);
    }
}

// ============================================================================
// RESIZE
// ============================================================================

#[test]
fn test_resize_inverse_within_tolerance() {
    let a = PrintFormat::lookup("postcard_4x6").unwrap();
    let b = PrintFormat::lookup("postcard_6x11").unwrap();
    let config = EditorConfig::default();
    let objects = vec![
        GraphicObject::text("{firstName}").with_position(120.0, 80.0),
        GraphicObject::image("photo.jpg", 600, 400).with_position(900.0, 300.0),
    ];

    let there = resize::migrate(&objects, &a, &b, ResizeStrategy::Scale, &config);
    let back = resize::migrate(&there.objects, &b, &a, ResizeStrategy::Scale, &config);
    for (orig, round) in objects.iter().zip(&back.objects) {
        assert_eq!(orig.id, round.id);
        assert_eq!(orig.binding, round.binding);
        let (o, r) = (orig.bounds(), round.bounds());
        for (x, y) in [(o.x, r.x), (o.y, r.y), (o.width, r.width), (o.height, r.height)] {
            assert!((x - y).abs() < 1e-6, "{} vs {}", x, y);
        }
    }
}

#[test]
fn test_reflow_falls_back_to_scale() {
    let mut editor = blank();
    editor.add_object(GraphicObject::text("x").with_position(10.0, 10.0)).unwrap();
    let report = editor
        .change_format(PrintFormat::lookup("letter_8_5x11").unwrap(), ResizeStrategy::Reflow)
        .unwrap();
    assert_eq!(report.strategy_requested, ResizeStrategy::Reflow);
    assert_eq!(report.strategy_used, ResizeStrategy::Scale);
    assert!(report.major_change);
    assert!(report.warnings.len() >= 2);
    assert!(editor.take_notices().iter().all(|n| n.level == NoticeLevel::Warning));
}

// ============================================================================
// PERSISTENCE
// ============================================================================

#[test]
fn test_legacy_record_loads_as_front() {
    let json = r#"{
        "objects": [
            {"type": "text", "content": "Dear {firstName},", "geometry": {"left": 40, "top": 40, "width": 400, "height": 60}},
            {"type": "image", "src": "logo.png", "geometry": {"left": 1400, "top": 40, "width": 300, "height": 120}}
        ],
        "variableMappings": {"1": {"variableType": "logo", "isReusable": true}}
    }"#;
    let template = persist::parse_template_record(json).unwrap();
    let mut editor = TemplateEditor::new(template.format().unwrap(), SurfaceLayout::Dual, EditorConfig::default());
    editor.load_template(&template).unwrap();

    let front = editor.surface(Side::Front).unwrap();
    assert_eq!(front.len(), 2);
    assert_eq!(front.objects()[0].binding.field_names, ["firstName"]);
    assert_eq!(front.objects()[1].binding.variable_type, VariableType::Logo);
    assert!(editor.surface(Side::Back).unwrap().is_empty());
}

#[test]
fn test_store_round_trip_keeps_variables() {
    let mut editor = blank();
    editor.add_object(GraphicObject::text("Hi {firstName}").with_position(50.0, 50.0)).unwrap();
    editor.set_active_side(Side::Back).unwrap();
    editor
        .add_object(GraphicObject::text("{fullAddress}").with_position(1300.0, 700.0))
        .unwrap();
    editor.set_zoom(0.5).unwrap();

    let mut store = InMemoryStore::new();
    store.save("tpl-1", editor.extract_template().unwrap()).unwrap();
    assert_eq!(editor.active_surface().unwrap().zoom(), 0.5);

    let template = store.load("tpl-1").unwrap().unwrap();
    let back = template.surface(Side::Back).unwrap();
    assert!(back.address_block_zone.is_some());
    assert_eq!(back.variable_mappings["0"].field_names, ["fullAddress"]);
    assert!(template.surface(Side::Front).unwrap().address_block_zone.is_none());

    let mut reopened = blank();
    reopened.load_template(&template).unwrap();
    assert_eq!(
        reopened.surface(Side::Back).unwrap().objects()[0].geometry.left,
        1300.0
    );
}

#[test]
fn test_reload_keeps_reusable_custom_field() {
    let mut editor = blank();
    let id = editor.add_object(GraphicObject::text("Shop at {storeName}")).unwrap();
    editor.set_reusable(&id, true).unwrap();

    let template = editor.extract_template().unwrap();
    assert!(template.surface(Side::Front).unwrap().variable_mappings["0"].is_reusable);

    let mut reopened = blank();
    reopened.load_template(&template).unwrap();
    let binding = &reopened.surface(Side::Front).unwrap().objects()[0].binding;
    assert_eq!(binding.variable_type, VariableType::Custom);
    assert!(binding.is_reusable);
    assert_eq!(binding.field_names, ["storeName"]);
}

#[test]
fn test_stored_mapping_wins_over_detection() {
    let json = r#"{
        "side": "front",
        "objects": [{"text": "Dear {firstName}"}, {"text": "Hi {city}"}],
        "variableMappings": {"0": {"variableType": "firstName"}}
    }"#;
    let record = persist::parse_surface_record(json).unwrap();
    let mut editor = blank();
    editor.load_record(&record).unwrap();

    let front = editor.surface(Side::Front).unwrap();
    assert_eq!(front.objects()[0].binding.variable_type, VariableType::FirstName);
    assert_eq!(front.objects()[1].binding, VariableBinding::custom(vec!["city".to_string()]));
}

// ============================================================================
// COLLABORATORS
// ============================================================================

struct CannedGenerator;

#[async_trait::async_trait]
impl DesignGenerator for CannedGenerator {
    async fn generate(&self, prompt: &str) -> Result<DesignFragment, MailcraftError> {
        let json = format!(
            r##"{{"clearCanvas": true, "backgroundColor": "#0f172a",
                 "objects": [{{"text": "{}"}}, {{"text": "Hi {{firstName}}"}}]}}"##,
            prompt
        );
        Ok(serde_json::from_str(&json)?)
    }
}

#[tokio::test]
async fn test_generated_fragment_merges_as_one_step() {
    let mut editor = blank();
    editor.add_object(GraphicObject::text("placeholder")).unwrap();

    let fragment = CannedGenerator.generate("Grand Opening").await.unwrap();
    let ids = editor.merge_fragment(fragment).unwrap();
    assert_eq!(ids.len(), 2);

    let surface = editor.active_surface().unwrap();
    assert_eq!(surface.background_color(), "#0f172a");
    assert_eq!(surface.history().len(), 3);

    editor.undo().unwrap();
    editor.settle_restore_after(editor.config().restore_settle()).await;
    assert_eq!(editor.active_surface().unwrap().len(), 1);
}

struct StaticLibrary {
    assets: HashMap<String, Vec<u8>>,
}

impl StaticLibrary {
    fn with_png(asset_id: &str, width: u32, height: u32) -> Self {
        let mut png = Vec::new();
        let img = image::RgbaImage::from_pixel(width, height, image::Rgba([20, 40, 60, 255]));
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();
        let mut assets = HashMap::new();
        assets.insert(asset_id.to_string(), png);
        assets.insert("truncated".to_string(), vec![0x89, b'P', b'N']);
        Self { assets }
    }
}

#[async_trait::async_trait]
impl AssetLibrary for StaticLibrary {
    async fn resolve(&self, asset_id: &str) -> Result<AssetReference, MailcraftError> {
        if !self.assets.contains_key(asset_id) {
            return Err(MailcraftError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no asset {}", asset_id),
            )));
        }
        Ok(AssetReference {
            asset_id: asset_id.to_string(),
            url: format!("https://assets.example/{}.png", asset_id),
            name: None,
        })
    }

    async fn fetch(&self, asset: &AssetReference) -> Result<Vec<u8>, MailcraftError> {
        self.assets
            .get(&asset.asset_id)
            .cloned()
            .ok_or_else(|| MailcraftError::Io(std::io::ErrorKind::NotFound.into()))
    }
}

#[tokio::test]
async fn test_asset_library_images() {
    let library = StaticLibrary::with_png("logo", 64, 32);
    let mut editor = blank();

    let id = editor.insert_asset(&library, "logo").await.unwrap().unwrap();
    let obj = editor.active_surface().unwrap().get(&id).unwrap();
    assert_eq!((obj.geometry.width, obj.geometry.height), (64.0, 32.0));
    assert!(obj.geometry.left > 0.0);
    match serde_json::to_value(obj).unwrap().get("assetId") {
        Some(v) => assert_eq!(v, "logo"),
        None => panic!("image should carry its asset id"),
    }

    assert_eq!(editor.insert_asset(&library, "missing").await.unwrap(), None);
    assert_eq!(editor.insert_asset(&library, "truncated").await.unwrap(), None);
    let notices = editor.take_notices();
    assert_eq!(notices.len(), 2);
    assert!(notices.iter().all(|n| n.level == NoticeLevel::Warning));
    assert_eq!(editor.active_surface().unwrap().len(), 1);
}

#[tokio::test]
async fn test_asset_load_discarded_after_dispose() {
    let library = StaticLibrary::with_png("logo", 8, 8);
    let mut editor = blank();
    let asset = library.resolve("logo").await.unwrap();
    let load = editor.begin_asset_load(&asset).unwrap();
    let decoded = mailcraft::editor::decode_image(library.fetch(&asset).await.unwrap()).await;
    editor.dispose();
    assert_eq!(editor.complete_image_load(load, decoded).unwrap(), None);
}
