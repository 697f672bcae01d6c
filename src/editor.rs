//! # Template Editor
//!
//! [`TemplateEditor`] coordinates the surfaces of one template with their
//! history logs, the variable detector and the resize engine.
//!
//! ## Mutation pipeline
//!
//! Every mutating operation resolves the active surface when it is called,
//! applies the change, then runs the same three steps in order:
//!
//! | Step | What |
//! |------|------|
//! | 1 | object side effects: text scale baked into size, rotation normalized |
//! | 2 | variable detection, when text content changed |
//! | 3 | history record (a no-op while a restore is in progress) |
//!
//! Undo and redo feed the restored object list back through this pipeline as
//! a [`Change::Restore`]: detection is skipped for the restored objects, and
//! the record is suppressed while the surface's history is in
//! [`EditorMode::Restoring`](crate::history::EditorMode). User edits made
//! before the restore settles are still detected but not recorded.
//!
//! ## Failures
//!
//! Decode failures, corrupt snapshots and missing history entries never
//! escape as errors. They are logged, turned into a [`Notice`] for the host
//! to display, and the surface keeps its previous state. Errors returned from
//! operations are caller mistakes: unknown ids, a side the layout does not
//! have, or an editor that was already disposed.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;

use crate::MailcraftError;
use crate::config::EditorConfig;
use crate::document::{
    AssetLibrary, AssetReference, DesignFragment, GraphicObject, ObjectBody, ObjectId, Rect, Style, new_object_id,
};
use crate::format::PrintFormat;
use crate::history::{RecordOutcome, Restore};
use crate::persist::{self, PersistedSurfaceRecord, TemplateRecord};
use crate::resize::{self, MigrationReport, ResizeStrategy};
use crate::surface::{Side, Surface, ZOrder};
use crate::variables::{self, DetectionOutcome, DisplayMode, SweepSummary, VariablePalette, VariableType};

/// Gap kept between an auto-placed object and the address block.
const ZONE_CLEARANCE: f64 = 24.0;

/// Largest share of the canvas a freshly loaded image may cover.
const IMAGE_FIT_FRACTION: f64 = 0.5;

/// Side length for shapes that arrive without a size.
const DEFAULT_SHAPE_SIZE: f64 = 300.0;

// ============================================================================
// SUPPORTING TYPES
// ============================================================================

/// How many sides the editor manages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SurfaceLayout {
    /// Front only.
    Single,
    /// Front and back.
    #[default]
    Dual,
}

impl SurfaceLayout {
    pub fn sides(self) -> &'static [Side] {
        match self {
            SurfaceLayout::Single => &[Side::Front],
            SurfaceLayout::Dual => &[Side::Front, Side::Back],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// A user-facing message produced by an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

/// Shared flag checked by asynchronous continuations before they touch a
/// surface. Killed on dispose and whenever the surfaces are rebuilt.
#[derive(Debug, Clone)]
pub struct Liveness(Arc<AtomicBool>);

impl Liveness {
    fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn is_alive(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    fn kill(&self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Natural dimensions of a decoded bitmap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
}

/// Ticket for an image whose decode is in flight.
#[derive(Debug, Clone)]
pub struct ImageLoad {
    src: String,
    asset_id: Option<String>,
    liveness: Liveness,
}

impl ImageLoad {
    pub fn src(&self) -> &str {
        &self.src
    }

    /// False once the surfaces this load was started for are gone.
    pub fn is_alive(&self) -> bool {
        self.liveness.is_alive()
    }
}

/// Decode image bytes off the calling thread and report natural dimensions.
pub async fn decode_image(bytes: Vec<u8>) -> Result<DecodedImage, MailcraftError> {
    let decoded = tokio::task::spawn_blocking(move || {
        image::load_from_memory(&bytes).map(|img| DecodedImage {
            width: img.width(),
            height: img.height(),
        })
    })
    .await
    .map_err(|e| MailcraftError::ImageDecode(format!("decode task failed: {}", e)))??;
    Ok(decoded)
}

/// Outcome of an undo or redo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreResult {
    /// The snapshot at `index` is now on the surface.
    Applied { index: usize },
    /// Nothing further to undo or redo.
    AtLimit,
    /// The restore was abandoned; a notice explains why.
    Failed,
}

/// What kind of change reached the mutation pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Change {
    /// Geometry, style, order or binding only.
    Layout,
    /// Text content or new objects: detection runs.
    Content,
    /// A snapshot put back by undo/redo: bindings come from the snapshot.
    Restore,
}

/// A partial geometry update. `None` fields are left unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Transform {
    pub left: Option<f64>,
    pub top: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub scale_x: Option<f64>,
    pub scale_y: Option<f64>,
    pub angle: Option<f64>,
}

impl Transform {
    pub fn move_to(left: f64, top: f64) -> Self {
        Self {
            left: Some(left),
            top: Some(top),
            ..Self::default()
        }
    }

    pub fn scale(scale_x: f64, scale_y: f64) -> Self {
        Self {
            scale_x: Some(scale_x),
            scale_y: Some(scale_y),
            ..Self::default()
        }
    }

    pub fn rotate(angle: f64) -> Self {
        Self {
            angle: Some(angle),
            ..Self::default()
        }
    }

    fn apply(&self, obj: &mut GraphicObject) {
        let g = &mut obj.geometry;
        let finite = |v: Option<f64>| v.filter(|v| v.is_finite());
        if let Some(v) = finite(self.left) {
            g.left = v;
        }
        if let Some(v) = finite(self.top) {
            g.top = v;
        }
        if let Some(v) = finite(self.width) {
            g.width = v.max(resize::MIN_DIMENSION);
        }
        if let Some(v) = finite(self.height) {
            g.height = v.max(resize::MIN_DIMENSION);
        }
        if let Some(v) = finite(self.scale_x).filter(|v| *v > 0.0) {
            g.scale_x = v;
        }
        if let Some(v) = finite(self.scale_y).filter(|v| *v > 0.0) {
            g.scale_y = v;
        }
        if let Some(v) = finite(self.angle) {
            g.angle = v;
        }
    }
}

// ============================================================================
// EDITOR
// ============================================================================

/// The surface/document coordinator for one open template.
#[derive(Debug)]
pub struct TemplateEditor {
    format: PrintFormat,
    layout: SurfaceLayout,
    config: EditorConfig,
    palette: VariablePalette,
    surfaces: Vec<Surface>,
    active: Side,
    display_mode: DisplayMode,
    notices: Vec<Notice>,
    liveness: Liveness,
    disposed: bool,
}

impl TemplateEditor {
    /// Open a blank template. Each surface starts with one history entry
    /// holding its empty object list.
    pub fn new(format: PrintFormat, layout: SurfaceLayout, config: EditorConfig) -> Self {
        let config = config.sanitized();
        let palette = VariablePalette::from_config(&config);
        let surfaces = build_surfaces(layout, &format, &config);
        tracing::debug!(format = %format.id, ?layout, "editor opened");
        Self {
            format,
            layout,
            config,
            palette,
            surfaces,
            active: Side::Front,
            display_mode: DisplayMode::Edit,
            notices: Vec::new(),
            liveness: Liveness::new(),
            disposed: false,
        }
    }

    /// A blank front/back template with the default configuration.
    pub fn blank(format: PrintFormat) -> Self {
        Self::new(format, SurfaceLayout::Dual, EditorConfig::default())
    }

    pub fn format(&self) -> &PrintFormat {
        &self.format
    }

    pub fn layout(&self) -> SurfaceLayout {
        self.layout
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn display_mode(&self) -> DisplayMode {
        self.display_mode
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Handle for continuations started now. Dies with the current surfaces.
    pub fn liveness(&self) -> Liveness {
        self.liveness.clone()
    }

    /// Drain pending user-facing notices.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    // ------------------------------------------------------------------------
    // Surfaces
    // ------------------------------------------------------------------------

    pub fn active_side(&self) -> Side {
        self.active
    }

    pub fn set_active_side(&mut self, side: Side) -> Result<(), MailcraftError> {
        self.surface_index(side)?;
        self.active = side;
        Ok(())
    }

    pub fn surface(&self, side: Side) -> Result<&Surface, MailcraftError> {
        let idx = self.surface_index(side)?;
        Ok(&self.surfaces[idx])
    }

    pub fn active_surface(&self) -> Result<&Surface, MailcraftError> {
        self.surface(self.active)
    }

    fn surface_index(&self, side: Side) -> Result<usize, MailcraftError> {
        if self.disposed {
            return Err(MailcraftError::EditorDisposed);
        }
        self.surfaces
            .iter()
            .position(|s| s.side() == side)
            .ok_or_else(|| MailcraftError::SurfaceUnavailable(format!("{} side in {:?} layout", side, self.layout)))
    }

    fn active_index(&self) -> Result<usize, MailcraftError> {
        self.surface_index(self.active)
    }

    fn notify(&mut self, level: NoticeLevel, message: impl Into<String>) {
        self.notices.push(Notice {
            level,
            message: message.into(),
        });
    }

    /// Steps 1-3 of the mutation pipeline for the touched objects of one surface.
    fn after_mutation(&mut self, idx: usize, touched: &[ObjectId], change: Change) -> Vec<DetectionOutcome> {
        let mode = self.display_mode;
        let surface = &mut self.surfaces[idx];
        let side = surface.side();

        let mut outcomes = Vec::new();
        for id in touched {
            let Ok(obj) = surface.get_mut(id) else {
                continue;
            };
            obj.bake_text_scale();
            obj.geometry.normalize_angle();
            if change == Change::Content {
                outcomes.push(variables::detect(obj, mode, &self.palette));
            }
        }

        match surface.record() {
            Ok(RecordOutcome::Recorded { index }) => tracing::debug!(%side, index, "mutation recorded"),
            Ok(RecordOutcome::Suppressed) => {}
            Err(e) => {
                tracing::warn!(%side, error = %e, "failed to record history");
                self.notify(NoticeLevel::Error, format!("Could not save undo step: {}", e));
            }
        }

        for outcome in outcomes.iter().filter(|o| o.fields_changed) {
            if outcome.is_variable {
                self.notify(
                    NoticeLevel::Info,
                    format!("Variable fields: {}", outcome.field_names.join(", ")),
                );
            } else {
                self.notify(NoticeLevel::Info, "Text is no longer a variable");
            }
        }
        outcomes
    }

    // ------------------------------------------------------------------------
    // Object operations (active surface)
    // ------------------------------------------------------------------------

    /// Add an object on top of the active surface.
    ///
    /// Objects without geometry are sized and centred. A duplicate id is
    /// replaced with a fresh one. Returns the id actually used.
    pub fn add_object(&mut self, obj: GraphicObject) -> Result<ObjectId, MailcraftError> {
        let mut ids = self.insert_batch(vec![obj])?;
        ids.pop().ok_or_else(|| MailcraftError::UnknownObject(String::from("<inserted object>")))
    }

    /// Remove objects from the active surface. Unknown ids are ignored;
    /// nothing is recorded when no object matched.
    pub fn remove_objects(&mut self, ids: &[ObjectId]) -> Result<usize, MailcraftError> {
        let idx = self.active_index()?;
        let removed = self.surfaces[idx].remove(ids);
        if removed.is_empty() {
            return Ok(0);
        }
        self.after_mutation(idx, &[], Change::Layout);
        Ok(removed.len())
    }

    /// Move an object in the z-order. Returns whether it moved.
    pub fn reorder(&mut self, id: &str, order: ZOrder) -> Result<bool, MailcraftError> {
        let idx = self.active_index()?;
        let moved = self.surfaces[idx].reorder(id, order)?;
        if moved {
            self.after_mutation(idx, &[id.to_string()], Change::Layout);
        }
        Ok(moved)
    }

    /// Move, resize, scale or rotate an object.
    pub fn transform(&mut self, id: &str, transform: Transform) -> Result<(), MailcraftError> {
        let idx = self.active_index()?;
        transform.apply(self.surfaces[idx].get_mut(id)?);
        self.after_mutation(idx, &[id.to_string()], Change::Layout);
        Ok(())
    }

    /// Replace a text object's content and re-run variable detection.
    pub fn set_text(&mut self, id: &str, content: impl Into<String>) -> Result<DetectionOutcome, MailcraftError> {
        let idx = self.active_index()?;
        let text = self.surfaces[idx]
            .get_mut(id)?
            .text_data_mut()
            .ok_or_else(|| MailcraftError::WrongObjectKind {
                id: id.to_string(),
                expected: "text",
            })?;
        text.content = content.into();
        let outcomes = self.after_mutation(idx, &[id.to_string()], Change::Content);
        Ok(outcomes.into_iter().next().unwrap_or_default())
    }

    /// Replace an object's paint attributes.
    pub fn set_style(&mut self, id: &str, style: Style) -> Result<(), MailcraftError> {
        let idx = self.active_index()?;
        self.surfaces[idx].get_mut(id)?.style = style;
        self.after_mutation(idx, &[id.to_string()], Change::Layout);
        Ok(())
    }

    /// Bind an object to a catalog variable type, or unbind it with
    /// [`VariableType::None`]. Image chrome is never changed.
    pub fn set_variable_type(&mut self, id: &str, variable_type: VariableType) -> Result<(), MailcraftError> {
        let idx = self.active_index()?;
        let obj = self.surfaces[idx].get_mut(id)?;
        variables::assign(obj, variable_type, self.display_mode, &self.palette);
        self.after_mutation(idx, &[id.to_string()], Change::Layout);
        Ok(())
    }

    /// Override whether a bound object takes the same value for every recipient.
    pub fn set_reusable(&mut self, id: &str, is_reusable: bool) -> Result<(), MailcraftError> {
        let idx = self.active_index()?;
        let obj = self.surfaces[idx].get_mut(id)?;
        if obj.binding.is_none() || obj.binding.is_reusable == is_reusable {
            return Ok(());
        }
        obj.binding.is_reusable = is_reusable;
        self.after_mutation(idx, &[id.to_string()], Change::Layout);
        Ok(())
    }

    /// Background colour of the active surface. Not part of history.
    pub fn set_background(&mut self, color: impl Into<String>) -> Result<(), MailcraftError> {
        let idx = self.active_index()?;
        self.surfaces[idx].set_background_color(color);
        Ok(())
    }

    pub fn set_zoom(&mut self, zoom: f64) -> Result<(), MailcraftError> {
        let idx = self.active_index()?;
        self.surfaces[idx].set_zoom(zoom);
        Ok(())
    }

    /// Merge a generated design fragment into the active surface as one
    /// undo step.
    pub fn merge_fragment(&mut self, fragment: DesignFragment) -> Result<Vec<ObjectId>, MailcraftError> {
        let idx = self.active_index()?;
        if fragment.clears_canvas() {
            self.surfaces[idx].replace_objects(Vec::new());
        }
        if let Some(color) = fragment.background_color {
            self.surfaces[idx].set_background_color(color);
        }
        self.insert_batch(fragment.objects)
    }

    /// Paste a list of objects into the active surface as one undo step.
    pub fn paste_objects(&mut self, objects: Vec<GraphicObject>) -> Result<Vec<ObjectId>, MailcraftError> {
        self.insert_batch(objects)
    }

    fn insert_batch(&mut self, objects: Vec<GraphicObject>) -> Result<Vec<ObjectId>, MailcraftError> {
        let idx = self.active_index()?;
        let canvas = self.format.bounds();
        let surface = &mut self.surfaces[idx];
        let zone = surface.address_zone();

        let mut ids = Vec::with_capacity(objects.len());
        for mut obj in objects {
            if surface.index_of(&obj.id).is_some() {
                obj.id = new_object_id();
            }
            place_default(&mut obj, canvas, zone);
            ids.push(obj.id.clone());
            surface.push(obj);
        }
        self.after_mutation(idx, &ids, Change::Content);
        Ok(ids)
    }

    // ------------------------------------------------------------------------
    // Images
    // ------------------------------------------------------------------------

    /// Start loading an image. Hand the ticket back to
    /// [`complete_image_load`](Self::complete_image_load) once decoding finishes.
    pub fn begin_image_load(&self, src: impl Into<String>) -> Result<ImageLoad, MailcraftError> {
        self.active_index()?;
        Ok(ImageLoad {
            src: src.into(),
            asset_id: None,
            liveness: self.liveness.clone(),
        })
    }

    /// Start loading an image from the asset library.
    pub fn begin_asset_load(&self, asset: &AssetReference) -> Result<ImageLoad, MailcraftError> {
        let mut load = self.begin_image_load(asset.url.clone())?;
        load.asset_id = Some(asset.asset_id.clone());
        Ok(load)
    }

    /// Finish an image load on the surface that is active now.
    ///
    /// Returns `Ok(None)` without touching anything when the editor moved on
    /// (disposed or surfaces rebuilt) or when decoding failed. A failed
    /// decode leaves a warning notice.
    pub fn complete_image_load(
        &mut self,
        load: ImageLoad,
        decoded: Result<DecodedImage, MailcraftError>,
    ) -> Result<Option<ObjectId>, MailcraftError> {
        if !load.is_alive() || self.disposed {
            tracing::debug!(src = %load.src, "discarding image load for torn-down surfaces");
            return Ok(None);
        }
        let decoded = match decoded {
            Ok(d) if d.width > 0 && d.height > 0 => d,
            Ok(_) => {
                tracing::warn!(src = %load.src, "image decoded with zero size");
                self.notify(NoticeLevel::Warning, format!("Image {} is empty", load.src));
                return Ok(None);
            }
            Err(e) => {
                tracing::warn!(src = %load.src, error = %e, "image decode failed");
                self.notify(NoticeLevel::Warning, format!("Could not load image {}: {}", load.src, e));
                return Ok(None);
            }
        };

        let mut obj = GraphicObject::image(load.src, decoded.width, decoded.height);
        if let ObjectBody::Image(data) = &mut obj.body {
            data.asset_id = load.asset_id;
        }
        let fit = fit_scale(self.format.bounds(), decoded);
        obj.geometry.scale_x = fit;
        obj.geometry.scale_y = fit;
        self.add_object(obj).map(Some)
    }

    /// Decode `bytes` and add the image to the active surface.
    pub async fn insert_image(&mut self, src: impl Into<String>, bytes: Vec<u8>) -> Result<Option<ObjectId>, MailcraftError> {
        let load = self.begin_image_load(src)?;
        let decoded = decode_image(bytes).await;
        self.complete_image_load(load, decoded)
    }

    /// Resolve an asset, fetch its bytes and add it as an image.
    ///
    /// Lookup and fetch failures end like decode failures: a warning notice
    /// and `Ok(None)`.
    pub async fn insert_asset(
        &mut self,
        library: &dyn AssetLibrary,
        asset_id: &str,
    ) -> Result<Option<ObjectId>, MailcraftError> {
        self.active_index()?;
        let asset = match library.resolve(asset_id).await {
            Ok(asset) => asset,
            Err(e) => {
                tracing::warn!(asset_id, error = %e, "asset lookup failed");
                self.notify(NoticeLevel::Warning, format!("Could not find asset {}: {}", asset_id, e));
                return Ok(None);
            }
        };
        let load = self.begin_asset_load(&asset)?;
        let decoded = match library.fetch(&asset).await {
            Ok(bytes) => decode_image(bytes).await,
            Err(e) => Err(e),
        };
        self.complete_image_load(load, decoded)
    }

    // ------------------------------------------------------------------------
    // History
    // ------------------------------------------------------------------------

    /// Step the active surface back one snapshot.
    ///
    /// The surface stays in restore mode until [`settle_restore`](Self::settle_restore).
    pub fn undo(&mut self) -> Result<RestoreResult, MailcraftError> {
        let idx = self.active_index()?;
        let step = self.surfaces[idx].history_mut().undo();
        Ok(self.apply_restore(idx, step, "undo"))
    }

    /// Step the active surface forward one snapshot.
    pub fn redo(&mut self) -> Result<RestoreResult, MailcraftError> {
        let idx = self.active_index()?;
        let step = self.surfaces[idx].history_mut().redo();
        Ok(self.apply_restore(idx, step, "redo"))
    }

    fn apply_restore(
        &mut self,
        idx: usize,
        step: Result<Option<Restore>, MailcraftError>,
        action: &str,
    ) -> RestoreResult {
        let restore = match step {
            Ok(Some(restore)) => restore,
            Ok(None) => return RestoreResult::AtLimit,
            Err(e) => {
                tracing::warn!(action, error = %e, "history bookkeeping error");
                self.notify(NoticeLevel::Error, format!("Cannot {}: {}", action, e));
                return RestoreResult::Failed;
            }
        };

        let mut objects = match restore.snapshot.decode() {
            Ok(objects) => objects,
            Err(e) => {
                tracing::warn!(action, step = restore.snapshot.step, error = %e, "restore aborted");
                self.surfaces[idx].history_mut().abort_restore(&restore);
                self.notify(NoticeLevel::Error, format!("Cannot {}: {}", action, e));
                return RestoreResult::Failed;
            }
        };

        for obj in &mut objects {
            variables::apply_mode_chrome(obj, self.display_mode, &self.palette);
        }
        let ids: Vec<ObjectId> = objects.iter().map(|o| o.id.clone()).collect();
        self.surfaces[idx].replace_objects(objects);
        self.after_mutation(idx, &ids, Change::Restore);

        let index = self.surfaces[idx].history().current_index().unwrap_or_default();
        tracing::debug!(action, index, "snapshot applied");
        RestoreResult::Applied { index }
    }

    /// Leave restore mode on every surface. Call once the restored objects
    /// have been laid out.
    pub fn settle_restore(&mut self) {
        for surface in &mut self.surfaces {
            surface.history_mut().finish_restore();
        }
    }

    /// [`settle_restore`](Self::settle_restore) after `delay`.
    pub async fn settle_restore_after(&mut self, delay: Duration) {
        tokio::time::sleep(delay).await;
        self.settle_restore();
    }

    // ------------------------------------------------------------------------
    // Display mode and format
    // ------------------------------------------------------------------------

    /// Switch between edit and preview decorations on every surface.
    /// Bindings are kept either way; nothing is recorded.
    pub fn set_display_mode(&mut self, mode: DisplayMode) -> SweepSummary {
        self.display_mode = mode;
        let mut total = SweepSummary::default();
        for surface in &mut self.surfaces {
            let objects = surface.objects_mut();
            let summary = variables::sweep(objects, mode, &self.palette);
            for obj in objects.iter_mut().filter(|o| !o.is_text()) {
                variables::apply_mode_chrome(obj, mode, &self.palette);
            }
            total.scanned += summary.scanned;
            total.variables += summary.variables;
            total.styled += summary.styled;
        }
        tracing::debug!(?mode, ?total, "display mode changed");
        total
    }

    /// Move every surface to a new print format.
    ///
    /// The surfaces are rebuilt with migrated objects and fresh history, and
    /// pending image loads for the old surfaces are discarded. A degenerate
    /// target is rejected: nothing changes and the report carries the warning.
    pub fn change_format(&mut self, to: PrintFormat, strategy: ResizeStrategy) -> Result<MigrationReport, MailcraftError> {
        if self.disposed {
            return Err(MailcraftError::EditorDisposed);
        }

        let mut report: Option<MigrationReport> = None;
        let mut rebuilt = Vec::with_capacity(self.surfaces.len());
        for old in &self.surfaces {
            let migration = resize::migrate(old.objects(), &self.format, &to, strategy, &self.config);
            let mut surface = Surface::new(old.side(), self.config.history_capacity);
            surface.replace_objects(migration.objects);
            surface.set_background_color(old.background_color());
            surface.set_zoom(old.zoom());
            surface.set_address_zone(zone_for(old.side(), &to));
            rebuilt.push(surface);
            match report.as_mut() {
                Some(r) => r.merge(migration.report),
                None => report = Some(migration.report),
            }
        }
        let report = report.unwrap_or_else(|| resize::migrate(&[], &self.format, &to, strategy, &self.config).report);

        if to.is_degenerate() {
            for w in &report.warnings {
                self.notify(NoticeLevel::Warning, w.clone());
            }
            return Ok(report);
        }

        for surface in &mut rebuilt {
            if let Err(e) = surface.reset_history() {
                tracing::warn!(side = %surface.side(), error = %e, "failed to seed history");
            }
        }

        self.liveness.kill();
        self.liveness = Liveness::new();
        self.surfaces = rebuilt;
        tracing::info!(from = %self.format.id, to = %to.id, strategy = %report.strategy_used, modified = report.objects_modified, "format changed");
        self.format = to;

        for w in &report.warnings {
            self.notify(NoticeLevel::Warning, w.clone());
        }
        Ok(report)
    }

    // ------------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------------

    /// Populate a surface from a persisted record.
    ///
    /// Stored mappings are applied first, then a detection sweep covers text
    /// saved before variables were tracked. History restarts at the loaded
    /// state.
    pub fn load_record(&mut self, record: &PersistedSurfaceRecord) -> Result<SweepSummary, MailcraftError> {
        let idx = self.surface_index(record.side)?;
        let mut objects = record.objects_with_bindings();
        let summary = variables::sweep(&mut objects, self.display_mode, &self.palette);
        for obj in objects.iter_mut() {
            obj.mark_placed();
            if !obj.is_text() {
                variables::apply_mode_chrome(obj, self.display_mode, &self.palette);
            }
        }

        let surface = &mut self.surfaces[idx];
        surface.replace_objects(objects);
        surface.set_background_color(record.background_color.clone());
        surface.reset_history()?;
        tracing::debug!(side = %record.side, objects = surface.len(), variables = summary.variables, "record loaded");
        Ok(summary)
    }

    /// Load every surface of a template. Switches format first when the
    /// record was laid out for a different one. Sides the layout lacks are
    /// skipped with a warning.
    pub fn load_template(&mut self, record: &TemplateRecord) -> Result<(), MailcraftError> {
        if self.disposed {
            return Err(MailcraftError::EditorDisposed);
        }
        let format = record.format()?;
        if format != self.format {
            self.liveness.kill();
            self.liveness = Liveness::new();
            self.surfaces = build_surfaces(self.layout, &format, &self.config);
            self.format = format;
        }
        for surface in &record.surfaces {
            match self.load_record(surface) {
                Ok(_) => {}
                Err(MailcraftError::SurfaceUnavailable(msg)) => {
                    tracing::warn!(side = %surface.side, "skipping surface missing from layout");
                    self.notify(NoticeLevel::Warning, format!("Ignored {}", msg));
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Persisted form of one side.
    pub fn extract(&mut self, side: Side) -> Result<PersistedSurfaceRecord, MailcraftError> {
        let idx = self.surface_index(side)?;
        Ok(persist::extract(&mut self.surfaces[idx], &self.format, &self.config))
    }

    /// Persisted form of the whole template.
    pub fn extract_template(&mut self) -> Result<TemplateRecord, MailcraftError> {
        if self.disposed {
            return Err(MailcraftError::EditorDisposed);
        }
        let surfaces = self
            .surfaces
            .iter_mut()
            .map(|s| persist::extract(s, &self.format, &self.config))
            .collect();
        Ok(TemplateRecord {
            format_id: self.format.id.clone(),
            surfaces,
            saved_at: Some(Utc::now()),
        })
    }

    /// Tear down the editor. Pending loads are discarded and every later
    /// operation returns [`MailcraftError::EditorDisposed`].
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.liveness.kill();
        self.surfaces.clear();
        self.disposed = true;
        tracing::debug!("editor disposed");
    }
}

impl Drop for TemplateEditor {
    fn drop(&mut self) {
        self.liveness.kill();
    }
}

// ============================================================================
// HELPERS
// ============================================================================

fn zone_for(side: Side, format: &PrintFormat) -> Option<Rect> {
    match side {
        Side::Back => format.address_block_zone(),
        Side::Front => None,
    }
}

fn build_surfaces(layout: SurfaceLayout, format: &PrintFormat, config: &EditorConfig) -> Vec<Surface> {
    layout
        .sides()
        .iter()
        .map(|&side| {
            let mut surface = Surface::new(side, config.history_capacity);
            surface.set_address_zone(zone_for(side, format));
            if let Err(e) = surface.reset_history() {
                tracing::warn!(%side, error = %e, "failed to seed history");
            }
            surface
        })
        .collect()
}

/// Uniform scale that keeps a new image within a share of the canvas.
fn fit_scale(canvas: Rect, image: DecodedImage) -> f64 {
    let max_w = canvas.width * IMAGE_FIT_FRACTION;
    let max_h = canvas.height * IMAGE_FIT_FRACTION;
    let scale = (max_w / f64::from(image.width)).min(max_h / f64::from(image.height));
    if scale.is_finite() && scale > 0.0 { scale.min(1.0) } else { 1.0 }
}

/// Size objects that arrive without dimensions. Objects without a position
/// are centred, then moved out of the address block if they landed in it.
fn place_default(obj: &mut GraphicObject, canvas: Rect, zone: Option<Rect>) {
    if obj.geometry.width == 0.0 || obj.geometry.height == 0.0 {
        match &obj.body {
            ObjectBody::Text(text) => {
                let (w, h) = text.estimated_size();
                obj.geometry.width = w;
                obj.geometry.height = h;
            }
            ObjectBody::Shape(_) => {
                obj.geometry.width = DEFAULT_SHAPE_SIZE;
                obj.geometry.height = DEFAULT_SHAPE_SIZE;
            }
            // Unknown until decoded.
            ObjectBody::Image(_) => {}
        }
    }
    if !obj.needs_placement() {
        return;
    }
    obj.mark_placed();
    obj.geometry.left = (canvas.width - obj.geometry.scaled_width()) / 2.0;
    obj.geometry.top = (canvas.height - obj.geometry.scaled_height()) / 2.0;

    let Some(zone) = zone else {
        return;
    };
    if !zone.contains_rect(&obj.bounds()) {
        return;
    }
    let h = obj.geometry.scaled_height();
    let above = zone.y - h - ZONE_CLEARANCE;
    if above >= 0.0 {
        obj.geometry.top = above;
    } else {
        obj.geometry.left = (zone.x - obj.geometry.scaled_width() - ZONE_CLEARANCE).max(0.0);
    }
    tracing::debug!(id = %obj.id, "moved object out of address block");
}

// ============================================================================
// TESTS
// ============================================================================
