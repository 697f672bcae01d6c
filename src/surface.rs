//! # Surfaces
//!
//! One printable side of a template: an ordered object list (first = bottom
//! of the z-order), a background colour, the display zoom, an optional
//! address-block reservation and its own history log.
//!
//! A surface only stores. Orchestration (side effects, variable detection,
//! history recording) lives in [`crate::editor::TemplateEditor`].

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::MailcraftError;
use crate::document::{GraphicObject, ObjectId, Rect};
use crate::history::HistoryManager;

/// Which side of the mailer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    #[default]
    Front,
    Back,
}

impl Side {
    pub fn as_str(self) -> &'static str {
        match self {
            Side::Front => "front",
            Side::Back => "back",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "front" => Ok(Side::Front),
            "back" => Ok(Side::Back),
            other => Err(format!("Unknown side '{}'. Use front or back", other)),
        }
    }
}

/// Z-order moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZOrder {
    BringForward,
    SendBackward,
    BringToFront,
    SendToBack,
}

/// Default background colour of a fresh surface.
pub const DEFAULT_BACKGROUND: &str = "#ffffff";

/// One printable side.
#[derive(Debug, Clone)]
pub struct Surface {
    side: Side,
    objects: Vec<GraphicObject>,
    background_color: String,
    address_zone: Option<Rect>,
    zoom: f64,
    history: HistoryManager,
}

impl Surface {
    pub fn new(side: Side, history_capacity: usize) -> Self {
        Self {
            side,
            objects: Vec::new(),
            background_color: DEFAULT_BACKGROUND.to_string(),
            address_zone: None,
            zoom: 1.0,
            history: HistoryManager::new(history_capacity),
        }
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn objects(&self) -> &[GraphicObject] {
        &self.objects
    }

    pub(crate) fn objects_mut(&mut self) -> &mut Vec<GraphicObject> {
        &mut self.objects
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.objects.iter().position(|o| o.id == id)
    }

    pub fn get(&self, id: &str) -> Option<&GraphicObject> {
        self.objects.iter().find(|o| o.id == id)
    }

    pub(crate) fn get_mut(&mut self, id: &str) -> Result<&mut GraphicObject, MailcraftError> {
        self.objects
            .iter_mut()
            .find(|o| o.id == id)
            .ok_or_else(|| MailcraftError::UnknownObject(id.to_string()))
    }

    /// Append an object on top. Returns its index.
    pub(crate) fn push(&mut self, obj: GraphicObject) -> usize {
        self.objects.push(obj);
        self.objects.len() - 1
    }

    /// Remove every object whose id is listed. Returns the removed objects in
    /// their former z-order.
    pub(crate) fn remove(&mut self, ids: &[ObjectId]) -> Vec<GraphicObject> {
        let (removed, kept): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.objects).into_iter().partition(|o| ids.contains(&o.id));
        self.objects = kept;
        removed
    }

    /// Move an object in the z-order. Returns whether its index changed.
    pub(crate) fn reorder(&mut self, id: &str, order: ZOrder) -> Result<bool, MailcraftError> {
        let from = self
            .index_of(id)
            .ok_or_else(|| MailcraftError::UnknownObject(id.to_string()))?;
        let last = self.objects.len() - 1;
        let to = match order {
            ZOrder::BringForward => (from + 1).min(last),
            ZOrder::SendBackward => from.saturating_sub(1),
            ZOrder::BringToFront => last,
            ZOrder::SendToBack => 0,
        };
        if to == from {
            return Ok(false);
        }
        let obj = self.objects.remove(from);
        self.objects.insert(to, obj);
        Ok(true)
    }

    pub(crate) fn replace_objects(&mut self, objects: Vec<GraphicObject>) {
        self.objects = objects;
    }

    pub fn background_color(&self) -> &str {
        &self.background_color
    }

    pub(crate) fn set_background_color(&mut self, color: impl Into<String>) {
        self.background_color = color.into();
    }

    /// Reserved address-block rectangle (back side of USPS formats only).
    pub fn address_zone(&self) -> Option<Rect> {
        self.address_zone
    }

    pub(crate) fn set_address_zone(&mut self, zone: Option<Rect>) {
        self.address_zone = zone;
    }

    /// Editor display zoom. Geometry is always stored in format pixels; zoom
    /// only affects [`Surface::to_display`].
    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub(crate) fn set_zoom(&mut self, zoom: f64) {
        self.zoom = if zoom.is_finite() && zoom > 0.0 { zoom } else { 1.0 };
    }

    /// Map a canvas rectangle to on-screen display units.
    pub fn to_display(&self, rect: Rect) -> Rect {
        Rect::new(rect.x * self.zoom, rect.y * self.zoom, rect.width * self.zoom, rect.height * self.zoom)
    }

    /// Reset the zoom to 1:1 until the returned guard drops.
    pub fn canonical_view(&mut self) -> CanonicalView<'_> {
        let saved_zoom = self.zoom;
        self.zoom = 1.0;
        CanonicalView {
            surface: self,
            saved_zoom,
        }
    }

    pub fn history(&self) -> &HistoryManager {
        &self.history
    }

    pub(crate) fn history_mut(&mut self) -> &mut HistoryManager {
        &mut self.history
    }

    /// Drop all history and start again from the current object list.
    pub(crate) fn reset_history(&mut self) -> Result<(), MailcraftError> {
        self.history.reset(&self.objects)
    }

    /// Record the current object list in this surface's history.
    pub(crate) fn record(&mut self) -> Result<crate::history::RecordOutcome, MailcraftError> {
        self.history.record(&self.objects)
    }
}

/// A surface temporarily shown at 1:1. Restores the previous zoom on drop.
pub struct CanonicalView<'a> {
    surface: &'a mut Surface,
    saved_zoom: f64,
}

impl Deref for CanonicalView<'_> {
    type Target = Surface;

    fn deref(&self) -> &Surface {
        self.surface
    }
}

impl DerefMut for CanonicalView<'_> {
    fn deref_mut(&mut self) -> &mut Surface {
        self.surface
    }
}

impl Drop for CanonicalView<'_> {
    fn drop(&mut self) {
        self.surface.zoom = self.saved_zoom;
    }
}
