//! # Editor Configuration
//!
//! Tunables for the template editor. Every field has a default, so a config
//! file only needs to name the values it overrides:
//!
//! ```
//! use mailcraft::config::EditorConfig;
//!
//! let config: EditorConfig = serde_json::from_str(r#"{"history_capacity": 20}"#).unwrap();
//! assert_eq!(config.history_capacity, 20);
//! assert_eq!(config.major_aspect_delta, 0.3);
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::MailcraftError;

/// Default number of snapshots kept per surface.
pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

/// Thumbnail width bounds in pixels.
pub const MIN_THUMBNAIL_WIDTH: u32 = 16;
pub const MAX_THUMBNAIL_WIDTH: u32 = 2048;

/// Editor configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Maximum snapshots in each surface's history log.
    pub history_capacity: usize,
    /// Aspect ratio difference above which a format change is "major".
    pub major_aspect_delta: f64,
    /// Relative size difference under which two formats count as near-identical.
    pub near_identical_tolerance: f64,
    /// Thumbnail width in pixels. Height follows the format's aspect ratio.
    pub thumbnail_width: u32,
    /// Delay between applying a history snapshot and clearing the restore guard.
    pub restore_settle_ms: u64,
    /// Border and corner colour for variable text objects.
    pub variable_border_color: String,
    /// Chip background colour for variable text objects.
    pub variable_chip_color: String,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            major_aspect_delta: 0.3,
            near_identical_tolerance: 0.05,
            thumbnail_width: 240,
            restore_settle_ms: 100,
            variable_border_color: "#7c3aed".into(),
            variable_chip_color: "#ede9fe".into(),
        }
    }
}

impl EditorConfig {
    /// Load a config from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self, MailcraftError> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        Ok(config.sanitized())
    }

    /// Settle delay as a [`Duration`].
    pub fn restore_settle(&self) -> Duration {
        Duration::from_millis(self.restore_settle_ms)
    }

    /// Clamp values that would break the engine (a zero-length history log).
    pub fn sanitized(mut self) -> Self {
        self.history_capacity = self.history_capacity.max(1);
        if !self.major_aspect_delta.is_finite() || self.major_aspect_delta < 0.0 {
            self.major_aspect_delta = Self::default().major_aspect_delta;
        }
        self.thumbnail_width = self.thumbnail_width.clamp(MIN_THUMBNAIL_WIDTH, MAX_THUMBNAIL_WIDTH);
        self
    }

    /// Override the thumbnail width, clamped like a loaded config.
    pub fn with_thumbnail_width(mut self, width: u32) -> Self {
        self.thumbnail_width = width;
        self.sanitized()
    }
}
