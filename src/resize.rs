//! # Format Resize Engine
//!
//! Relocates every object when the print format changes.
//!
//! ## Strategies
//!
//! | Strategy | Behaviour |
//! |----------|-----------|
//! | `scale`  | Positions scale per axis. Text, images and QR codes scale uniformly by `sqrt(sx * sy)` so they keep their aspect; other shapes stretch per axis. |
//! | `crop`   | Geometry unchanged; the new canvas edge truncates or adds margin. |
//! | `reflow` | Not implemented. Falls back to `scale` and says so in the report. |
//!
//! The uniform factor is the geometric mean of the axis ratios, so scaling
//! A → B and then B → A restores the original geometry.
//!
//! Only geometry and font size are rewritten. Ids, bindings and styles pass
//! through untouched.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::EditorConfig;
use crate::document::{GraphicObject, ObjectBody};
use crate::format::PrintFormat;

/// Smallest width, height or font size a migration may produce.
pub const MIN_DIMENSION: f64 = 1.0;

/// Policy for relocating objects on a format change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResizeStrategy {
    #[default]
    Scale,
    Crop,
    Reflow,
}

impl fmt::Display for ResizeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ResizeStrategy::Scale => "scale",
            ResizeStrategy::Crop => "crop",
            ResizeStrategy::Reflow => "reflow",
        })
    }
}

impl FromStr for ResizeStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "scale" => Ok(Self::Scale),
            "crop" => Ok(Self::Crop),
            "reflow" => Ok(Self::Reflow),
            other => Err(format!("Unknown resize strategy '{}'. Use scale, crop or reflow", other)),
        }
    }
}

/// Suggested strategy for a format pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub strategy: ResizeStrategy,
    /// Aspect ratios differ by more than the configured threshold.
    pub major_change: bool,
    pub aspect_delta: f64,
}

/// What a migration did.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationReport {
    pub objects_modified: usize,
    pub strategy_requested: ResizeStrategy,
    pub strategy_used: ResizeStrategy,
    pub major_change: bool,
    pub aspect_delta: f64,
    pub warnings: Vec<String>,
}

impl MigrationReport {
    /// Fold another surface's report into this one.
    pub fn merge(&mut self, other: MigrationReport) {
        self.objects_modified += other.objects_modified;
        self.major_change |= other.major_change;
        for w in other.warnings {
            if !self.warnings.contains(&w) {
                self.warnings.push(w);
            }
        }
    }
}

/// Migrated objects plus the report.
#[derive(Debug, Clone)]
pub struct Migration {
    pub objects: Vec<GraphicObject>,
    pub report: MigrationReport,
}

/// Recommend a strategy: `crop` for near-identical sizes, otherwise `scale`.
/// Flags a major change when aspect ratios differ by more than the threshold.
pub fn recommend(from: &PrintFormat, to: &PrintFormat, config: &EditorConfig) -> Recommendation {
    let aspect_delta = (from.aspect_ratio() - to.aspect_ratio()).abs();
    let near = |a: u32, b: u32| {
        let a = f64::from(a);
        let b = f64::from(b);
        a > 0.0 && ((a - b).abs() / a) <= config.near_identical_tolerance
    };
    let strategy = if near(from.width_pixels, to.width_pixels) && near(from.height_pixels, to.height_pixels) {
        ResizeStrategy::Crop
    } else {
        ResizeStrategy::Scale
    };
    Recommendation {
        strategy,
        major_change: aspect_delta > config.major_aspect_delta,
        aspect_delta,
    }
}

/// Migrate `objects` from one format to another.
///
/// Degenerate formats (a zero dimension) are rejected: the objects come back
/// unchanged and the report carries a warning.
pub fn migrate(
    objects: &[GraphicObject],
    from: &PrintFormat,
    to: &PrintFormat,
    strategy: ResizeStrategy,
    config: &EditorConfig,
) -> Migration {
    let rec = recommend(from, to, config);
    let mut report = MigrationReport {
        objects_modified: 0,
        strategy_requested: strategy,
        strategy_used: strategy,
        major_change: rec.major_change,
        aspect_delta: rec.aspect_delta,
        warnings: Vec::new(),
    };

    if from.is_degenerate() || to.is_degenerate() {
        let bad = if to.is_degenerate() { to } else { from };
        tracing::warn!(format = %bad.id, "rejecting migration with degenerate format");
        report.strategy_used = ResizeStrategy::Crop;
        report.major_change = false;
        report.warnings.push(format!(
            "Format {} has zero size ({}x{}); objects were left unchanged",
            bad.id, bad.width_pixels, bad.height_pixels
        ));
        return Migration {
            objects: objects.to_vec(),
            report,
        };
    }

    if rec.major_change {
        report.warnings.push(format!(
            "Aspect ratio changes from {:.2} to {:.2}; manual adjustment may be required",
            from.aspect_ratio(),
            to.aspect_ratio()
        ));
    }

    if strategy == ResizeStrategy::Reflow {
        report.strategy_used = ResizeStrategy::Scale;
        report
            .warnings
            .push("Reflow is not implemented yet; objects were scaled instead".to_string());
    }

    let mut migrated = objects.to_vec();
    if report.strategy_used == ResizeStrategy::Scale {
        let sx = f64::from(to.width_pixels) / f64::from(from.width_pixels);
        let sy = f64::from(to.height_pixels) / f64::from(from.height_pixels);
        for obj in &mut migrated {
            let before = (obj.geometry, font_size(obj));
            if scale_object(obj, sx, sy) {
                report
                    .warnings
                    .push(format!("{} {} was clamped to a minimum size", obj.label(), obj.id));
            }
            if before != (obj.geometry, font_size(obj)) {
                report.objects_modified += 1;
            }
        }
    }

    let canvas = to.bounds();
    for obj in &migrated {
        if !canvas.contains_rect(&obj.bounds()) {
            report.warnings.push(format!(
                "{} {} extends outside the {}x{} canvas",
                obj.label(),
                obj.id,
                to.width_pixels,
                to.height_pixels
            ));
        }
    }

    tracing::debug!(
        from = %from.id,
        to = %to.id,
        strategy = %report.strategy_used,
        modified = report.objects_modified,
        warnings = report.warnings.len(),
        "format migration"
    );

    Migration {
        objects: migrated,
        report,
    }
}

fn font_size(obj: &GraphicObject) -> Option<f64> {
    match &obj.body {
        ObjectBody::Text(t) => Some(t.font_size),
        _ => None,
    }
}

/// Scale one object in place. Returns true if any dimension was clamped.
fn scale_object(obj: &mut GraphicObject, sx: f64, sy: f64) -> bool {
    let uniform = (sx * sy).sqrt();
    let mut clamped = false;
    let mut clamp = |v: f64| {
        if v < MIN_DIMENSION {
            clamped = true;
            MIN_DIMENSION
        } else {
            v
        }
    };

    let g = &mut obj.geometry;
    g.left *= sx;
    g.top *= sy;

    match &mut obj.body {
        ObjectBody::Text(text) => {
            g.width = clamp(g.width * sx);
            g.height = clamp(g.height * uniform);
            text.font_size = clamp(text.font_size * uniform);
        }
        ObjectBody::Image(_) => {
            g.scale_x *= uniform;
            g.scale_y *= uniform;
        }
        ObjectBody::Shape(shape) if shape.is_square_locked() => {
            g.width = clamp(g.width * uniform);
            g.height = clamp(g.height * uniform);
        }
        ObjectBody::Shape(_) => {
            g.width = clamp(g.width * sx);
            g.height = clamp(g.height * sy);
        }
    }
    clamped
}

// ============================================================================
// TESTS
// ============================================================================
