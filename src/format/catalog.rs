//! # Print Format Catalog
//!
//! Physical mail formats and their canonical pixel dimensions.
//!
//! ## Built-in Formats
//!
//! | Id | Size | Pixels @ 300 DPI | USPS |
//! |----|------|------------------|------|
//! | `postcard_4x6` | 6" × 4" | 1800 × 1200 | yes |
//! | `postcard_5x7` | 7" × 5" | 2100 × 1500 | yes |
//! | `postcard_6x9` | 9" × 6" | 2700 × 1800 | yes |
//! | `postcard_6x11` | 11" × 6" | 3300 × 1800 | yes |
//! | `letter_8_5x11` | 8.5" × 11" | 2550 × 3300 | yes |
//! | `flyer_5_5x8_5` | 5.5" × 8.5" | 1650 × 2550 | no |
//! | `door_hanger_4_25x11` | 4.25" × 11" | 1275 × 3300 | no |
//!
//! ## Usage
//!
//! ```
//! use mailcraft::format::PrintFormat;
//!
//! let format = PrintFormat::lookup("postcard_4x6").unwrap();
//! assert_eq!((format.width_pixels, format.height_pixels), (1800, 1200));
//! ```

use serde::{Deserialize, Serialize};

use crate::MailcraftError;
use crate::document::Rect;

/// Print resolution used by every built-in format.
pub const DEFAULT_DPI: u32 = 300;

/// Broad product family of a format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatCategory {
    Postcard,
    Letter,
    Flyer,
    DoorHanger,
    Custom,
}

/// # Print Format
///
/// Immutable description of a physical print product.
///
/// ## Calculations
///
/// ```text
/// width_pixels  = width_inches  * dpi
/// height_pixels = height_inches * dpi
///
/// For postcard_4x6:
///   6.0in * 300 = 1800px
///   4.0in * 300 = 1200px
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrintFormat {
    pub id: String,
    pub name: String,
    pub category: FormatCategory,
    pub width_pixels: u32,
    pub height_pixels: u32,
    pub width_inches: f64,
    pub height_inches: f64,
    pub dpi: u32,
    pub usps_compliant: bool,
}

/// Address block reservation in inches: (width, height, right margin, bottom margin).
type ZoneInches = (f64, f64, f64, f64);

impl PrintFormat {
    fn built(
        id: &str,
        name: &str,
        category: FormatCategory,
        width_inches: f64,
        height_inches: f64,
        usps_compliant: bool,
    ) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            category,
            width_pixels: inches_to_pixels(width_inches, DEFAULT_DPI),
            height_pixels: inches_to_pixels(height_inches, DEFAULT_DPI),
            width_inches,
            height_inches,
            dpi: DEFAULT_DPI,
            usps_compliant,
        }
    }

    /// A custom format from pixel dimensions.
    pub fn custom(width_pixels: u32, height_pixels: u32, dpi: u32) -> Result<Self, MailcraftError> {
        if width_pixels == 0 || height_pixels == 0 || dpi == 0 {
            return Err(MailcraftError::InvalidFormat(format!(
                "{}x{}@{} has a zero dimension",
                width_pixels, height_pixels, dpi
            )));
        }
        Ok(Self {
            id: format!("custom:{}x{}@{}", width_pixels, height_pixels, dpi),
            name: format!("Custom {}x{}", width_pixels, height_pixels),
            category: FormatCategory::Custom,
            width_pixels,
            height_pixels,
            width_inches: f64::from(width_pixels) / f64::from(dpi),
            height_inches: f64::from(height_pixels) / f64::from(dpi),
            dpi,
            usps_compliant: false,
        })
    }

    /// List all built-in formats.
    pub fn built_in() -> Vec<Self> {
        use FormatCategory::*;
        vec![
            Self::built("postcard_4x6", "Postcard 4\" x 6\"", Postcard, 6.0, 4.0, true),
            Self::built("postcard_5x7", "Postcard 5\" x 7\"", Postcard, 7.0, 5.0, true),
            Self::built("postcard_6x9", "Postcard 6\" x 9\"", Postcard, 9.0, 6.0, true),
            Self::built("postcard_6x11", "Postcard 6\" x 11\"", Postcard, 11.0, 6.0, true),
            Self::built("letter_8_5x11", "Letter 8.5\" x 11\"", Letter, 8.5, 11.0, true),
            Self::built("flyer_5_5x8_5", "Flyer 5.5\" x 8.5\"", Flyer, 5.5, 8.5, false),
            Self::built("door_hanger_4_25x11", "Door Hanger 4.25\" x 11\"", DoorHanger, 4.25, 11.0, false),
        ]
    }

    /// Look up a built-in format by id.
    pub fn lookup(id: &str) -> Option<Self> {
        Self::built_in().into_iter().find(|f| f.id == id)
    }

    /// The format every new editor starts with.
    pub fn default_format() -> Self {
        Self::built("postcard_4x6", "Postcard 4\" x 6\"", FormatCategory::Postcard, 6.0, 4.0, true)
    }

    /// Parse a format string.
    ///
    /// Formats:
    /// - a built-in id (e.g. `"postcard_6x9"`)
    /// - `"custom:WIDTHxHEIGHT"` → custom format at 300 DPI
    /// - `"custom:WIDTHxHEIGHT@DPI"` → custom format at the given DPI
    pub fn parse(s: &str) -> Result<Self, MailcraftError> {
        if let Some(format) = Self::lookup(s) {
            return Ok(format);
        }

        let lower = s.to_lowercase();
        let Some(spec) = lower.strip_prefix("custom:") else {
            return Err(MailcraftError::UnknownFormat(s.to_string()));
        };

        let (dims, dpi) = match spec.split_once('@') {
            Some((dims, dpi)) => {
                let dpi: u32 = dpi
                    .parse()
                    .map_err(|_| MailcraftError::InvalidFormat(format!("Invalid DPI: {}", dpi)))?;
                (dims, dpi)
            }
            None => (spec, DEFAULT_DPI),
        };
        let (w, h) = dims
            .split_once('x')
            .ok_or_else(|| MailcraftError::InvalidFormat(format!("Expected WIDTHxHEIGHT, got {}", dims)))?;
        let width: u32 = w
            .parse()
            .map_err(|_| MailcraftError::InvalidFormat(format!("Invalid width: {}", w)))?;
        let height: u32 = h
            .parse()
            .map_err(|_| MailcraftError::InvalidFormat(format!("Invalid height: {}", h)))?;
        Self::custom(width, height, dpi)
    }

    /// Width divided by height.
    #[inline]
    pub fn aspect_ratio(&self) -> f64 {
        if self.height_pixels == 0 {
            return 0.0;
        }
        f64::from(self.width_pixels) / f64::from(self.height_pixels)
    }

    /// Whether either pixel dimension is zero.
    #[inline]
    pub fn is_degenerate(&self) -> bool {
        self.width_pixels == 0 || self.height_pixels == 0
    }

    /// Convert inches to pixels at this format's DPI.
    #[inline]
    pub fn inches_to_pixels(&self, inches: f64) -> f64 {
        inches * f64::from(self.dpi)
    }

    /// The full canvas rectangle.
    pub fn bounds(&self) -> Rect {
        Rect::new(0.0, 0.0, f64::from(self.width_pixels), f64::from(self.height_pixels))
    }

    /// Address block reservation for the back side, in canvas pixels.
    ///
    /// Only USPS-compliant mail formats reserve a zone. The zone sits in the
    /// bottom-right corner above the barcode clear strip.
    pub fn address_block_zone(&self) -> Option<Rect> {
        let (w, h, right, bottom) = self.zone_inches()?;
        let width = self.inches_to_pixels(w);
        let height = self.inches_to_pixels(h);
        let x = f64::from(self.width_pixels) - self.inches_to_pixels(right) - width;
        let y = f64::from(self.height_pixels) - self.inches_to_pixels(bottom) - height;
        Some(Rect::new(x.max(0.0), y.max(0.0), width, height))
    }

    fn zone_inches(&self) -> Option<ZoneInches> {
        if !self.usps_compliant {
            return None;
        }
        match self.category {
            FormatCategory::Postcard if self.width_inches <= 6.0 => Some((3.5, 2.0, 0.25, 0.625)),
            FormatCategory::Postcard => Some((4.0, 2.375, 0.25, 0.625)),
            FormatCategory::Letter => Some((4.0, 1.5, 0.5, 0.625)),
            _ => None,
        }
    }
}

impl Default for PrintFormat {
    fn default() -> Self {
        Self::default_format()
    }
}

fn inches_to_pixels(inches: f64, dpi: u32) -> u32 {
    (inches * f64::from(dpi)).round() as u32
}

// ============================================================================
// TESTS
// ============================================================================
