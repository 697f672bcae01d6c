//! # Format Module
//!
//! Print format lookups consumed by the editor and the resize engine.
//!
//! ## Modules
//!
//! - [`catalog`]: Built-in physical formats and custom format parsing

pub mod catalog;

pub use catalog::{FormatCategory, PrintFormat};
