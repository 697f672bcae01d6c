//! # Mailcraft - Print Template Composition Engine
//!
//! Mailcraft is the in-memory core of a two-sided mailer designer. It
//! provides:
//!
//! - **Document model**: text, shape, image and QR placeholder objects per side
//! - **Variables**: `{fieldName}` detection that turns text into mail-merge fields
//! - **History**: per-side undo/redo with a bounded window
//! - **Resize**: migration of every object when the print format changes
//! - **Persistence**: surface records with variable maps and thumbnails
//!
//! ## Quick Start
//!
//! ```
//! use mailcraft::{
//!     document::GraphicObject,
//!     editor::{RestoreResult, TemplateEditor},
//!     format::PrintFormat,
//!     variables::VariableType,
//! };
//!
//! let mut editor = TemplateEditor::blank(PrintFormat::default());
//!
//! let id = editor.add_object(
//!     GraphicObject::text("Save {discount}% today").with_position(100.0, 100.0),
//! )?;
//!
//! let obj = editor.active_surface()?.get(&id).unwrap();
//! assert_eq!(obj.binding.variable_type, VariableType::Custom);
//! assert_eq!(obj.binding.field_names, ["discount"]);
//!
//! assert_eq!(editor.undo()?, RestoreResult::Applied { index: 0 });
//! editor.settle_restore();
//! assert!(editor.active_surface()?.is_empty());
//!
//! # Ok::<(), mailcraft::MailcraftError>(())
//! ```
//!
//! ## Module Overview
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`format`] | Print format catalog and address-block zones |
//! | [`document`] | Graphic objects, geometry, style, design fragments |
//! | [`variables`] | Variable type catalog and token detection |
//! | [`history`] | Undo/redo log |
//! | [`resize`] | Format migration strategies |
//! | [`surface`] | One printable side |
//! | [`editor`] | Coordinator for the sides of a template |
//! | [`persist`] | Persisted records, thumbnails, storage contract |
//! | [`config`] | Editor tunables |
//! | [`error`] | Error types |

pub mod config;
pub mod document;
pub mod editor;
pub mod error;
pub mod format;
pub mod history;
pub mod persist;
pub mod resize;
pub mod surface;
pub mod variables;

// Re-exports for convenience
pub use config::EditorConfig;
pub use editor::TemplateEditor;
pub use error::MailcraftError;
pub use format::PrintFormat;
