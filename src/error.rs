//! # Error Types
//!
//! This module defines error types used throughout the mailcraft library.
//!
//! Every variant is recoverable: the editor catches these at the operation
//! boundary, logs them and turns them into user-facing notices.

use thiserror::Error;

/// Main error type for mailcraft operations
#[derive(Debug, Error)]
pub enum MailcraftError {
    /// An image could not be decoded or loaded
    #[error("Image error: {0}")]
    ImageDecode(String),

    /// JSON encoding or decoding failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A history snapshot could not be decoded during undo/redo
    #[error("Corrupt history snapshot at step {step}: {reason}")]
    CorruptSnapshot { step: u64, reason: String },

    /// The history cursor points outside the snapshot log
    #[error("Missing history entry at index {index} (log holds {len})")]
    MissingHistoryEntry { index: usize, len: usize },

    /// No object with this id exists on the surface
    #[error("Unknown object: {0}")]
    UnknownObject(String),

    /// The object exists but the operation needs a different kind
    #[error("Object {id} is not a {expected} object")]
    WrongObjectKind { id: String, expected: &'static str },

    /// No print format with this id exists in the catalog
    #[error("Unknown print format: {0}")]
    UnknownFormat(String),

    /// A print format has unusable dimensions
    #[error("Invalid print format: {0}")]
    InvalidFormat(String),

    /// The requested side does not exist in this editor layout
    #[error("Surface unavailable: {0}")]
    SurfaceUnavailable(String),

    /// The editor was torn down before the operation completed
    #[error("Editor has been disposed")]
    EditorDisposed,

    /// Thumbnail rasterization or encoding failed
    #[error("Thumbnail error: {0}")]
    Thumbnail(String),

    /// I/O error wrapper
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<image::ImageError> for MailcraftError {
    fn from(err: image::ImageError) -> Self {
        Self::ImageDecode(err.to_string())
    }
}
