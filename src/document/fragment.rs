//! Inputs from outside collaborators: generated design fragments and asset
//! library references.
//!
//! The editor never calls these services itself. It only consumes the shapes
//! they produce, so hosts can plug in any backend behind the traits.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{GraphicObject, deserialize_objects};
use crate::MailcraftError;

/// A document fragment to merge into the active surface.
///
/// ```
/// use mailcraft::document::DesignFragment;
///
/// let fragment: DesignFragment = serde_json::from_str(r##"{
///     "clearCanvas": true,
///     "backgroundColor": "#fef3c7",
///     "objects": [{"text": "Spring Sale"}]
/// }"##).unwrap();
/// assert_eq!(fragment.objects.len(), 1);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesignFragment {
    /// Remove every existing object before merging.
    #[serde(default)]
    pub clear_canvas: Option<bool>,
    #[serde(default)]
    pub background_color: Option<String>,
    /// Supports shorthand syntax: `{"text": "hi"}` instead of `{"type": "text", "content": "hi"}`.
    #[serde(default, deserialize_with = "deserialize_objects")]
    pub objects: Vec<GraphicObject>,
}

impl DesignFragment {
    pub fn clears_canvas(&self) -> bool {
        self.clear_canvas.unwrap_or(false)
    }
}

/// A resolved image from the asset library.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetReference {
    pub asset_id: String,
    pub url: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Design generation service: free-text prompt in, fragment out.
#[async_trait]
pub trait DesignGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<DesignFragment, MailcraftError>;
}

/// Asset library lookup: asset id in, resolvable image reference out.
#[async_trait]
pub trait AssetLibrary: Send + Sync {
    async fn resolve(&self, asset_id: &str) -> Result<AssetReference, MailcraftError>;

    /// Fetch the raw image bytes behind a reference.
    async fn fetch(&self, asset: &AssetReference) -> Result<Vec<u8>, MailcraftError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fragment_defaults() {
        let fragment: DesignFragment = serde_json::from_str(r#"{"objects": []}"#).unwrap();
        assert!(!fragment.clears_canvas());
        assert!(fragment.background_color.is_none());
    }

    #[test]
    fn test_fragment_mixed_objects() {
        let fragment: DesignFragment = serde_json::from_str(
            r##"{"objects": [
                {"text": "Save {discount}% today"},
                {"type": "shape", "shape": "rect", "style": {"fill": "#ff0000"}}
            ]}"##,
        )
        .unwrap();
        assert!(fragment.objects[0].is_text());
        assert_eq!(fragment.objects[1].style.fill.as_deref(), Some("#ff0000"));
    }
}
