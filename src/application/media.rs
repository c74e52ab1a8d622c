//! Storage seam for user-uploaded images.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use crate::domain::posts::ImageKind;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("failed to store media: {0}")]
    Storage(String),
}

/// An image submitted with a post form, already sniffed.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub original_name: String,
    pub kind: ImageKind,
    pub data: Bytes,
}

/// Where an upload landed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredImage {
    /// Path relative to the media root.
    pub path: String,
    /// False when identical bytes were already on disk under the same name.
    pub created: bool,
}

#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Persist the image under a name derived from its content.
    async fn store_image(&self, upload: ImageUpload) -> Result<StoredImage, MediaError>;

    /// Remove a file written by `store_image` that no post ended up referencing.
    async fn discard_image(&self, path: &str) -> Result<(), MediaError>;
}
