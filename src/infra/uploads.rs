//! Filesystem storage for post images.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use sha2::{Digest, Sha256};
use slug::slugify;
use thiserror::Error;
use tokio::{fs, io::AsyncWriteExt};
use tracing::debug;

use crate::application::media::{ImageUpload, MediaError, MediaStore, StoredImage};
use crate::domain::posts::MAX_IMAGE_NAME_LEN;

pub const POSTS_DIRECTORY: &str = "posts";
const DIGEST_PREFIX_LEN: usize = 16;

#[derive(Debug, Error)]
pub enum UploadStorageError {
    #[error("invalid stored path")]
    InvalidPath,
    #[error("uploaded file is empty")]
    EmptyPayload,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct UploadStorage {
    root: PathBuf,
}

impl UploadStorage {
    /// Storage rooted at `root`, creating the directory if necessary.
    pub fn new(root: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(root.join(POSTS_DIRECTORY))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write `data` under `posts/` and return the path relative to the root.
    ///
    /// Files are named by a content digest, so re-uploading identical bytes
    /// reuses the existing file.
    pub async fn store(
        &self,
        original_name: &str,
        extension: &str,
        data: &Bytes,
    ) -> Result<StoredImage, UploadStorageError> {
        if data.is_empty() {
            return Err(UploadStorageError::EmptyPayload);
        }

        let digest = hex::encode(Sha256::digest(data));
        let stem = sanitize_stem(original_name);
        let stored_path = format!(
            "{POSTS_DIRECTORY}/{}-{stem}.{extension}",
            &digest[..DIGEST_PREFIX_LEN]
        );
        let absolute = self.resolve(&stored_path)?;
        if fs::try_exists(&absolute).await? {
            return Ok(StoredImage {
                path: stored_path,
                created: false,
            });
        }

        if let Some(parent) = absolute.parent() {
            fs::create_dir_all(parent).await?;
        }
        let mut file = fs::File::create(&absolute).await?;
        file.write_all(data).await?;
        file.flush().await?;

        debug!(target = "yatube::uploads", path = %stored_path, bytes = data.len(), "image stored");
        Ok(StoredImage {
            path: stored_path,
            created: true,
        })
    }

    pub async fn remove(&self, stored_path: &str) -> Result<(), UploadStorageError> {
        let absolute = self.resolve(stored_path)?;
        match fs::remove_file(absolute).await {
            Ok(()) => {
                debug!(target = "yatube::uploads", path = %stored_path, "image removed");
                Ok(())
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn read(&self, stored_path: &str) -> Result<Bytes, UploadStorageError> {
        let absolute = self.resolve(stored_path)?;
        Ok(Bytes::from(fs::read(absolute).await?))
    }

    /// Join `stored_path` onto the root, refusing absolute or parent components.
    fn resolve(&self, stored_path: &str) -> Result<PathBuf, UploadStorageError> {
        let relative = Path::new(stored_path);
        if stored_path.is_empty()
            || relative.is_absolute()
            || relative.components().any(|component| {
                matches!(
                    component,
                    Component::ParentDir | Component::Prefix(_) | Component::RootDir
                )
            })
        {
            return Err(UploadStorageError::InvalidPath);
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl MediaStore for UploadStorage {
    async fn store_image(&self, upload: ImageUpload) -> Result<StoredImage, MediaError> {
        self.store(&upload.original_name, upload.kind.extension(), &upload.data)
            .await
            .map_err(|err| MediaError::Storage(err.to_string()))
    }

    async fn discard_image(&self, path: &str) -> Result<(), MediaError> {
        self.remove(path)
            .await
            .map_err(|err| MediaError::Storage(err.to_string()))
    }
}

fn sanitize_stem(original: &str) -> String {
    let stem = Path::new(original)
        .file_stem()
        .and_then(|value| value.to_str())
        .unwrap_or_default();
    let mut base = slugify(stem);
    if base.is_empty() {
        base = "image".to_string();
    }
    if base.len() > MAX_IMAGE_NAME_LEN {
        base.truncate(MAX_IMAGE_NAME_LEN);
    }
    base
}
