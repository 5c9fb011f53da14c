//! Image decoding and file storage for product images and avatars.

pub mod base64_image;

pub use base64_image::{decode_base64_image, DecodeError, DecodedImage};

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::errors::ServiceError;

/// Folder product images are stored under.
pub const PRODUCT_IMAGES_DIR: &str = "product_images";
/// Folder avatars are stored under.
pub const AVATARS_DIR: &str = "avatars";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid storage path: {0}")]
    InvalidPath(String),

    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        ServiceError::StorageError(err.to_string())
    }
}

/// Where decoded images end up. Paths are relative, `/`-separated, e.g.
/// `product_images/<uuid>.png`.
#[async_trait]
pub trait ImageStorage: Send + Sync {
    /// Writes `bytes` at `path`, returning the stored path.
    async fn save(&self, path: &str, bytes: Bytes) -> Result<String, StorageError>;

    /// Removes `path`. Missing files are not an error.
    async fn delete(&self, path: &str) -> Result<(), StorageError>;
}

/// Storage path for a decoded image inside `dir`.
pub fn image_path(dir: &str, image: &DecodedImage) -> String {
    format!("{}/{}", dir, image.name)
}

/// Public URL of a stored path under the configured media prefix.
pub fn media_url(prefix: &str, path: &str) -> String {
    format!("{}/{}", prefix.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Best-effort removal used to undo writes of a failed unit of work.
pub async fn remove_all(storage: &dyn ImageStorage, paths: &[String]) {
    for path in paths {
        if let Err(err) = storage.delete(path).await {
            warn!(path = %path, error = %err, "failed to remove stored image");
        }
    }
}

fn checked_relative(path: &str) -> Result<&Path, StorageError> {
    let candidate = Path::new(path);
    let safe = !path.is_empty()
        && candidate
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
    if safe {
        Ok(candidate)
    } else {
        Err(StorageError::InvalidPath(path.to_string()))
    }
}

/// Files under a media root directory.
#[derive(Debug, Clone)]
pub struct LocalImageStorage {
    root: PathBuf,
}

impl LocalImageStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, StorageError> {
        Ok(self.root.join(checked_relative(path)?))
    }
}

#[async_trait]
impl ImageStorage for LocalImageStorage {
    async fn save(&self, path: &str, bytes: Bytes) -> Result<String, StorageError> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&full, &bytes).await?;
        debug!(path = %path, size = bytes.len(), "image stored");
        Ok(path.to_string())
    }

    async fn delete(&self, path: &str) -> Result<(), StorageError> {
        let full = self.resolve(path)?;
        match tokio::fs::remove_file(&full).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

/// Keeps images in memory; used by tests.
#[derive(Debug, Default)]
pub struct InMemoryImageStorage {
    files: RwLock<HashMap<String, Bytes>>,
}

impl InMemoryImageStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, path: &str) -> Option<Bytes> {
        self.files.read().await.get(path).cloned()
    }

    pub async fn len(&self) -> usize {
        self.files.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.files.read().await.is_empty()
    }

    pub async fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.files.read().await.keys().cloned().collect();
        paths.sort();
        paths
    }
}

#[async_trait]
impl ImageStorage for InMemoryImageStorage {
    async fn save(&self, path: &str, bytes: Bytes) -> Result<String, StorageError> {
        checked_relative(path)?;
        self.files.write().await.insert(path.to_string(), bytes);
        Ok(path.to_string())
    }

    async fn delete(&self, path: &str) -> Result<(), StorageError> {
        self.files.write().await.remove(path);
        Ok(())
    }
}
