//! Blob storage for receipt images.
//!
//! Images live under an owner-scoped path:
//! `receipts/{owner_id}/receipt_{epoch_millis}.jpg`

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::StorageError;

/// Upper bound on millisecond bumps when resolving path collisions.
const MAX_COLLISION_BUMPS: i64 = 1000;

/// A stored image and where it can be fetched from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    /// Store-internal path, used for deletion.
    pub path: String,
    /// Publicly resolvable location.
    pub url: String,
}

/// Binary object store.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Write `bytes` at `path` unless something is already there.
    ///
    /// Returns `false` when the path is taken.
    async fn put_new(&self, path: &str, bytes: &[u8]) -> Result<bool, StorageError>;

    /// Remove the blob at `path`. Missing blobs are [`StorageError::NotFound`].
    async fn delete(&self, path: &str) -> Result<(), StorageError>;

    async fn exists(&self, path: &str) -> Result<bool, StorageError>;

    /// Public URL for a stored path.
    fn public_url(&self, path: &str) -> String;
}

/// Storage path for a receipt image captured at `millis`.
pub fn receipt_image_path(owner_id: &str, millis: i64) -> String {
    format!("receipts/{}/receipt_{}.jpg", owner_id, millis)
}

fn validate_owner(owner_id: &str) -> Result<(), StorageError> {
    if owner_id.is_empty()
        || owner_id == "."
        || owner_id == ".."
        || owner_id.contains(['/', '\\'])
    {
        return Err(StorageError::InvalidPath(format!(
            "invalid owner id: {:?}",
            owner_id
        )));
    }
    Ok(())
}

/// Upload a receipt image under a fresh timestamped path for its owner.
///
/// When another upload already holds the millisecond, the suffix is bumped
/// until a free path is found.
pub async fn upload_receipt_image(
    store: &dyn BlobStore,
    owner_id: &str,
    bytes: &[u8],
    captured_at: DateTime<Utc>,
) -> Result<StoredBlob, StorageError> {
    validate_owner(owner_id)?;

    let base = captured_at.timestamp_millis();
    for bump in 0..MAX_COLLISION_BUMPS {
        let path = receipt_image_path(owner_id, base + bump);
        if store.put_new(&path, bytes).await? {
            debug!("Stored image at {}", path);
            let url = store.public_url(&path);
            return Ok(StoredBlob { path, url });
        }
    }

    Err(StorageError::InvalidPath(format!(
        "no free image path for owner {} near {}",
        owner_id, base
    )))
}

/// Filesystem blob store rooted at a directory.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
    public_base_url: String,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a store path to a file under the root, rejecting escapes.
    pub fn resolve(&self, path: &str) -> Result<PathBuf, StorageError> {
        let rel = Path::new(path);
        let safe = !path.is_empty()
            && rel
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(StorageError::InvalidPath(path.to_string()));
        }
        Ok(self.root.join(rel))
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put_new(&self, path: &str, bytes: &[u8]) -> Result<bool, StorageError> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&full)
            .await;

        let mut file = match file {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => return Ok(false),
            Err(e) => return Err(e.into()),
        };

        file.write_all(bytes).await?;
        file.flush().await?;
        Ok(true)
    }

    async fn delete(&self, path: &str) -> Result<(), StorageError> {
        let full = self.resolve(path)?;
        match tokio::fs::remove_file(&full).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(path.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, path: &str) -> Result<bool, StorageError> {
        let full = self.resolve(path)?;
        Ok(tokio::fs::try_exists(&full).await?)
    }

    fn public_url(&self, path: &str) -> String {
        format!("{}/{}", self.public_base_url.trim_end_matches('/'), path)
    }
}
