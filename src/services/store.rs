//! Receipt store: document repository plus blob store.
//!
//! Create is two steps, image upload then document write, without a
//! transaction spanning them. A failed upload stops before the document
//! write. A failed document write after a successful upload leaves an
//! unreferenced blob behind, which is logged and otherwise tolerated.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::auth::Identity;
use crate::error::{ReceiptError, StorageError};
use crate::models::{Receipt, ReceiptDraft, ReceiptUpdate};
use crate::repository::DieselReceiptRepository;
use crate::storage::{upload_receipt_image, BlobStore};

/// Owner-keyed persistence of receipts and their images.
#[derive(Clone)]
pub struct ReceiptStore {
    repo: DieselReceiptRepository,
    blobs: Arc<dyn BlobStore>,
}

impl ReceiptStore {
    pub fn new(repo: DieselReceiptRepository, blobs: Arc<dyn BlobStore>) -> Self {
        Self { repo, blobs }
    }

    pub fn repository(&self) -> &DieselReceiptRepository {
        &self.repo
    }

    pub fn blobs(&self) -> &Arc<dyn BlobStore> {
        &self.blobs
    }

    /// Upload the image, then write the receipt document.
    ///
    /// Any failure is reported as [`ReceiptError::SaveFailed`]; the log tells
    /// which step failed.
    pub async fn create(
        &self,
        owner: &Identity,
        draft: &ReceiptDraft,
        image_bytes: &[u8],
    ) -> Result<Receipt, ReceiptError> {
        let blob = upload_receipt_image(self.blobs.as_ref(), &owner.user_id, image_bytes, Utc::now())
            .await
            .map_err(|e| {
                error!(owner = %owner.user_id, "Image upload failed: {}", e);
                ReceiptError::SaveFailed(format!("image upload failed: {}", e))
            })?;

        match self.repo.insert(owner, draft, &blob).await {
            Ok(receipt) => {
                info!(receipt_id = %receipt.id, owner = %owner.user_id, "Saved receipt");
                Ok(receipt)
            }
            Err(e) => {
                warn!(
                    owner = %owner.user_id,
                    "Document write failed, image {} is orphaned: {}",
                    blob.path,
                    e
                );
                Err(ReceiptError::SaveFailed(format!(
                    "document write failed: {}",
                    e
                )))
            }
        }
    }

    /// Fetch one receipt. Absence is `Ok(None)`.
    pub async fn get(&self, id: &str) -> Result<Option<Receipt>, ReceiptError> {
        Ok(self.repo.get(id).await?)
    }

    /// All receipts of an owner, unordered. Sort on the caller side.
    pub async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<Receipt>, ReceiptError> {
        Ok(self.repo.list_by_owner(owner_id).await?)
    }

    pub async fn list_by_owner_and_category(
        &self,
        owner_id: &str,
        category: &str,
    ) -> Result<Vec<Receipt>, ReceiptError> {
        Ok(self
            .repo
            .list_by_owner_and_category(owner_id, category)
            .await?)
    }

    /// Seller-name prefix search (case-sensitive).
    pub async fn search_by_owner_and_name_prefix(
        &self,
        owner_id: &str,
        prefix: &str,
    ) -> Result<Vec<Receipt>, ReceiptError> {
        Ok(self
            .repo
            .search_by_owner_and_name_prefix(owner_id, prefix)
            .await?)
    }

    /// Apply an explicit update. Unknown ids are [`ReceiptError::NotFound`].
    pub async fn update(&self, id: &str, update: &ReceiptUpdate) -> Result<Receipt, ReceiptError> {
        let updated = self
            .repo
            .update(id, update)
            .await?
            .ok_or_else(|| ReceiptError::NotFound(id.to_string()))?;
        debug!(receipt_id = %id, "Updated receipt");
        Ok(updated)
    }

    /// Delete the image, then the document.
    ///
    /// A failed image delete (for instance, already gone) is logged and the
    /// document is still removed.
    pub async fn delete(&self, id: &str) -> Result<(), ReceiptError> {
        let receipt = self
            .repo
            .get(id)
            .await?
            .ok_or_else(|| ReceiptError::NotFound(id.to_string()))?;

        match self.blobs.delete(&receipt.image_path).await {
            Ok(()) => debug!("Deleted image {}", receipt.image_path),
            Err(StorageError::NotFound(path)) => {
                warn!(receipt_id = %id, "Image {} already missing", path)
            }
            Err(e) => warn!(
                receipt_id = %id,
                "Failed to delete image {}: {}",
                receipt.image_path,
                e
            ),
        }

        if !self.repo.delete(id).await? {
            return Err(ReceiptError::NotFound(id.to_string()));
        }
        info!(receipt_id = %id, "Deleted receipt");
        Ok(())
    }
}
