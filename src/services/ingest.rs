//! Receipt ingestion: captured image to stored receipt.
//!
//! Steps run strictly in order, each awaited before the next:
//! normalize image, extract, normalize fields, upload image, write document.
//! Upload comes after extraction, so a failed extraction leaves nothing
//! behind. Nothing is retried; each call is one independent attempt.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::normalize::normalize_candidate;
use super::store::ReceiptStore;
use crate::auth::Identity;
use crate::error::ReceiptError;
use crate::extraction::ReceiptExtractor;
use crate::imaging::{normalize_async, NormalizedImage, RawImage};
use crate::models::{ExtractionCandidate, Receipt, ValidationIssue};

/// Progress events emitted during one ingestion.
#[derive(Debug, Clone)]
pub enum IngestEvent {
    /// Image decode and re-encode started
    Normalizing { source: String },
    /// Extraction request sent
    Extracting { source: String, bytes: usize },
    /// Candidate came back with data-quality issues
    Issues {
        source: String,
        issues: Vec<ValidationIssue>,
    },
    /// Uploading image and writing the document
    Saving { source: String },
    /// Receipt stored
    Saved { source: String, receipt_id: String },
    /// Ingestion ended with an error
    Failed { source: String, error: String },
}

/// Result of extraction without persistence.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub image: NormalizedImage,
    pub candidate: ExtractionCandidate,
    pub issues: Vec<ValidationIssue>,
}

/// Runs ingestions against one extractor and one store.
#[derive(Clone)]
pub struct IngestService {
    extractor: Arc<dyn ReceiptExtractor>,
    store: ReceiptStore,
}

impl IngestService {
    pub fn new(extractor: Arc<dyn ReceiptExtractor>, store: ReceiptStore) -> Self {
        Self { extractor, store }
    }

    pub fn store(&self) -> &ReceiptStore {
        &self.store
    }

    /// Ingest one image for `owner`.
    pub async fn ingest(&self, owner: &Identity, raw: RawImage) -> Result<Receipt, ReceiptError> {
        self.ingest_with_events(owner, raw, None).await
    }

    /// Ingest one image, reporting progress on `event_tx`.
    pub async fn ingest_with_events(
        &self,
        owner: &Identity,
        raw: RawImage,
        event_tx: Option<&mpsc::Sender<IngestEvent>>,
    ) -> Result<Receipt, ReceiptError> {
        let source = raw.source.clone();
        let result = self.run(owner, raw, event_tx).await;

        match &result {
            Ok(receipt) => {
                emit(
                    event_tx,
                    IngestEvent::Saved {
                        source,
                        receipt_id: receipt.id.clone(),
                    },
                )
                .await
            }
            Err(e) => {
                warn!(owner = %owner.user_id, "Ingestion of {} failed: {}", source, e);
                emit(
                    event_tx,
                    IngestEvent::Failed {
                        source,
                        error: e.user_message().to_string(),
                    },
                )
                .await
            }
        }

        result
    }

    async fn run(
        &self,
        owner: &Identity,
        raw: RawImage,
        event_tx: Option<&mpsc::Sender<IngestEvent>>,
    ) -> Result<Receipt, ReceiptError> {
        let source = raw.source.clone();
        let captured_at = Utc::now();

        let checked = self.check_with_events(raw, event_tx).await?;

        let draft = normalize_candidate(&checked.candidate, captured_at);
        debug!(
            "Normalized {}: seller={:?}, total={}, items={}",
            source,
            draft.seller_name,
            draft.total_amount,
            draft.items.len()
        );

        emit(
            event_tx,
            IngestEvent::Saving {
                source: source.clone(),
            },
        )
        .await;
        let receipt = self.store.create(owner, &draft, &checked.image.bytes).await?;

        info!(
            receipt_id = %receipt.id,
            owner = %owner.user_id,
            "Ingested {} ({} {:.2})",
            source,
            receipt.currency,
            receipt.total_amount
        );
        Ok(receipt)
    }

    /// Normalize and extract without storing anything.
    pub async fn check(&self, raw: RawImage) -> Result<CheckResult, ReceiptError> {
        self.check_with_events(raw, None).await
    }

    async fn check_with_events(
        &self,
        raw: RawImage,
        event_tx: Option<&mpsc::Sender<IngestEvent>>,
    ) -> Result<CheckResult, ReceiptError> {
        check_image(self.extractor.as_ref(), raw, event_tx).await
    }
}

/// Normalize and extract one image with `extractor`, validating the
/// candidate. Needs no store; [`IngestService::check`] runs the same steps.
pub async fn check_image(
    extractor: &dyn ReceiptExtractor,
    raw: RawImage,
    event_tx: Option<&mpsc::Sender<IngestEvent>>,
) -> Result<CheckResult, ReceiptError> {
    let source = raw.source.clone();

    emit(
        event_tx,
        IngestEvent::Normalizing {
            source: source.clone(),
        },
    )
    .await;
    let image = normalize_async(raw).await?;
    debug!(
        "Normalized image {} to {}x{} ({} bytes)",
        source,
        image.width,
        image.height,
        image.bytes.len()
    );

    emit(
        event_tx,
        IngestEvent::Extracting {
            source: source.clone(),
            bytes: image.bytes.len(),
        },
    )
    .await;
    let candidate = extractor.extract(&image).await?;

    let issues = candidate.validate();
    if !issues.is_empty() {
        for issue in &issues {
            warn!("{}: {}", source, issue);
        }
        emit(
            event_tx,
            IngestEvent::Issues {
                source,
                issues: issues.clone(),
            },
        )
        .await;
    }

    Ok(CheckResult {
        image,
        candidate,
        issues,
    })
}

async fn emit(event_tx: Option<&mpsc::Sender<IngestEvent>>, event: IngestEvent) {
    if let Some(tx) = event_tx {
        let _ = tx.send(event).await;
    }
}
