//! Error taxonomy for the receipt ingestion pipeline.
//!
//! Every failure that can surface from an ingestion attempt is one of the
//! variants of [`ReceiptError`]. Raw transport or service errors are turned
//! into a variant at the boundary where they are first observed and are never
//! passed further up as untyped values.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Machine-readable error kinds used on the callable extraction wire protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RemoteErrorKind {
    Unauthenticated,
    ResourceExhausted,
    InvalidArgument,
    Internal,
    FailedPrecondition,
}

impl RemoteErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::ResourceExhausted => "resource-exhausted",
            Self::InvalidArgument => "invalid-argument",
            Self::Internal => "internal",
            Self::FailedPrecondition => "failed-precondition",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "unauthenticated" => Some(Self::Unauthenticated),
            "resource-exhausted" => Some(Self::ResourceExhausted),
            "invalid-argument" => Some(Self::InvalidArgument),
            "internal" => Some(Self::Internal),
            "failed-precondition" => Some(Self::FailedPrecondition),
            _ => None,
        }
    }

    /// HTTP status used by the callable endpoint for this kind.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Unauthenticated => 401,
            Self::ResourceExhausted => 429,
            Self::InvalidArgument => 400,
            Self::Internal => 500,
            Self::FailedPrecondition => 412,
        }
    }
}

impl std::fmt::Display for RemoteErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Errors from the blob store.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Blob not found: {0}")]
    NotFound(String),

    #[error("Invalid blob path: {0}")]
    InvalidPath(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can end an ingestion attempt or a store operation.
#[derive(Debug, Error)]
pub enum ReceiptError {
    /// Local decode or encode failure of the captured image.
    #[error("Image processing failed: {0}")]
    ImageProcessing(String),

    /// No valid caller identity.
    #[error("Authentication required: {0}")]
    Authentication(String),

    /// Remote inference capacity exhausted.
    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),

    /// Transport unreachable.
    #[error("Network error: {0}")]
    Network(String),

    /// The model returned text that is not a receipt JSON document.
    #[error("Parsing failed: {message}")]
    Parsing { message: String, raw_text: String },

    /// Any other classified failure reported by the extraction service.
    #[error("Extraction service error ({kind}): {message}")]
    Service {
        kind: RemoteErrorKind,
        message: String,
    },

    /// Referenced receipt does not exist.
    #[error("Receipt not found: {0}")]
    NotFound(String),

    /// Blob upload or delete failure.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Creating a receipt failed, either while uploading or writing the document.
    #[error("Failed to save receipt: {0}")]
    SaveFailed(String),

    /// Document store failure outside the create path.
    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),
}

impl ReceiptError {
    /// Build an error from a classified remote error kind.
    pub fn from_remote(kind: RemoteErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        match kind {
            RemoteErrorKind::Unauthenticated => Self::Authentication(message),
            RemoteErrorKind::ResourceExhausted => Self::QuotaExceeded(message),
            RemoteErrorKind::Internal if message.contains("invalid JSON") => Self::Parsing {
                message,
                raw_text: String::new(),
            },
            other => Self::Service {
                kind: other,
                message,
            },
        }
    }

    /// The remote kind this error is reported as by the callable endpoint.
    pub fn remote_kind(&self) -> RemoteErrorKind {
        match self {
            Self::Authentication(_) => RemoteErrorKind::Unauthenticated,
            Self::QuotaExceeded(_) => RemoteErrorKind::ResourceExhausted,
            Self::ImageProcessing(_) => RemoteErrorKind::InvalidArgument,
            Self::Service { kind, .. } => *kind,
            _ => RemoteErrorKind::Internal,
        }
    }

    /// Message suitable for showing to the person who captured the receipt.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::ImageProcessing(_) => "Failed to process image. Please try again.",
            Self::Authentication(_) => "You must be logged in to parse receipts",
            Self::QuotaExceeded(_) => "Receipt parsing quota exceeded. Please contact support.",
            Self::Network(_) => "Network error. Please check your internet connection.",
            Self::Parsing { .. } | Self::Service { .. } => {
                "Failed to parse receipt. Please try again."
            }
            Self::NotFound(_) => "Receipt not found.",
            Self::Storage(_) | Self::SaveFailed(_) => "Failed to save receipt. Please try again.",
            Self::Database(_) => "Something went wrong. Please try again.",
        }
    }

    /// True when the user may sensibly retry the same action by hand.
    pub fn is_user_retryable(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::Storage(_) | Self::SaveFailed(_) | Self::Database(_)
        )
    }
}
