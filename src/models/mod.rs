//! Data models for receiptscan.

mod candidate;
mod receipt;

pub use candidate::{ExtractionCandidate, LineItemCandidate, ValidationIssue};
pub use receipt::{
    LineItem, PaymentMethod, Receipt, ReceiptDraft, ReceiptStatus, ReceiptUpdate, DEFAULT_CURRENCY,
};
