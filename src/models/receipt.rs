//! Persisted receipt model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Currency assumed when the model does not report one.
pub const DEFAULT_CURRENCY: &str = "NOK";

/// How a receipt was paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Card,
    Cash,
    Mobile,
    Invoice,
    #[default]
    Other,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Card => "card",
            Self::Cash => "cash",
            Self::Mobile => "mobile",
            Self::Invoice => "invoice",
            Self::Other => "other",
        }
    }

    /// Case-insensitive match against the closed set of methods.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "card" => Some(Self::Card),
            "cash" => Some(Self::Cash),
            "mobile" => Some(Self::Mobile),
            "invoice" => Some(Self::Invoice),
            "other" => Some(Self::Other),
            _ => None,
        }
    }

    /// Like [`from_str`](Self::from_str) but falls back to `Other`.
    pub fn from_str_lenient(s: Option<&str>) -> Self {
        s.and_then(Self::from_str).unwrap_or_default()
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Review state of a stored receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReceiptStatus {
    #[default]
    Pending,
    Processed,
    Verified,
    Rejected,
}

impl ReceiptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processed => "processed",
            Self::Verified => "verified",
            Self::Rejected => "rejected",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "processed" => Some(Self::Processed),
            "verified" => Some(Self::Verified),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

impl std::fmt::Display for ReceiptStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single purchased line on a receipt.
///
/// `id` is a presentation key (`{captureMillis}-{index}`) and is not stable
/// across extraction attempts. Use [`LineItem::content_key`] when content
/// identity matters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub id: String,
    pub name: String,
    pub quantity: f64,
    pub unit_price: f64,
    pub total_price: f64,
}

impl LineItem {
    /// SHA-256 over the item's content, independent of its presentation id.
    pub fn content_key(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.name.as_bytes());
        hasher.update([0]);
        hasher.update(self.quantity.to_bits().to_le_bytes());
        hasher.update(self.unit_price.to_bits().to_le_bytes());
        hasher.update(self.total_price.to_bits().to_le_bytes());
        hex::encode(hasher.finalize())
    }
}

/// Normalized receipt fields ready to be stored.
///
/// Carries no identity, ownership, image reference or audit timestamps; the
/// store assigns those on create.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptDraft {
    pub seller_name: String,
    pub seller_org_number: Option<String>,
    pub seller_address: Option<String>,
    pub total_amount: f64,
    pub subtotal: Option<f64>,
    pub vat_amount: Option<f64>,
    pub currency: String,
    #[serde(rename = "hasVAT")]
    pub has_vat: bool,
    pub receipt_date: DateTime<Utc>,
    pub receipt_number: Option<String>,
    pub category: Option<String>,
    pub payment_method: PaymentMethod,
    pub items: Vec<LineItem>,
    pub ocr_raw_text: String,
    pub ocr_confidence: f64,
}

/// A stored receipt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub id: String,
    pub user_id: String,
    pub user_email: String,
    pub image_url: String,
    pub image_path: String,
    pub seller_name: String,
    pub seller_org_number: Option<String>,
    pub seller_address: Option<String>,
    pub total_amount: f64,
    pub subtotal: Option<f64>,
    pub vat_amount: Option<f64>,
    pub currency: String,
    #[serde(rename = "hasVAT")]
    pub has_vat: bool,
    pub receipt_date: DateTime<Utc>,
    pub receipt_number: Option<String>,
    pub category: Option<String>,
    pub payment_method: PaymentMethod,
    pub items: Vec<LineItem>,
    pub ocr_raw_text: String,
    pub ocr_confidence: f64,
    pub status: ReceiptStatus,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Receipt {
    /// Sort receipts newest first by creation time.
    pub fn sort_newest_first(receipts: &mut [Receipt]) {
        receipts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    }
}

/// Explicit patch applied by [`crate::services::ReceiptStore::update`].
///
/// Financial amounts are intentionally absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReceiptUpdate {
    pub status: Option<ReceiptStatus>,
    pub is_verified: Option<bool>,
    pub category: Option<String>,
    pub seller_name: Option<String>,
    pub payment_method: Option<PaymentMethod>,
}

impl ReceiptUpdate {
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.is_verified.is_none()
            && self.category.is_none()
            && self.seller_name.is_none()
            && self.payment_method.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_method_case_folding() {
        assert_eq!(PaymentMethod::from_str("CARD"), Some(PaymentMethod::Card));
        assert_eq!(PaymentMethod::from_str(" Cash "), Some(PaymentMethod::Cash));
        assert_eq!(PaymentMethod::from_str("bitcoin"), None);
    }

    #[test]
    fn test_payment_method_lenient_defaults_to_other() {
        assert_eq!(
            PaymentMethod::from_str_lenient(Some("bitcoin")),
            PaymentMethod::Other
        );
        assert_eq!(PaymentMethod::from_str_lenient(None), PaymentMethod::Other);
        assert_eq!(
            PaymentMethod::from_str_lenient(Some("Mobile")),
            PaymentMethod::Mobile
        );
    }

    #[test]
    fn test_status_roundtrip() {
        for status in [
            ReceiptStatus::Pending,
            ReceiptStatus::Processed,
            ReceiptStatus::Verified,
            ReceiptStatus::Rejected,
        ] {
            assert_eq!(ReceiptStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(ReceiptStatus::from_str("archived"), None);
        assert_eq!(ReceiptStatus::default(), ReceiptStatus::Pending);
    }

    #[test]
    fn test_content_key_ignores_presentation_id() {
        let a = LineItem {
            id: "1700000000000-0".to_string(),
            name: "Melk".to_string(),
            quantity: 2.0,
            unit_price: 21.9,
            total_price: 43.8,
        };
        let mut b = a.clone();
        b.id = "1700000009999-3".to_string();
        assert_eq!(a.content_key(), b.content_key());

        b.quantity = 3.0;
        assert_ne!(a.content_key(), b.content_key());
    }

    #[test]
    fn test_update_is_empty() {
        assert!(ReceiptUpdate::default().is_empty());
        let update = ReceiptUpdate {
            is_verified: Some(true),
            ..Default::default()
        };
        assert!(!update.is_empty());
    }

    #[test]
    fn test_receipt_serializes_has_vat_key() {
        let now = Utc::now();
        let receipt = Receipt {
            id: "r1".to_string(),
            user_id: "u1".to_string(),
            user_email: "u1@example.com".to_string(),
            image_url: "file:///tmp/x.jpg".to_string(),
            image_path: "receipts/u1/receipt_1.jpg".to_string(),
            seller_name: "Rema 1000".to_string(),
            seller_org_number: None,
            seller_address: None,
            total_amount: 100.0,
            subtotal: None,
            vat_amount: Some(20.0),
            currency: DEFAULT_CURRENCY.to_string(),
            has_vat: true,
            receipt_date: now,
            receipt_number: None,
            category: None,
            payment_method: PaymentMethod::Card,
            items: vec![],
            ocr_raw_text: String::new(),
            ocr_confidence: 0.9,
            status: ReceiptStatus::Pending,
            is_verified: false,
            created_at: now,
            updated_at: now,
        };
        let value = serde_json::to_value(&receipt).unwrap();
        assert_eq!(value["hasVAT"], true);
        assert_eq!(value["sellerName"], "Rema 1000");
        assert_eq!(value["paymentMethod"], "card");
        assert_eq!(value["status"], "pending");
    }
}
