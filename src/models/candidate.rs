//! Unvalidated extraction output.
//!
//! Vision models are loose with types: amounts may arrive as `"123,50"` and
//! organization numbers as bare numbers. Deserialization accepts those forms
//! and leaves anything unreadable as `None`.

use serde::{Deserialize, Deserializer, Serialize};

/// A line item as read by the model. Position is its only identity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItemCandidate {
    #[serde(default, deserialize_with = "lenient_string_or_empty")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub quantity: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub unit_price: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub total_price: Option<f64>,
}

/// Structured output of one extraction call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionCandidate {
    #[serde(default, deserialize_with = "lenient_string")]
    pub seller_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub seller_org_number: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub seller_address: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub total_amount: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub subtotal: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub vat_amount: Option<f64>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub currency: Option<String>,
    /// ISO date string (`YYYY-MM-DD`).
    #[serde(default, deserialize_with = "lenient_string")]
    pub receipt_date: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub receipt_number: Option<String>,
    #[serde(default, deserialize_with = "lenient_items")]
    pub items: Vec<LineItemCandidate>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub raw_text: String,
    #[serde(default)]
    pub confidence: f64,
}

/// A data-quality problem found in a candidate. Never blocks ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationIssue {
    MissingSellerName,
    InvalidTotalAmount,
    MissingReceiptDate,
    NoLineItems,
}

impl ValidationIssue {
    pub fn message(&self) -> &'static str {
        match self {
            Self::MissingSellerName => "Seller name is missing",
            Self::InvalidTotalAmount => "Total amount is missing or invalid",
            Self::MissingReceiptDate => "Receipt date is missing",
            Self::NoLineItems => "No items found on receipt",
        }
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

impl ExtractionCandidate {
    /// Report data-quality issues.
    pub fn validate(&self) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();

        if self
            .seller_name
            .as_deref()
            .map_or(true, |s| s.trim().is_empty())
        {
            issues.push(ValidationIssue::MissingSellerName);
        }
        if self.total_amount.map_or(true, |t| t <= 0.0) {
            issues.push(ValidationIssue::InvalidTotalAmount);
        }
        if self
            .receipt_date
            .as_deref()
            .map_or(true, |s| s.trim().is_empty())
        {
            issues.push(ValidationIssue::MissingReceiptDate);
        }
        if self.items.is_empty() {
            issues.push(ValidationIssue::NoLineItems);
        }

        issues
    }

    /// Subtotal as printed, or total minus VAT when only those are known.
    pub fn effective_subtotal(&self) -> Option<f64> {
        match (self.subtotal, self.total_amount, self.vat_amount) {
            (Some(subtotal), _, _) => Some(subtotal),
            (None, Some(total), Some(vat)) => Some(total - vat),
            _ => None,
        }
    }
}

/// Parse a decimal that may use a comma separator and spaces as grouping.
fn parse_amount(s: &str) -> Option<f64> {
    let cleaned: String = s
        .trim()
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) => parse_amount(&s),
        _ => None,
    })
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) if !s.trim().is_empty() => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn lenient_string_or_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_string(deserializer)?.unwrap_or_default())
}

fn lenient_items<'de, D>(deserializer: D) -> Result<Vec<LineItemCandidate>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<LineItemCandidate>>::deserialize(deserializer)?.unwrap_or_default())
}
