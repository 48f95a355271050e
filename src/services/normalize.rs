//! Receipt normalization: extraction candidate to storable draft.
//!
//! Pure and total. Every optional field has a default, so any candidate
//! produces a draft.

use chrono::{DateTime, NaiveDate, Utc};
use tracing::debug;

use crate::models::{
    ExtractionCandidate, LineItem, PaymentMethod, ReceiptDraft, DEFAULT_CURRENCY,
};

/// Build a draft from a candidate captured at `captured_at`.
///
/// Line item ids are `{captured_at millis}-{index}`: presentation keys, not
/// identities.
pub fn normalize_candidate(
    candidate: &ExtractionCandidate,
    captured_at: DateTime<Utc>,
) -> ReceiptDraft {
    let millis = captured_at.timestamp_millis();

    let items = candidate
        .items
        .iter()
        .enumerate()
        .map(|(index, item)| LineItem {
            id: format!("{}-{}", millis, index),
            name: item.name.clone(),
            quantity: item.quantity.unwrap_or(1.0),
            unit_price: item.unit_price.unwrap_or(0.0),
            total_price: item.total_price.unwrap_or(0.0),
        })
        .collect();

    ReceiptDraft {
        seller_name: candidate.seller_name.clone().unwrap_or_default(),
        seller_org_number: candidate.seller_org_number.clone(),
        seller_address: candidate.seller_address.clone(),
        total_amount: candidate.total_amount.unwrap_or(0.0),
        subtotal: candidate.subtotal,
        vat_amount: candidate.vat_amount,
        currency: candidate
            .currency
            .clone()
            .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
        has_vat: candidate.vat_amount.unwrap_or(0.0) > 0.0,
        receipt_date: candidate
            .receipt_date
            .as_deref()
            .and_then(parse_receipt_date)
            .unwrap_or(captured_at),
        receipt_number: candidate.receipt_number.clone(),
        category: None,
        payment_method: PaymentMethod::from_str_lenient(candidate.payment_method.as_deref()),
        items,
        ocr_raw_text: candidate.raw_text.clone(),
        ocr_confidence: candidate.confidence,
    }
}

/// Parse a receipt date as `YYYY-MM-DD` (midnight UTC) or RFC 3339.
pub fn parse_receipt_date(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    debug!("Unrecognized receipt date {:?}, using capture time", s);
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LineItemCandidate;
    use chrono::TimeZone;

    fn captured() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 2, 12, 30, 0).unwrap()
    }

    #[test]
    fn test_empty_candidate_gets_defaults() {
        let draft = normalize_candidate(&ExtractionCandidate::default(), captured());
        assert_eq!(draft.total_amount, 0.0);
        assert_eq!(draft.seller_name, "");
        assert_eq!(draft.currency, "NOK");
        assert!(!draft.has_vat);
        assert_eq!(draft.payment_method, PaymentMethod::Other);
        assert!(draft.items.is_empty());
        assert_eq!(draft.receipt_date, captured());
        assert_eq!(draft.category, None);
    }

    #[test]
    fn test_has_vat_derivation() {
        let mut candidate = ExtractionCandidate {
            vat_amount: Some(150.0),
            ..Default::default()
        };
        assert!(normalize_candidate(&candidate, captured()).has_vat);

        candidate.vat_amount = Some(0.0);
        assert!(!normalize_candidate(&candidate, captured()).has_vat);

        candidate.vat_amount = None;
        assert!(!normalize_candidate(&candidate, captured()).has_vat);
    }

    #[test]
    fn test_payment_method_folding() {
        let mut candidate = ExtractionCandidate {
            payment_method: Some("CARD".to_string()),
            ..Default::default()
        };
        assert_eq!(
            normalize_candidate(&candidate, captured()).payment_method,
            PaymentMethod::Card
        );

        candidate.payment_method = Some("bitcoin".to_string());
        assert_eq!(
            normalize_candidate(&candidate, captured()).payment_method,
            PaymentMethod::Other
        );
    }

    #[test]
    fn test_items_get_presentation_ids_and_defaults() {
        let candidate = ExtractionCandidate {
            items: vec![
                LineItemCandidate {
                    name: "Melk".to_string(),
                    quantity: Some(2.0),
                    unit_price: Some(21.9),
                    total_price: Some(43.8),
                },
                LineItemCandidate {
                    name: String::new(),
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        let draft = normalize_candidate(&candidate, captured());
        let millis = captured().timestamp_millis();

        assert_eq!(draft.items[0].id, format!("{}-0", millis));
        assert_eq!(draft.items[1].id, format!("{}-1", millis));
        assert_eq!(draft.items[1].quantity, 1.0);
        assert_eq!(draft.items[1].unit_price, 0.0);
        assert_eq!(draft.items[1].total_price, 0.0);
    }

    #[test]
    fn test_receipt_date_parsing() {
        let candidate = ExtractionCandidate {
            receipt_date: Some("2024-03-14".to_string()),
            ..Default::default()
        };
        let draft = normalize_candidate(&candidate, captured());
        assert_eq!(draft.receipt_date, Utc.with_ymd_and_hms(2024, 3, 14, 0, 0, 0).unwrap());

        let candidate = ExtractionCandidate {
            receipt_date: Some("14.03.2024".to_string()),
            ..Default::default()
        };
        assert_eq!(normalize_candidate(&candidate, captured()).receipt_date, captured());
    }

    #[test]
    fn test_raw_text_and_confidence_carry_over() {
        let candidate = ExtractionCandidate {
            raw_text: "{\"sellerName\":\"X\"}".to_string(),
            confidence: 0.9,
            currency: Some("EUR".to_string()),
            ..Default::default()
        };
        let draft = normalize_candidate(&candidate, captured());
        assert_eq!(draft.ocr_raw_text, candidate.raw_text);
        assert_eq!(draft.ocr_confidence, 0.9);
        assert_eq!(draft.currency, "EUR");
    }
}
