//! Summary statistics over an owner's receipts.
//!
//! Pure functions over already-fetched receipts. `now` is a parameter so
//! results are deterministic.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde::Serialize;

use crate::models::Receipt;

/// Aggregate figures for one owner.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptStats {
    pub receipt_count: usize,
    pub total_amount: f64,
    pub total_vat: f64,
    pub this_month_amount: f64,
    pub average_amount: f64,
    /// Sum of `totalAmount` per category; uncategorized receipts are left out.
    pub by_category: BTreeMap<String, f64>,
    /// Newest first by `createdAt`.
    pub recent_receipts: Vec<Receipt>,
}

/// First instant of the UTC calendar month containing `now`.
pub fn month_start(now: DateTime<Utc>) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
        .single()
        .unwrap_or(now)
}

/// Compute stats, keeping the `recent` newest receipts.
pub fn compute_stats(receipts: &[Receipt], now: DateTime<Utc>, recent: usize) -> ReceiptStats {
    let start = month_start(now);

    let total_amount: f64 = receipts.iter().map(|r| r.total_amount).sum();
    let total_vat: f64 = receipts.iter().filter_map(|r| r.vat_amount).sum();
    let this_month_amount: f64 = receipts
        .iter()
        .filter(|r| r.receipt_date >= start && r.receipt_date < now)
        .map(|r| r.total_amount)
        .sum();

    let average_amount = if receipts.is_empty() {
        0.0
    } else {
        total_amount / receipts.len() as f64
    };

    let mut by_category = BTreeMap::new();
    for receipt in receipts {
        if let Some(category) = receipt.category.as_deref().filter(|c| !c.is_empty()) {
            *by_category.entry(category.to_string()).or_insert(0.0) += receipt.total_amount;
        }
    }

    let mut recent_receipts = receipts.to_vec();
    Receipt::sort_newest_first(&mut recent_receipts);
    recent_receipts.truncate(recent);

    ReceiptStats {
        receipt_count: receipts.len(),
        total_amount,
        total_vat,
        this_month_amount,
        average_amount,
        by_category,
        recent_receipts,
    }
}
