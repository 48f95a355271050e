//! Shared helper functions for CLI commands.

use std::sync::Arc;

use console::style;

use crate::auth::Identity;
use crate::config::Settings;
use crate::models::Receipt;
use crate::repository::{DbPool, DieselReceiptRepository};
use crate::services::ReceiptStore;
use crate::storage::LocalBlobStore;

/// Open the receipt store described by `settings`.
pub fn open_store(settings: &Settings) -> anyhow::Result<ReceiptStore> {
    if !settings.database_exists() {
        anyhow::bail!(
            "No database at {}. Run 'receipts init' first.",
            settings.database_path().display()
        );
    }
    let repo = DieselReceiptRepository::new(DbPool::from_path(&settings.database_path()));
    let blobs = LocalBlobStore::new(settings.blobs_dir.clone(), settings.public_base_url());
    Ok(ReceiptStore::new(repo, Arc::new(blobs)))
}

/// Owner for a command: `--owner` beats the configured identity.
pub fn resolve_owner(
    settings: &Settings,
    owner: Option<String>,
    email: Option<String>,
) -> anyhow::Result<Identity> {
    let configured = settings.identity.identity();
    match (owner, configured) {
        (Some(user_id), configured) => {
            let email = email
                .or_else(|| {
                    configured
                        .filter(|c| c.user_id == user_id)
                        .map(|c| c.email)
                })
                .unwrap_or_default();
            Ok(Identity::new(user_id, email))
        }
        (None, Some(mut identity)) => {
            if let Some(email) = email {
                identity.email = email;
            }
            Ok(identity)
        }
        (None, None) => anyhow::bail!(
            "No owner given. Pass --owner or set RECEIPT_USER_ID / [identity] user_id."
        ),
    }
}

/// Truncate a string to at most `max` characters, appending "...".
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let kept: String = s.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", kept)
}

pub fn format_amount(amount: f64, currency: &str) -> String {
    format!("{:.2} {}", amount, currency)
}

/// Print receipts as a table.
pub fn print_receipt_table(receipts: &[Receipt]) {
    println!(
        "\n{:<36}  {:<24}  {:>14}  {:<10}  {:<10}  Status",
        "ID", "Seller", "Total", "Date", "Category"
    );
    println!("{}", "-".repeat(110));

    for receipt in receipts {
        let status = if receipt.is_verified {
            style(format!("{} ✓", receipt.status)).green().to_string()
        } else {
            receipt.status.to_string()
        };
        println!(
            "{:<36}  {:<24}  {:>14}  {:<10}  {:<10}  {}",
            receipt.id,
            truncate(&receipt.seller_name, 24),
            format_amount(receipt.total_amount, &receipt.currency),
            receipt.receipt_date.format("%Y-%m-%d"),
            truncate(receipt.category.as_deref().unwrap_or("-"), 10),
            status
        );
    }
    println!();
}
