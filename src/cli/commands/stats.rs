//! Stats command.

use chrono::Utc;
use console::style;

use crate::cli::helpers::{format_amount, open_store, print_receipt_table, resolve_owner};
use crate::config::Settings;
use crate::models::DEFAULT_CURRENCY;
use crate::services::compute_stats;

pub async fn cmd_stats(
    settings: &Settings,
    owner: Option<String>,
    recent: usize,
    json: bool,
) -> anyhow::Result<()> {
    let owner = resolve_owner(settings, owner, None)?;
    let store = open_store(settings)?;

    let receipts = store.list_by_owner(&owner.user_id).await?;
    let stats = compute_stats(&receipts, Utc::now(), recent);

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("\n{}", style(format!("Receipts for {}", owner.user_id)).bold());
    println!("{}", "-".repeat(40));
    println!("  {:<14} {}", "Receipts:", stats.receipt_count);
    println!(
        "  {:<14} {}",
        "Total:",
        format_amount(stats.total_amount, DEFAULT_CURRENCY)
    );
    println!(
        "  {:<14} {}",
        "VAT:",
        format_amount(stats.total_vat, DEFAULT_CURRENCY)
    );
    println!(
        "  {:<14} {}",
        "This month:",
        format_amount(stats.this_month_amount, DEFAULT_CURRENCY)
    );
    println!(
        "  {:<14} {}",
        "Average:",
        format_amount(stats.average_amount, DEFAULT_CURRENCY)
    );

    if !stats.by_category.is_empty() {
        println!("\n  By category:");
        for (category, amount) in &stats.by_category {
            println!(
                "    {:<20} {}",
                category,
                format_amount(*amount, DEFAULT_CURRENCY)
            );
        }
    }

    if !stats.recent_receipts.is_empty() {
        println!("\n  Recent:");
        print_receipt_table(&stats.recent_receipts);
    }

    Ok(())
}
