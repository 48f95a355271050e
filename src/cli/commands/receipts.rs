//! Receipt listing and management commands.

use console::style;

use crate::cli::helpers::{format_amount, open_store, print_receipt_table, resolve_owner};
use crate::config::Settings;
use crate::error::ReceiptError;
use crate::models::{Receipt, ReceiptUpdate};

/// List an owner's receipts, newest first.
pub async fn cmd_ls(
    settings: &Settings,
    owner: Option<String>,
    category: Option<&str>,
    limit: usize,
    format: &str,
) -> anyhow::Result<()> {
    let owner = resolve_owner(settings, owner, None)?;
    let store = open_store(settings)?;

    let mut receipts = match category {
        Some(cat) => store.list_by_owner_and_category(&owner.user_id, cat).await?,
        None => store.list_by_owner(&owner.user_id).await?,
    };
    Receipt::sort_newest_first(&mut receipts);
    if limit > 0 {
        receipts.truncate(limit);
    }

    if receipts.is_empty() {
        println!("{} No receipts found", style("!").yellow());
        return Ok(());
    }

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&receipts)?),
        "ids" => {
            for receipt in &receipts {
                println!("{}", receipt.id);
            }
        }
        _ => print_receipt_table(&receipts),
    }

    Ok(())
}

pub async fn cmd_show(settings: &Settings, id: &str) -> anyhow::Result<()> {
    let store = open_store(settings)?;
    match store.get(id).await? {
        Some(receipt) => {
            println!("{}", serde_json::to_string_pretty(&receipt)?);
            Ok(())
        }
        None => Err(ReceiptError::NotFound(id.to_string()).into()),
    }
}

/// Seller-name prefix search.
pub async fn cmd_search(
    settings: &Settings,
    prefix: &str,
    owner: Option<String>,
) -> anyhow::Result<()> {
    let owner = resolve_owner(settings, owner, None)?;
    let store = open_store(settings)?;

    let receipts = store
        .search_by_owner_and_name_prefix(&owner.user_id, prefix)
        .await?;

    if receipts.is_empty() {
        println!(
            "{} No receipts with seller starting with '{}'",
            style("!").yellow(),
            prefix
        );
        return Ok(());
    }

    print_receipt_table(&receipts);
    Ok(())
}

pub async fn cmd_update(settings: &Settings, id: &str, update: ReceiptUpdate) -> anyhow::Result<()> {
    if update.is_empty() {
        anyhow::bail!("Nothing to update. Pass at least one of --status, --verified, --category, --seller-name, --payment-method");
    }

    let store = open_store(settings)?;
    let receipt = store.update(id, &update).await?;

    println!(
        "{} Updated {} ({}, {}, {})",
        style("✓").green(),
        receipt.id,
        receipt.seller_name,
        format_amount(receipt.total_amount, &receipt.currency),
        receipt.status
    );
    Ok(())
}

pub async fn cmd_rm(settings: &Settings, id: &str) -> anyhow::Result<()> {
    let store = open_store(settings)?;
    store.delete(id).await?;
    println!("{} Deleted {}", style("✓").green(), id);
    Ok(())
}
