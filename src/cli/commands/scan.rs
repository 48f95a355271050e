//! Scan and check commands.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;

use crate::cli::helpers::{format_amount, open_store, resolve_owner};
use crate::config::Settings;
use crate::extraction::{build_extractor, ReceiptExtractor};
use crate::imaging::{collect_image_paths, RawImage};
use crate::services::{check_image, IngestEvent, IngestService};

fn spinner() -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

fn extractor(settings: &Settings) -> anyhow::Result<Arc<dyn ReceiptExtractor>> {
    let token = settings.identity.token.clone();
    Ok(Arc::from(build_extractor(&settings.extraction, token)?))
}

/// Ingest each image independently. A failure on one does not stop the rest.
pub async fn cmd_scan(
    settings: &Settings,
    inputs: &[PathBuf],
    owner: Option<String>,
    email: Option<String>,
) -> anyhow::Result<()> {
    let owner = resolve_owner(settings, owner, email)?;
    let store = open_store(settings)?;
    let service = IngestService::new(extractor(settings)?, store);

    let paths = collect_image_paths(inputs)?;
    if paths.is_empty() {
        println!("{} No images found", style("!").yellow());
        return Ok(());
    }

    println!(
        "{} Scanning {} image(s) as {} via {}",
        style("→").cyan(),
        paths.len(),
        owner.user_id,
        settings.extraction.mode.as_str()
    );

    let mut saved = 0usize;
    let mut failed = 0usize;

    for path in &paths {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());

        let raw = match RawImage::from_path(path).await {
            Ok(raw) => raw,
            Err(e) => {
                println!("  {} {}: {}", style("✗").red(), name, e.user_message());
                failed += 1;
                continue;
            }
        };

        let pb = spinner();
        pb.set_message(format!("{}: reading image", name));

        let (tx, mut rx) = mpsc::channel::<IngestEvent>(16);
        let progress = pb.clone();
        let label = name.clone();
        let listener = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let msg = match event {
                    IngestEvent::Normalizing { .. } => "normalizing image".to_string(),
                    IngestEvent::Extracting { bytes, .. } => {
                        format!("extracting ({} KB)", bytes / 1024)
                    }
                    IngestEvent::Issues { issues, .. } => format!("{} issue(s)", issues.len()),
                    IngestEvent::Saving { .. } => "saving".to_string(),
                    IngestEvent::Saved { .. } | IngestEvent::Failed { .. } => break,
                };
                progress.set_message(format!("{}: {}", label, msg));
            }
        });

        let result = service.ingest_with_events(&owner, raw, Some(&tx)).await;
        drop(tx);
        let _ = listener.await;
        pb.finish_and_clear();

        match result {
            Ok(receipt) => {
                saved += 1;
                println!(
                    "  {} {} → {} ({}, {})",
                    style("✓").green(),
                    name,
                    receipt.id,
                    receipt.seller_name,
                    format_amount(receipt.total_amount, &receipt.currency)
                );
            }
            Err(e) => {
                failed += 1;
                println!("  {} {}: {}", style("✗").red(), name, e.user_message());
                tracing::debug!("{}: {:?}", name, e);
            }
        }
    }

    println!(
        "{} {} saved, {} failed",
        if failed == 0 {
            style("✓").green()
        } else {
            style("!").yellow()
        },
        saved,
        failed
    );

    Ok(())
}

/// Normalize and extract one image; print the candidate and any issues.
///
/// Runs the same check as ingestion but needs no database.
pub async fn cmd_check(settings: &Settings, image: &Path) -> anyhow::Result<()> {
    let extractor = extractor(settings)?;

    let raw = RawImage::from_path(image).await?;
    let pb = spinner();
    pb.set_message(format!("Extracting {} via {}", image.display(), extractor.name()));

    let checked = check_image(extractor.as_ref(), raw, None).await;
    pb.finish_and_clear();

    let checked = match checked {
        Ok(checked) => checked,
        Err(e) => {
            println!("{} {}", style("✗").red(), e.user_message());
            return Err(e.into());
        }
    };

    println!(
        "{} Normalized to {}x{} ({} bytes)",
        style("✓").green(),
        checked.image.width,
        checked.image.height,
        checked.image.bytes.len()
    );
    println!("{}", serde_json::to_string_pretty(&checked.candidate)?);

    if let Some(subtotal) = checked.candidate.effective_subtotal() {
        println!("\n  Subtotal (derived): {:.2}", subtotal);
    }

    if checked.issues.is_empty() {
        println!("{} No issues", style("✓").green());
    } else {
        for issue in &checked.issues {
            println!("{} {}", style("!").yellow(), issue);
        }
    }

    Ok(())
}
