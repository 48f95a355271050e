//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod init;
mod receipts;
mod scan;
mod serve;
mod stats;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::load_settings;
use crate::models::{PaymentMethod, ReceiptStatus};

#[derive(Parser)]
#[command(name = "receipts")]
#[command(about = "Receipt capture, extraction and bookkeeping")]
#[command(version)]
pub struct Cli {
    /// Data directory (overrides config file)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the data directory and database
    Init,

    /// Ingest receipt images (files or directories)
    Scan {
        /// Image files or directories
        #[arg(required = true)]
        images: Vec<PathBuf>,
        /// Owner user id (defaults to the configured identity)
        #[arg(long)]
        owner: Option<String>,
        /// Owner email
        #[arg(long)]
        email: Option<String>,
    },

    /// Extract a receipt without storing it
    Check {
        /// Image file
        image: PathBuf,
    },

    /// List receipts, newest first
    Ls {
        #[arg(long)]
        owner: Option<String>,
        /// Only receipts in this category
        #[arg(long)]
        category: Option<String>,
        /// Maximum receipts to show (0 = unlimited)
        #[arg(short, long, default_value = "50")]
        limit: usize,
        /// Output format: table, json, ids
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Show a receipt as JSON
    Show {
        id: String,
    },

    /// Find receipts whose seller name starts with a prefix (case-sensitive)
    Search {
        prefix: String,
        #[arg(long)]
        owner: Option<String>,
    },

    /// Update receipt status, verification, category, seller or payment method
    Update {
        id: String,
        #[arg(long, value_parser = parse_status)]
        status: Option<ReceiptStatus>,
        #[arg(long)]
        verified: Option<bool>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        seller_name: Option<String>,
        #[arg(long, value_parser = parse_payment_method)]
        payment_method: Option<PaymentMethod>,
    },

    /// Delete a receipt and its image
    Rm {
        id: String,
    },

    /// Show spending statistics
    Stats {
        #[arg(long)]
        owner: Option<String>,
        /// Number of recent receipts to include
        #[arg(long, default_value = "5")]
        recent: usize,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run the callable extraction endpoint and serve stored images
    Serve {
        /// Address to bind to: PORT, HOST, or HOST:PORT (default: 127.0.0.1:3030)
        #[arg(default_value = "127.0.0.1:3030")]
        bind: String,
    },
}

fn parse_status(s: &str) -> Result<ReceiptStatus, String> {
    ReceiptStatus::from_str(s)
        .ok_or_else(|| format!("unknown status '{}' (pending, processed, verified, rejected)", s))
}

fn parse_payment_method(s: &str) -> Result<PaymentMethod, String> {
    PaymentMethod::from_str(s)
        .ok_or_else(|| format!("unknown payment method '{}' (card, cash, mobile, invoice, other)", s))
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let (settings, _config) = load_settings(cli.data_dir.as_deref(), cli.config.as_deref()).await;

    match cli.command {
        Commands::Init => init::cmd_init(&settings).await,
        Commands::Scan {
            images,
            owner,
            email,
        } => scan::cmd_scan(&settings, &images, owner, email).await,
        Commands::Check { image } => scan::cmd_check(&settings, &image).await,
        Commands::Ls {
            owner,
            category,
            limit,
            format,
        } => receipts::cmd_ls(&settings, owner, category.as_deref(), limit, &format).await,
        Commands::Show { id } => receipts::cmd_show(&settings, &id).await,
        Commands::Search { prefix, owner } => {
            receipts::cmd_search(&settings, &prefix, owner).await
        }
        Commands::Update {
            id,
            status,
            verified,
            category,
            seller_name,
            payment_method,
        } => {
            let update = crate::models::ReceiptUpdate {
                status,
                is_verified: verified,
                category,
                seller_name,
                payment_method,
            };
            receipts::cmd_update(&settings, &id, update).await
        }
        Commands::Rm { id } => receipts::cmd_rm(&settings, &id).await,
        Commands::Stats {
            owner,
            recent,
            json,
        } => stats::cmd_stats(&settings, owner, recent, json).await,
        Commands::Serve { bind } => serve::cmd_serve(&settings, &bind).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_update_flags() {
        let cli = Cli::try_parse_from([
            "receipts",
            "update",
            "abc",
            "--status",
            "verified",
            "--verified",
            "true",
            "--payment-method",
            "mobile",
        ])
        .unwrap();

        match cli.command {
            Commands::Update {
                id,
                status,
                verified,
                payment_method,
                ..
            } => {
                assert_eq!(id, "abc");
                assert_eq!(status, Some(ReceiptStatus::Verified));
                assert_eq!(verified, Some(true));
                assert_eq!(payment_method, Some(PaymentMethod::Mobile));
            }
            _ => panic!("expected update"),
        }
    }

    #[test]
    fn test_rejects_unknown_status() {
        assert!(Cli::try_parse_from(["receipts", "update", "abc", "--status", "lost"]).is_err());
    }
}
