//! Service layer for receipt ingestion and queries.
//!
//! Services can be used by the CLI, the callable endpoint, or tests.

pub mod ingest;
pub mod normalize;
pub mod stats;
pub mod store;

pub use ingest::{check_image, CheckResult, IngestEvent, IngestService};
pub use normalize::{normalize_candidate, parse_receipt_date};
pub use stats::{compute_stats, month_start, ReceiptStats};
pub use store::ReceiptStore;
