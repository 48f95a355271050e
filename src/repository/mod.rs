//! Document store for receipts.
//!
//! SQLite through Diesel, with async access via diesel-async's
//! `SyncConnectionWrapper`. Schema changes are cetane migrations in
//! `crate::migrations`.

mod migrations;
mod models;
pub mod pool;
mod receipt;
pub mod util;

pub use migrations::{applied_migrations, run_migrations};
pub use pool::{DbPool, DieselError};
pub use receipt::DieselReceiptRepository;
pub use util::{parse_datetime, prefix_upper_bound};
