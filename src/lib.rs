//! receiptscan - receipt ingestion pipeline.
//!
//! Turns a photographed receipt into a stored, owner-scoped receipt record:
//! the image is normalized to a bounded JPEG, sent to a vision model for
//! structured extraction, normalized into a receipt draft, then the image is
//! uploaded to a blob store and the record written to SQLite.

pub mod auth;
pub mod cli;
pub mod config;
pub mod error;
pub mod extraction;
pub mod imaging;
pub mod migrations;
pub mod models;
pub mod repository;
pub mod schema;
pub mod server;
pub mod services;
pub mod storage;

pub use error::{ReceiptError, RemoteErrorKind, StorageError};
