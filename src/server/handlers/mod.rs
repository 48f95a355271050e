//! HTTP request handlers for the callable endpoint.

mod api;
mod parse;

pub use api::health;
pub use parse::{parse_receipt, wire_message, ApiError};
