//! Router configuration for the callable endpoint.

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use super::handlers;
use super::AppState;

/// Request body cap for `/parseReceipt`. A bounded JPEG fits well inside
/// this once base64-encoded.
pub const MAX_REQUEST_BYTES: usize = 16 * 1024 * 1024;

/// Create the main router with all routes.
pub fn create_router(state: AppState) -> Router {
    let files = ServeDir::new(&state.blobs_dir);

    Router::new()
        .route(
            "/parseReceipt",
            post(handlers::parse_receipt).layer(DefaultBodyLimit::max(MAX_REQUEST_BYTES)),
        )
        .route("/health", get(handlers::health))
        // Stored receipt images, so imageUrl resolves against this server
        .nest_service("/files", files)
        .layer(CorsLayer::permissive())
        .with_state(state)
}
