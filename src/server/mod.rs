//! Callable receipt extraction endpoint.
//!
//! Exposes `POST /parseReceipt` to authenticated callers, forwards the image
//! to the vision model and returns the decoded candidate. Also serves stored
//! receipt images under `/files`.

mod handlers;
mod routes;

pub use handlers::{wire_message, ApiError};
pub use routes::{create_router, MAX_REQUEST_BYTES};

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use crate::auth::TokenRegistry;
use crate::config::Settings;
use crate::extraction::VisionExtractor;

/// Shared state for the web server.
#[derive(Clone)]
pub struct AppState {
    pub vision: Arc<VisionExtractor>,
    pub tokens: Arc<TokenRegistry>,
    pub blobs_dir: PathBuf,
}

impl AppState {
    pub fn new(settings: &Settings) -> anyhow::Result<Self> {
        let vision = VisionExtractor::new(settings.extraction.clone())?;
        let tokens = settings.token_registry();
        if tokens.is_empty() {
            tracing::warn!("No tokens configured; every parseReceipt call will be rejected");
        }

        Ok(Self {
            vision: Arc::new(vision),
            tokens: Arc::new(tokens),
            blobs_dir: settings.blobs_dir.clone(),
        })
    }
}

/// Start the web server.
pub async fn serve(settings: &Settings, host: &str, port: u16) -> anyhow::Result<()> {
    let state = AppState::new(settings)?;
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    tracing::info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};
    use tempfile::tempdir;
    use tower::ServiceExt;

    use crate::auth::Identity;
    use crate::extraction::{ExtractionConfig, INVALID_JSON_MESSAGE};

    async fn spawn_model(reply: serde_json::Value) -> String {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(move || {
                let reply = reply.clone();
                async move { Json(reply) }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn model_reply(content: &str) -> serde_json::Value {
        serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": content } }]
        })
    }

    fn test_app(config: ExtractionConfig, blobs_dir: PathBuf) -> Router {
        let mut tokens = HashMap::new();
        tokens.insert("secret".to_string(), Identity::new("u1", "u1@example.com"));

        let state = AppState {
            vision: Arc::new(VisionExtractor::new(config).unwrap()),
            tokens: Arc::new(TokenRegistry::new(tokens)),
            blobs_dir,
        };
        create_router(state)
    }

    fn parse_request(token: Option<&str>, body: &str) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/parseReceipt")
            .header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let dir = tempdir().unwrap();
        let app = test_app(ExtractionConfig::base_default(), dir.path().to_path_buf());

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_parse_requires_token() {
        let dir = tempdir().unwrap();
        let app = test_app(ExtractionConfig::base_default(), dir.path().to_path_buf());

        let response = app
            .clone()
            .oneshot(parse_request(None, r#"{"imageBase64":"AAAA"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let json = json_body(response).await;
        assert_eq!(json["error"]["kind"], "unauthenticated");

        let response = app
            .oneshot(parse_request(Some("wrong"), r#"{"imageBase64":"AAAA"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_parse_requires_image() {
        let dir = tempdir().unwrap();
        let app = test_app(ExtractionConfig::base_default(), dir.path().to_path_buf());

        let response = app
            .clone()
            .oneshot(parse_request(Some("secret"), r#"{"imageBase64":""}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = json_body(response).await;
        assert_eq!(json["error"]["kind"], "invalid-argument");

        let response = app
            .oneshot(parse_request(Some("secret"), "{}"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_parse_malformed_body_is_not_reported_missing() {
        let dir = tempdir().unwrap();
        let app = test_app(ExtractionConfig::base_default(), dir.path().to_path_buf());

        let response = app
            .oneshot(parse_request(Some("secret"), r#"{"imageBase64": "#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = json_body(response).await;
        assert_eq!(json["error"]["kind"], "invalid-argument");
        assert_eq!(json["error"]["message"], "Request body is not valid JSON.");
    }

    #[tokio::test]
    async fn test_parse_accepts_multi_megabyte_image() {
        let dir = tempdir().unwrap();
        let mut config = ExtractionConfig::base_default();
        config.api_key = None;
        let app = test_app(config, dir.path().to_path_buf());

        // Larger than axum's stock 2 MB limit, well inside the route cap.
        // Reaching the extractor's key check means the body was accepted.
        let image = "A".repeat(6 * 1024 * 1024);
        let body = serde_json::json!({ "imageBase64": image }).to_string();
        let response = app
            .oneshot(parse_request(Some("secret"), &body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PRECONDITION_FAILED);
        let json = json_body(response).await;
        assert_eq!(json["error"]["kind"], "failed-precondition");
    }

    #[tokio::test]
    async fn test_parse_oversized_body_is_too_large() {
        let dir = tempdir().unwrap();
        let app = test_app(ExtractionConfig::base_default(), dir.path().to_path_buf());

        let image = "A".repeat(MAX_REQUEST_BYTES + 1);
        let body = serde_json::json!({ "imageBase64": image }).to_string();
        let response = app
            .oneshot(parse_request(Some("secret"), &body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = json_body(response).await;
        assert_eq!(json["error"]["kind"], "invalid-argument");
        assert_eq!(json["error"]["message"], "Image data is too large.");
    }

    #[tokio::test]
    async fn test_parse_without_api_key() {
        let dir = tempdir().unwrap();
        let mut config = ExtractionConfig::base_default();
        config.api_key = None;
        let app = test_app(config, dir.path().to_path_buf());

        let response = app
            .oneshot(parse_request(Some("secret"), r#"{"imageBase64":"AAAA"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PRECONDITION_FAILED);
        let json = json_body(response).await;
        assert_eq!(json["error"]["kind"], "failed-precondition");
    }

    #[tokio::test]
    async fn test_parse_success() {
        let dir = tempdir().unwrap();
        let content = "```json\n{\"sellerName\": \"Rema 1000\", \"totalAmount\": 125.5, \"items\": []}\n```";
        let endpoint = spawn_model(model_reply(content)).await;
        let config = ExtractionConfig::base_default()
            .with_model_endpoint(&endpoint)
            .with_api_key("sk-test");
        let app = test_app(config, dir.path().to_path_buf());

        let response = app
            .oneshot(parse_request(Some("secret"), r#"{"imageBase64":"AAAA"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["sellerName"], "Rema 1000");
        assert_eq!(json["totalAmount"], 125.5);
        assert_eq!(json["confidence"], 0.9);
        assert_eq!(json["rawText"], content);
    }

    #[tokio::test]
    async fn test_parse_invalid_model_json() {
        let dir = tempdir().unwrap();
        let endpoint = spawn_model(model_reply("I cannot read this receipt")).await;
        let config = ExtractionConfig::base_default()
            .with_model_endpoint(&endpoint)
            .with_api_key("sk-test");
        let app = test_app(config, dir.path().to_path_buf());

        let response = app
            .oneshot(parse_request(Some("secret"), r#"{"imageBase64":"AAAA"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = json_body(response).await;
        assert_eq!(json["error"]["kind"], "internal");
        assert_eq!(json["error"]["message"], INVALID_JSON_MESSAGE);
    }

    #[tokio::test]
    async fn test_serves_stored_files() {
        let dir = tempdir().unwrap();
        let owner_dir = dir.path().join("receipts/u1");
        std::fs::create_dir_all(&owner_dir).unwrap();
        std::fs::write(owner_dir.join("receipt_1.jpg"), b"jpeg-bytes").unwrap();
        let app = test_app(ExtractionConfig::base_default(), dir.path().to_path_buf());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/files/receipts/u1/receipt_1.jpg")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"jpeg-bytes");
    }
}
