//! Client for the authenticated `parseReceipt` callable endpoint.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::config::ExtractionConfig;
use super::ReceiptExtractor;
use crate::error::{ReceiptError, RemoteErrorKind};
use crate::imaging::NormalizedImage;
use crate::models::ExtractionCandidate;

/// Request body of the callable endpoint.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseReceiptRequest {
    #[serde(default)]
    pub image_base64: String,
}

/// Error body returned by the callable endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct CallableErrorBody {
    pub error: CallableError,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CallableError {
    pub kind: RemoteErrorKind,
    pub message: String,
}

/// Extraction through the callable endpoint, authenticated as the caller.
pub struct CallableExtractionClient {
    config: ExtractionConfig,
    token: Option<String>,
    client: Client,
}

impl CallableExtractionClient {
    pub fn new(config: ExtractionConfig, token: Option<String>) -> Result<Self, ReceiptError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| ReceiptError::Network(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self {
            config,
            token,
            client,
        })
    }

    fn url(&self) -> String {
        format!("{}/parseReceipt", self.config.endpoint.trim_end_matches('/'))
    }

    /// Call the endpoint with an already base64-encoded JPEG.
    pub async fn parse_base64(&self, image_base64: &str) -> Result<ExtractionCandidate, ReceiptError> {
        let token = self.token.as_deref().ok_or_else(|| {
            ReceiptError::Authentication("User must be authenticated to parse receipts.".to_string())
        })?;

        debug!("Calling {}", self.url());
        let resp = self
            .client
            .post(self.url())
            .bearer_auth(token)
            .json(&ParseReceiptRequest {
                image_base64: image_base64.to_string(),
            })
            .send()
            .await
            .map_err(|e| ReceiptError::Network(e.to_string()))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| ReceiptError::Network(e.to_string()))?;

        if status.is_success() {
            return serde_json::from_str::<ExtractionCandidate>(&body).map_err(|e| {
                ReceiptError::Parsing {
                    message: format!("unexpected endpoint response: {}", e),
                    raw_text: body.clone(),
                }
            });
        }

        let err = match serde_json::from_str::<CallableErrorBody>(&body) {
            Ok(parsed) => ReceiptError::from_remote(parsed.error.kind, parsed.error.message),
            Err(_) => classify_status(status, &body),
        };
        warn!("Callable extraction failed: {}", err);
        Err(err)
    }
}

/// Classify a failure whose body carries no recognizable error kind.
fn classify_status(status: StatusCode, body: &str) -> ReceiptError {
    let kind = match status {
        StatusCode::UNAUTHORIZED => RemoteErrorKind::Unauthenticated,
        StatusCode::TOO_MANY_REQUESTS => RemoteErrorKind::ResourceExhausted,
        StatusCode::BAD_REQUEST => RemoteErrorKind::InvalidArgument,
        StatusCode::PRECONDITION_FAILED => RemoteErrorKind::FailedPrecondition,
        _ => RemoteErrorKind::Internal,
    };
    ReceiptError::from_remote(kind, format!("HTTP {}: {}", status.as_u16(), body.trim()))
}

#[async_trait]
impl ReceiptExtractor for CallableExtractionClient {
    fn name(&self) -> &str {
        "callable"
    }

    async fn extract(&self, image: &NormalizedImage) -> Result<ExtractionCandidate, ReceiptError> {
        self.parse_base64(&image.to_base64()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderMap;
    use axum::routing::post;
    use axum::{Json, Router};

    async fn spawn_endpoint(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn client(endpoint: &str, token: Option<&str>) -> CallableExtractionClient {
        CallableExtractionClient::new(
            ExtractionConfig::base_default().with_endpoint(endpoint),
            token.map(String::from),
        )
        .unwrap()
    }

    fn error_router(status: StatusCode, kind: &'static str, message: &'static str) -> Router {
        Router::new().route(
            "/parseReceipt",
            post(move || async move {
                (
                    status,
                    Json(serde_json::json!({"error": {"kind": kind, "message": message}})),
                )
            }),
        )
    }

    #[tokio::test]
    async fn test_missing_token_fails_without_request() {
        let client = client("http://127.0.0.1:9", None);
        let err = client.parse_base64("AAAA").await.unwrap_err();
        assert!(matches!(err, ReceiptError::Authentication(_)));
    }

    #[tokio::test]
    async fn test_success_returns_candidate() {
        let router = Router::new().route(
            "/parseReceipt",
            post(|headers: HeaderMap, Json(req): Json<ParseReceiptRequest>| async move {
                assert_eq!(headers["authorization"], "Bearer secret");
                assert_eq!(req.image_base64, "AAAA");
                Json(serde_json::json!({
                    "sellerName": "Rema 1000",
                    "totalAmount": 42.5,
                    "items": [],
                    "rawText": "{}",
                    "confidence": 0.9
                }))
            }),
        );
        let endpoint = spawn_endpoint(router).await;

        let candidate = client(&endpoint, Some("secret"))
            .parse_base64("AAAA")
            .await
            .unwrap();
        assert_eq!(candidate.seller_name.as_deref(), Some("Rema 1000"));
        assert!((candidate.confidence - 0.9).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_resource_exhausted_is_quota_error() {
        let endpoint = spawn_endpoint(error_router(
            StatusCode::TOO_MANY_REQUESTS,
            "resource-exhausted",
            "OpenAI API quota exceeded.",
        ))
        .await;
        let err = client(&endpoint, Some("secret"))
            .parse_base64("AAAA")
            .await
            .unwrap_err();
        assert!(matches!(err, ReceiptError::QuotaExceeded(_)));
    }

    #[tokio::test]
    async fn test_unauthenticated_is_auth_error() {
        let endpoint = spawn_endpoint(error_router(
            StatusCode::UNAUTHORIZED,
            "unauthenticated",
            "User must be authenticated to parse receipts.",
        ))
        .await;
        let err = client(&endpoint, Some("wrong"))
            .parse_base64("AAAA")
            .await
            .unwrap_err();
        assert!(matches!(err, ReceiptError::Authentication(_)));
    }

    #[tokio::test]
    async fn test_invalid_json_is_parsing_error() {
        let endpoint = spawn_endpoint(error_router(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal",
            "Received invalid JSON format from model.",
        ))
        .await;
        let err = client(&endpoint, Some("secret"))
            .parse_base64("AAAA")
            .await
            .unwrap_err();
        assert!(matches!(err, ReceiptError::Parsing { .. }));
    }

    #[test]
    fn test_classify_status_without_body() {
        assert!(matches!(
            classify_status(StatusCode::UNAUTHORIZED, ""),
            ReceiptError::Authentication(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::BAD_GATEWAY, "<html>"),
            ReceiptError::Service {
                kind: RemoteErrorKind::Internal,
                ..
            }
        ));
    }
}
