//! Direct extraction through an OpenAI-compatible vision model.
//!
//! Used by the callable endpoint and by the `direct` extraction mode. Errors
//! are classified once, here, and never retried.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use super::config::ExtractionConfig;
use super::parse::parse_model_output;
use super::prompts::{SYSTEM_PROMPT, USER_PROMPT};
use super::ReceiptExtractor;
use crate::error::{ReceiptError, RemoteErrorKind};
use crate::imaging::NormalizedImage;
use crate::models::ExtractionCandidate;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: MessageContent<'a>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum MessageContent<'a> {
    Text(&'a str),
    Parts(Vec<ContentPart<'a>>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum ContentPart<'a> {
    #[serde(rename = "text")]
    Text { text: &'a str },
    #[serde(rename = "image_url")]
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
    detail: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Option<Vec<ChatChoice>>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// OpenAI-compatible chat completions client for receipt images.
#[derive(Clone)]
pub struct VisionExtractor {
    config: ExtractionConfig,
    client: Client,
}

impl VisionExtractor {
    pub fn new(config: ExtractionConfig) -> Result<Self, ReceiptError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| ReceiptError::Network(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    fn completions_url(&self) -> String {
        format!(
            "{}/v1/chat/completions",
            self.config.model_endpoint.trim_end_matches('/')
        )
    }

    /// Send a base64 JPEG to the model and return its raw text reply.
    pub async fn complete(&self, image_base64: &str) -> Result<String, ReceiptError> {
        let api_key = self.config.api_key.as_deref().ok_or_else(|| ReceiptError::Service {
            kind: RemoteErrorKind::FailedPrecondition,
            message: "OpenAI API key not configured.".to_string(),
        })?;

        let data_url = format!("data:image/jpeg;base64,{}", image_base64);
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: MessageContent::Text(SYSTEM_PROMPT),
                },
                ChatMessage {
                    role: "user",
                    content: MessageContent::Parts(vec![
                        ContentPart::Text { text: USER_PROMPT },
                        ContentPart::ImageUrl {
                            image_url: ImageUrl {
                                url: data_url,
                                detail: "high",
                            },
                        },
                    ]),
                },
            ],
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        debug!(
            "Sending receipt to {} ({} base64 bytes)",
            self.config.model,
            image_base64.len()
        );

        let resp = self
            .client
            .post(self.completions_url())
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ReceiptError::Network(e.to_string()))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| ReceiptError::Network(e.to_string()))?;

        if !status.is_success() {
            let message = serde_json::from_str::<ApiErrorBody>(&body)
                .ok()
                .and_then(|b| b.error)
                .map(|e| e.message)
                .unwrap_or_else(|| body.clone());
            error!("Model API returned HTTP {}: {}", status, message);
            return Err(classify_api_error(status, &message));
        }

        let parsed: ChatResponse = serde_json::from_str(&body).map_err(|e| {
            ReceiptError::Service {
                kind: RemoteErrorKind::Internal,
                message: format!("Failed to parse receipt: unexpected model response: {}", e),
            }
        })?;

        parsed
            .choices
            .and_then(|c| c.into_iter().next())
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| ReceiptError::Service {
                kind: RemoteErrorKind::Internal,
                message: "Failed to parse receipt: no response content from model".to_string(),
            })
    }

    /// Full remote-side extraction: model call then JSON decoding.
    pub async fn parse_base64(&self, image_base64: &str) -> Result<ExtractionCandidate, ReceiptError> {
        let content = self.complete(image_base64).await?;
        let candidate = parse_model_output(&content)?;
        info!(
            "Parsed receipt: seller={:?}, total={:?}, items={}",
            candidate.seller_name,
            candidate.total_amount,
            candidate.items.len()
        );
        Ok(candidate)
    }
}

/// Map a non-success model API response to the error taxonomy.
pub fn classify_api_error(status: StatusCode, message: &str) -> ReceiptError {
    let lower = message.to_lowercase();
    if status == StatusCode::UNAUTHORIZED || lower.contains("api key") {
        ReceiptError::Service {
            kind: RemoteErrorKind::FailedPrecondition,
            message: "OpenAI API key not configured.".to_string(),
        }
    } else if status == StatusCode::TOO_MANY_REQUESTS || lower.contains("quota") {
        ReceiptError::QuotaExceeded("OpenAI API quota exceeded.".to_string())
    } else {
        ReceiptError::Service {
            kind: RemoteErrorKind::Internal,
            message: format!("Failed to parse receipt: HTTP {}: {}", status.as_u16(), message),
        }
    }
}

#[async_trait]
impl ReceiptExtractor for VisionExtractor {
    fn name(&self) -> &str {
        "vision"
    }

    async fn extract(&self, image: &NormalizedImage) -> Result<ExtractionCandidate, ReceiptError> {
        self.parse_base64(&image.to_base64()).await
    }
}
