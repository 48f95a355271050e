//! Receipt extraction: turning a normalized image into an
//! [`ExtractionCandidate`].
//!
//! Two implementations sit behind [`ReceiptExtractor`]:
//! - [`CallableExtractionClient`]: the authenticated callable endpoint
//! - [`VisionExtractor`]: an OpenAI-compatible vision model, called directly
//!
//! Neither retries. Each call is one attempt whose outcome is either a
//! complete candidate or a classified [`ReceiptError`]. Repeated calls on the
//! same image may return different candidates.

mod callable;
mod config;
mod parse;
mod prompts;
mod vision;

use async_trait::async_trait;

pub use callable::{CallableError, CallableErrorBody, CallableExtractionClient, ParseReceiptRequest};
pub use config::{ExtractionConfig, ExtractionMode};
pub use parse::{parse_model_output, strip_code_fences, INVALID_JSON_MESSAGE};
pub use prompts::{DEFAULT_CONFIDENCE, SYSTEM_PROMPT, USER_PROMPT};
pub use vision::{classify_api_error, VisionExtractor};

use crate::error::ReceiptError;
use crate::imaging::NormalizedImage;
use crate::models::ExtractionCandidate;

/// Reads structured receipt fields out of an image.
#[async_trait]
pub trait ReceiptExtractor: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    async fn extract(&self, image: &NormalizedImage) -> Result<ExtractionCandidate, ReceiptError>;
}

/// Build the extractor selected by `config.mode`.
///
/// `token` is the caller's identity token, used by the callable mode.
pub fn build_extractor(
    config: &ExtractionConfig,
    token: Option<String>,
) -> Result<Box<dyn ReceiptExtractor>, ReceiptError> {
    match config.mode {
        ExtractionMode::Callable => Ok(Box::new(CallableExtractionClient::new(
            config.clone(),
            token,
        )?)),
        ExtractionMode::Direct => Ok(Box::new(VisionExtractor::new(config.clone())?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_extractor_by_mode() {
        let config = ExtractionConfig::base_default();
        let extractor = build_extractor(&config, Some("t".to_string())).unwrap();
        assert_eq!(extractor.name(), "callable");

        let config = config.with_mode(ExtractionMode::Direct);
        let extractor = build_extractor(&config, None).unwrap();
        assert_eq!(extractor.name(), "vision");
    }
}
