//! Decoding model output into an [`ExtractionCandidate`].

use std::sync::OnceLock;

use regex::Regex;
use tracing::error;

use super::prompts::DEFAULT_CONFIDENCE;
use crate::error::ReceiptError;
use crate::models::ExtractionCandidate;

/// Message used when the model reply is not JSON.
pub const INVALID_JSON_MESSAGE: &str = "Received invalid JSON format from model.";

fn fence_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"```(?:json|JSON)?[ \t]*\r?\n?").expect("valid regex"))
}

/// Remove markdown code fences the model may wrap its JSON in.
pub fn strip_code_fences(content: &str) -> String {
    let trimmed = content.trim();
    if !trimmed.contains("```") {
        return trimmed.to_string();
    }
    fence_regex().replace_all(trimmed, "").trim().to_string()
}

/// Decode the model's reply. `raw_text` and `confidence` are filled in here.
pub fn parse_model_output(content: &str) -> Result<ExtractionCandidate, ReceiptError> {
    let json = strip_code_fences(content);

    let value: serde_json::Value = serde_json::from_str(&json).map_err(|e| {
        error!("Failed to parse JSON from model response: {}", json);
        ReceiptError::Parsing {
            message: format!("{} ({})", INVALID_JSON_MESSAGE, e),
            raw_text: content.to_string(),
        }
    })?;

    if !value.is_object() {
        error!("Model response is not a JSON object: {}", json);
        return Err(ReceiptError::Parsing {
            message: format!("{} (expected an object)", INVALID_JSON_MESSAGE),
            raw_text: content.to_string(),
        });
    }

    let mut candidate: ExtractionCandidate =
        serde_json::from_value(value).map_err(|e| {
            error!("Model response does not match receipt schema: {}", json);
            ReceiptError::Parsing {
                message: format!("{} ({})", INVALID_JSON_MESSAGE, e),
                raw_text: content.to_string(),
            }
        })?;

    candidate.raw_text = content.to_string();
    candidate.confidence = DEFAULT_CONFIDENCE;
    Ok(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_plain_json() {
        assert_eq!(strip_code_fences("  {\"a\": 1}\n"), "{\"a\": 1}");
    }

    #[test]
    fn test_strip_json_fence() {
        let content = "```json\n{\"sellerName\": \"IKEA\"}\n```";
        assert_eq!(strip_code_fences(content), "{\"sellerName\": \"IKEA\"}");
    }

    #[test]
    fn test_strip_bare_fence() {
        let content = "```\n{\"items\": []}\n```\n";
        assert_eq!(strip_code_fences(content), "{\"items\": []}");
    }

    #[test]
    fn test_parse_sets_raw_text_and_confidence() {
        let content = "```json\n{\"sellerName\": \"Rema 1000\", \"totalAmount\": 99.9, \"items\": []}\n```";
        let candidate = parse_model_output(content).unwrap();
        assert_eq!(candidate.seller_name.as_deref(), Some("Rema 1000"));
        assert_eq!(candidate.total_amount, Some(99.9));
        assert_eq!(candidate.raw_text, content);
        assert!((candidate.confidence - 0.9).abs() < f64::EPSILON);
    }

    #[test]
    fn test_parse_failure_keeps_raw_text() {
        let content = "Sorry, I cannot read this receipt.";
        match parse_model_output(content) {
            Err(ReceiptError::Parsing { message, raw_text }) => {
                assert!(message.contains("invalid JSON"));
                assert_eq!(raw_text, content);
            }
            other => panic!("expected parsing error, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_rejects_non_object() {
        assert!(matches!(
            parse_model_output("[1, 2, 3]"),
            Err(ReceiptError::Parsing { .. })
        ));
    }
}
