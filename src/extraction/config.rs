//! Extraction client configuration.

use serde::{Deserialize, Serialize};

/// Where extraction requests are sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMode {
    /// Authenticated callable endpoint (`receipts serve`), default.
    #[default]
    Callable,
    /// Straight to an OpenAI-compatible vision model.
    Direct,
}

impl ExtractionMode {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "callable" | "remote" => Some(Self::Callable),
            "direct" | "openai" => Some(Self::Direct),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Callable => "callable",
            Self::Direct => "direct",
        }
    }
}

/// Configuration for receipt extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Callable endpoint or direct model access
    #[serde(default)]
    pub mode: ExtractionMode,
    /// Base URL of the callable endpoint
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Base URL of the OpenAI-compatible model API
    #[serde(default = "default_model_endpoint")]
    pub model_endpoint: String,
    /// API key for the model API
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Vision model name
    #[serde(default = "default_model")]
    pub model: String,
    /// Maximum tokens in the model response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_endpoint() -> String {
    "http://127.0.0.1:3030".to_string()
}

fn default_model_endpoint() -> String {
    "https://api.openai.com".to_string()
}

fn default_model() -> String {
    "gpt-4o".to_string()
}

fn default_max_tokens() -> u32 {
    1500
}

fn default_temperature() -> f32 {
    0.1
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self::base_default().with_env_overrides()
    }
}

impl ExtractionConfig {
    /// Base default without env overrides.
    pub fn base_default() -> Self {
        Self {
            mode: ExtractionMode::default(),
            endpoint: default_endpoint(),
            model_endpoint: default_model_endpoint(),
            api_key: None,
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_timeout_secs(),
        }
    }

    /// Check if the config equals the default (for skip_serializing_if).
    pub fn is_default(&self) -> bool {
        *self == Self::base_default()
    }

    /// Apply environment variable overrides.
    ///
    /// Supported env vars:
    /// - `RECEIPT_EXTRACTION_MODE`: "callable" (default) or "direct"
    /// - `RECEIPT_ENDPOINT`: callable endpoint base URL
    /// - `RECEIPT_MODEL_ENDPOINT`: OpenAI-compatible base URL
    /// - `RECEIPT_API_KEY`, then `OPENAI_API_KEY`: model API key
    /// - `RECEIPT_MODEL`: model name
    /// - `RECEIPT_MAX_TOKENS`: maximum response tokens
    /// - `RECEIPT_TEMPERATURE`: sampling temperature
    /// - `RECEIPT_TIMEOUT_SECS`: request timeout
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(val) = std::env::var("RECEIPT_EXTRACTION_MODE") {
            if let Some(mode) = ExtractionMode::from_str(&val) {
                self.mode = mode;
            }
        }
        if let Ok(val) = std::env::var("RECEIPT_ENDPOINT") {
            self.endpoint = val;
        }
        if let Ok(val) = std::env::var("RECEIPT_MODEL_ENDPOINT") {
            self.model_endpoint = val;
        }
        if let Ok(val) = std::env::var("RECEIPT_API_KEY") {
            self.api_key = Some(val);
        } else if self.api_key.is_none() {
            self.api_key = std::env::var("OPENAI_API_KEY").ok();
        }
        if let Ok(val) = std::env::var("RECEIPT_MODEL") {
            self.model = val;
        }
        if let Ok(val) = std::env::var("RECEIPT_MAX_TOKENS") {
            if let Ok(n) = val.parse() {
                self.max_tokens = n;
            }
        }
        if let Ok(val) = std::env::var("RECEIPT_TEMPERATURE") {
            if let Ok(t) = val.parse() {
                self.temperature = t;
            }
        }
        if let Ok(val) = std::env::var("RECEIPT_TIMEOUT_SECS") {
            if let Ok(n) = val.parse() {
                self.timeout_secs = n;
            }
        }
        self
    }

    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.to_string();
        self
    }

    pub fn with_model_endpoint(mut self, endpoint: &str) -> Self {
        self.model_endpoint = endpoint.to_string();
        self
    }

    pub fn with_api_key(mut self, api_key: &str) -> Self {
        self.api_key = Some(api_key.to_string());
        self
    }

    pub fn with_mode(mut self, mode: ExtractionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_secs)
    }
}
