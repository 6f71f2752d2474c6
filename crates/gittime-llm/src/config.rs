//! Chat-completions endpoint configuration

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Groq's OpenAI-compatible endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";
pub const API_KEY_ENV: &str = "GROQ_API_KEY";

/// LLM client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base URL; `/chat/completions` is appended
    pub base_url: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
    /// Output cap for classification responses
    pub classify_max_tokens: u32,
    /// Output cap for per-commit summaries
    pub summary_max_tokens: u32,
    /// Client-side request timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        LlmConfig {
            base_url: std::env::var("GITTIME_LLM_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            api_key: usable_key(std::env::var(API_KEY_ENV).ok()),
            model: std::env::var("GITTIME_LLM_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            temperature: 0.2,
            classify_max_tokens: 4096,
            summary_max_tokens: 400,
            timeout_ms: 120_000,
        }
    }
}

impl LlmConfig {
    /// Create a new config from environment variables
    pub fn from_env() -> Self {
        Self::default()
    }

    pub fn with_api_key(mut self, key: &str) -> Self {
        self.api_key = usable_key(Some(key.to_string()));
        self
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

/// Drop empty values and the `.env.example` placeholder.
fn usable_key(key: Option<String>) -> Option<String> {
    let key = key?.trim().to_string();
    if key.is_empty() {
        return None;
    }
    if key.starts_with("gsk_your") || key.starts_with("your_") {
        warn!("{API_KEY_ENV} is a placeholder value; treating it as unset");
        return None;
    }
    Some(key)
}
