//! Error types for gittime-llm

use gittime_core::CollaboratorError;
use thiserror::Error;

/// Errors from the chat-completions transport and response parsing
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    /// No usable API key in the environment
    #[error("missing API key: set {env_var}")]
    MissingApiKey { env_var: String },

    /// Transport failure
    #[error("request failed: {0}")]
    Request(String),

    /// Non-success HTTP status
    #[error("API error ({status}): {message}")]
    Status { status: u16, message: String },

    /// Response did not contain what was asked for
    #[error("failed to parse model output: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            LlmError::Parse(err.to_string())
        } else {
            LlmError::Request(err.to_string())
        }
    }
}

impl From<LlmError> for CollaboratorError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::Parse(msg) => CollaboratorError::InvalidOutput(msg),
            other => CollaboratorError::Failed(other.to_string()),
        }
    }
}

/// Result type for LLM operations
pub type Result<T> = std::result::Result<T, LlmError>;
