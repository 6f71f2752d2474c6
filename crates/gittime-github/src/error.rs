//! Error types for gittime-github

use chrono::{DateTime, Utc};
use gittime_core::HostingError;
use thiserror::Error;

/// Errors that can occur talking to the GitHub REST API
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GitHubError {
    /// Transport failure (DNS, TLS, connection reset, timeout)
    #[error("HTTP error: {0}")]
    Http(String),

    /// Resource does not exist or is not visible
    #[error("404 Not Found: {0}")]
    NotFound(String),

    /// Quota exhausted, or a secondary limit asked for a pause
    #[error("rate limit exhausted (resets at {reset_at:?})")]
    RateLimited { reset_at: Option<DateTime<Utc>> },

    /// Any other non-success response
    #[error("{status}: {message}")]
    Status { status: u16, message: String },

    /// Response body did not match the expected shape
    #[error("JSON parsing error: {0}")]
    Decode(String),

    /// Client could not be constructed
    #[error("invalid client configuration: {0}")]
    Config(String),
}

impl From<reqwest::Error> for GitHubError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            GitHubError::Decode(err.to_string())
        } else {
            GitHubError::Http(err.to_string())
        }
    }
}

impl From<serde_json::Error> for GitHubError {
    fn from(err: serde_json::Error) -> Self {
        GitHubError::Decode(err.to_string())
    }
}

impl From<GitHubError> for HostingError {
    fn from(err: GitHubError) -> Self {
        match err {
            GitHubError::NotFound(resource) => HostingError::NotFound { resource },
            GitHubError::RateLimited { reset_at } => HostingError::QuotaExhausted { reset_at },
            GitHubError::Http(msg) | GitHubError::Config(msg) => HostingError::Network(msg),
            GitHubError::Status { status, message } => HostingError::Status { status, message },
            GitHubError::Decode(msg) => HostingError::Decode(msg),
        }
    }
}

/// Result type for GitHub operations
pub type Result<T> = std::result::Result<T, GitHubError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_maps_to_quota_exhausted() {
        let hosting: HostingError = GitHubError::RateLimited { reset_at: None }.into();
        assert_eq!(hosting, HostingError::QuotaExhausted { reset_at: None });
        assert!(hosting.is_retryable());
    }

    #[test]
    fn test_forbidden_is_not_retryable() {
        let hosting: HostingError = GitHubError::Status {
            status: 403,
            message: "Resource not accessible by integration".into(),
        }
        .into();
        assert!(!hosting.is_retryable());

        let hosting: HostingError = GitHubError::NotFound("/repos/a/b".into()).into();
        assert!(matches!(hosting, HostingError::NotFound { .. }));
    }
}
