//! Error taxonomy for the feature evolution pipeline.

use chrono::{DateTime, Utc};

/// Errors reported by a hosting API collaborator.
///
/// Quota exhaustion is kept distinct from not-found and transport failures so
/// the history store can back off instead of failing hard.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HostingError {
    #[error("not found: {resource}")]
    NotFound { resource: String },

    #[error("rate limit exhausted (resets at {reset_at:?})")]
    QuotaExhausted { reset_at: Option<DateTime<Utc>> },

    #[error("network error: {0}")]
    Network(String),

    #[error("unexpected status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("failed to decode response: {0}")]
    Decode(String),
}

impl HostingError {
    /// Whether retrying the same call can succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            HostingError::QuotaExhausted { .. } | HostingError::Network(_) => true,
            HostingError::Status { status, .. } => *status >= 500 || *status == 429,
            HostingError::NotFound { .. } | HostingError::Decode(_) => false,
        }
    }
}

/// Errors reported by the classifier and summarizer collaborators.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CollaboratorError {
    #[error("collaborator call failed: {0}")]
    Failed(String),

    #[error("collaborator returned unusable output: {0}")]
    InvalidOutput(String),
}

/// Errors surfaced to callers of the pipeline.
///
/// Classification failures and degraded summaries are not represented here:
/// the former is an empty [`crate::FeatureRegistry`], the latter a degraded
/// [`crate::EvolutionEntry`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PipelineError {
    #[error("upstream unavailable after {attempts} attempt(s): {reason}")]
    UpstreamUnavailable { attempts: u32, reason: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("feature not found: {0}")]
    FeatureNotFound(String),

    #[error("invalid repository reference: {0}")]
    InvalidRepositoryRef(String),

    #[error("feature {0} has no associated files")]
    EmptyFileSet(String),

    #[error("background task failed: {0}")]
    Task(String),

    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Result type for hosting collaborator calls.
pub type HostingResult<T> = std::result::Result<T, HostingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(HostingError::Network("reset".into()).is_retryable());
        assert!(HostingError::QuotaExhausted { reset_at: None }.is_retryable());
        assert!(HostingError::Status {
            status: 502,
            message: "bad gateway".into()
        }
        .is_retryable());
        assert!(!HostingError::Status {
            status: 403,
            message: "forbidden".into()
        }
        .is_retryable());
        assert!(!HostingError::NotFound {
            resource: "/repos/a/b".into()
        }
        .is_retryable());
        assert!(!HostingError::Decode("eof".into()).is_retryable());
    }

    #[test]
    fn test_pipeline_error_display() {
        let err = PipelineError::UpstreamUnavailable {
            attempts: 4,
            reason: "timeout".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("4 attempt"));
        assert!(msg.contains("timeout"));

        let err = PipelineError::EmptyFileSet("Dark Mode".into());
        assert!(err.to_string().contains("Dark Mode"));
    }
}
