//! GitHub client configuration

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Default public API endpoint.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// GitHub client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubConfig {
    /// REST API base URL (GitHub Enterprise installs differ)
    pub api_url: String,
    /// Personal access token (optional for public repositories)
    #[serde(skip_serializing)]
    pub token: Option<String>,
    /// Client-side request timeout in milliseconds
    pub timeout_ms: u64,
    pub user_agent: String,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        GitHubConfig {
            api_url: std::env::var("GITHUB_API_URL")
                .unwrap_or_else(|_| DEFAULT_API_URL.to_string()),
            token: usable_token(std::env::var("GITHUB_TOKEN").ok()),
            timeout_ms: 30_000,
            user_agent: format!("gittime/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl GitHubConfig {
    /// Create a new config from environment variables
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Create config for a specific API endpoint, without a token
    pub fn new(api_url: &str) -> Self {
        GitHubConfig {
            api_url: api_url.trim_end_matches('/').to_string(),
            token: None,
            timeout_ms: 30_000,
            user_agent: format!("gittime/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Set authentication token
    pub fn with_token(mut self, token: &str) -> Self {
        self.token = usable_token(Some(token.to_string()));
        self
    }
}

/// Drop empty values and the `.env.example` placeholder.
fn usable_token(token: Option<String>) -> Option<String> {
    let token = token?.trim().to_string();
    if token.is_empty() {
        return None;
    }
    if token.starts_with("ghp_your") || token.starts_with("your_") {
        warn!("GITHUB_TOKEN is a placeholder; continuing unauthenticated (60 requests/hour)");
        return None;
    }
    Some(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_token_is_ignored() {
        assert_eq!(usable_token(Some("ghp_your_token_here".into())), None);
        assert_eq!(usable_token(Some("   ".into())), None);
        assert_eq!(usable_token(None), None);
        assert_eq!(
            usable_token(Some(" ghp_abc123 ".into())),
            Some("ghp_abc123".to_string())
        );
    }

    #[test]
    fn test_new_trims_trailing_slash() {
        let config = GitHubConfig::new("https://ghe.example.com/api/v3/").with_token("t0k");
        assert_eq!(config.api_url, "https://ghe.example.com/api/v3");
        assert_eq!(config.token.as_deref(), Some("t0k"));
    }
}
