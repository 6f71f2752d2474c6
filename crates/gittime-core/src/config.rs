//! Pipeline configuration.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::{PipelineError, Result};
use crate::history::HistoryConfig;
use crate::narrator::NarratorConfig;
use crate::retry::RetryPolicy;

/// Tunables for one analysis session. Every section is optional in TOML.
///
/// ```toml
/// [history]
/// max_commits = 500
///
/// [narrator]
/// max_concurrent_summaries = 8
/// call_timeout_ms = 30000
///
/// [retry]
/// max_retries = 5
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub history: HistoryConfig,

    #[serde(default)]
    pub narrator: NarratorConfig,

    #[serde(default)]
    pub retry: RetryPolicy,
}

impl PipelineConfig {
    /// Load from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    /// Load from `path` if given, defaults otherwise.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| PipelineError::Config(format!("failed to parse config: {}", e)))
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| PipelineError::Config(format!("failed to serialize config: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[narrator]\nmax_concurrent_summaries = 8\n\n[retry]\nmax_retries = 1"
        )
        .unwrap();

        let config = PipelineConfig::load(file.path()).unwrap();
        assert_eq!(config.narrator.max_concurrent_summaries, 8);
        assert_eq!(config.narrator.input_budget, 6_000);
        assert_eq!(config.retry.max_retries, 1);
        assert_eq!(config.history, HistoryConfig::default());
    }

    #[test]
    fn test_roundtrip_and_errors() {
        let config = PipelineConfig::default();
        let text = config.to_toml().unwrap();
        assert_eq!(PipelineConfig::from_toml(&text).unwrap(), config);

        assert!(matches!(
            PipelineConfig::from_toml("[narrator]\ninput_budget = \"lots\""),
            Err(PipelineError::Config(_))
        ));
        assert!(matches!(
            PipelineConfig::load(Path::new("/nonexistent/gittime.toml")),
            Err(PipelineError::Config(_))
        ));
    }
}
