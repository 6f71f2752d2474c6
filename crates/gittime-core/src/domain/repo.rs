//! Repository references.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::PipelineError;

/// Identifies a public repository on the hosting service as `owner/name`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    /// Parse `owner/repo`, `github.com/owner/repo` or a full GitHub URL.
    ///
    /// Trailing slashes, a `.git` suffix and any path after the repository
    /// name are ignored.
    pub fn parse(input: &str) -> Result<Self, PipelineError> {
        let trimmed = input.trim().trim_end_matches('/');
        let invalid = || PipelineError::InvalidRepositoryRef(input.trim().to_string());

        let path = match trimmed.find("github.com/") {
            Some(pos) => &trimmed[pos + "github.com/".len()..],
            None if trimmed.contains("://") => return Err(invalid()),
            None => {
                if trimmed.split('/').count() != 2 {
                    return Err(invalid());
                }
                trimmed
            }
        };

        let mut parts = path.split('/');
        let owner = parts.next().unwrap_or_default();
        let name = parts.next().unwrap_or_default();
        let name = name.strip_suffix(".git").unwrap_or(name);

        if !is_valid_segment(owner) || !is_valid_segment(name) {
            return Err(invalid());
        }

        Ok(Self::new(owner, name))
    }
}

fn is_valid_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}

impl FromStr for RepoRef {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_short_form() {
        let repo = RepoRef::parse("tokio-rs/axum").unwrap();
        assert_eq!(repo, RepoRef::new("tokio-rs", "axum"));
        assert_eq!(repo.to_string(), "tokio-rs/axum");
    }

    #[test]
    fn test_parse_urls() {
        for input in [
            "https://github.com/tokio-rs/axum",
            "https://github.com/tokio-rs/axum/",
            "https://github.com/tokio-rs/axum.git",
            "  github.com/tokio-rs/axum/tree/main/examples ",
            "http://www.github.com/tokio-rs/axum",
        ] {
            let repo = RepoRef::parse(input).unwrap();
            assert_eq!(repo, RepoRef::new("tokio-rs", "axum"), "input: {input}");
        }
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for input in [
            "",
            "axum",
            "a/b/c",
            "https://gitlab.com/a/b",
            "github.com/only-owner",
            "owner/re po",
        ] {
            assert!(
                matches!(
                    RepoRef::parse(input),
                    Err(PipelineError::InvalidRepositoryRef(_))
                ),
                "input should be rejected: {input:?}"
            );
        }
    }
}
