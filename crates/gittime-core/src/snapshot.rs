//! Repository snapshot handed to the feature classifier.

use serde::{Deserialize, Serialize};

use crate::domain::{CommitMeta, Release, RepoRef, Tag};

/// Character cap for the README section.
pub const README_LIMIT: usize = 8_000;
/// Maximum number of tree paths rendered.
pub const TREE_LIMIT: usize = 500;
/// Character cap for the commit summary.
pub const COMMITS_LIMIT: usize = 6_000;
/// Character cap for the release summary.
pub const RELEASES_LIMIT: usize = 2_000;

const RELEASE_BODY_LIMIT: usize = 200;

/// Metadata the classifier sees: README, file tree, commits, releases.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepoSnapshot {
    pub repo: RepoRef,
    pub description: Option<String>,
    pub readme: String,
    pub tree_paths: Vec<String>,
    /// Oldest first.
    pub commits: Vec<CommitMeta>,
    pub releases: Vec<Release>,
    pub tags: Vec<Tag>,
}

impl RepoSnapshot {
    pub fn readme_excerpt(&self) -> &str {
        truncate_chars(&self.readme, README_LIMIT)
    }

    pub fn tree_listing(&self) -> String {
        self.tree_paths
            .iter()
            .take(TREE_LIMIT)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// `YYYY-MM-DD  short  headline`, newest first, capped.
    pub fn commits_summary(&self) -> String {
        let lines: Vec<String> = self
            .commits
            .iter()
            .rev()
            .map(|c| {
                format!(
                    "{}  {}  {}",
                    c.timestamp.format("%Y-%m-%d"),
                    c.id.short(),
                    c.headline()
                )
            })
            .collect();
        truncate_chars(&lines.join("\n"), COMMITS_LIMIT).to_string()
    }

    /// Releases if any, otherwise tags, otherwise a fixed notice.
    pub fn releases_summary(&self) -> String {
        let lines: Vec<String> = if !self.releases.is_empty() {
            self.releases
                .iter()
                .map(|r| {
                    let date = r
                        .published_at
                        .map(|d| d.format("%Y-%m-%d").to_string())
                        .unwrap_or_default();
                    format!(
                        "{}  {}  {}",
                        date,
                        r.tag_name,
                        truncate_chars(&r.body, RELEASE_BODY_LIMIT)
                    )
                })
                .collect()
        } else {
            self.tags
                .iter()
                .map(|t| format!("tag: {}  sha: {}", t.name, t.commit.short()))
                .collect()
        };

        if lines.is_empty() {
            return "No releases or tags found.".to_string();
        }
        truncate_chars(&lines.join("\n"), RELEASES_LIMIT).to_string()
    }
}

/// Prefix of `s` holding at most `max` characters.
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
