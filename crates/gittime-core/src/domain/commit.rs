//! Commits, changed files, tags and releases.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Full content hash of a commit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommitId(pub String);

impl CommitId {
    pub fn new(sha: impl Into<String>) -> Self {
        CommitId(sha.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form (first 7 chars).
    pub fn short(&self) -> &str {
        let end = self
            .0
            .char_indices()
            .nth(7)
            .map(|(i, _)| i)
            .unwrap_or(self.0.len());
        &self.0[..end]
    }
}

impl fmt::Display for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Commit metadata as returned by the hosting API's commit listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitMeta {
    pub id: CommitId,
    pub author: String,
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

impl CommitMeta {
    /// First line of the commit message.
    pub fn headline(&self) -> &str {
        self.message.lines().next().unwrap_or_default()
    }

    /// Chronological ordering key; ties broken by id.
    pub fn chronological_cmp(&self, other: &CommitMeta) -> Ordering {
        self.timestamp
            .cmp(&other.timestamp)
            .then_with(|| self.id.cmp(&other.id))
    }
}

/// How a file changed in a commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Added,
    Modified,
    Removed,
    Renamed,
}

impl FileStatus {
    /// Normalize a hosting-service status string.
    ///
    /// `copied` counts as added; `changed` and `unchanged` as modified.
    pub fn from_hosting(status: &str) -> Self {
        match status {
            "added" | "copied" => FileStatus::Added,
            "removed" | "deleted" => FileStatus::Removed,
            "renamed" => FileStatus::Renamed,
            _ => FileStatus::Modified,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileStatus::Added => "added",
            FileStatus::Modified => "modified",
            FileStatus::Removed => "removed",
            FileStatus::Renamed => "renamed",
        }
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One file touched by a commit, with its diff stat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangedFile {
    pub path: String,
    /// Source path when `status` is [`FileStatus::Renamed`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_path: Option<String>,
    pub status: FileStatus,
    pub additions: u64,
    pub deletions: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch: Option<String>,
}

impl ChangedFile {
    pub fn new(path: impl Into<String>, status: FileStatus, additions: u64, deletions: u64) -> Self {
        Self {
            path: path.into(),
            previous_path: None,
            status,
            additions,
            deletions,
            patch: None,
        }
    }

    pub fn renamed_from(mut self, previous: impl Into<String>) -> Self {
        self.previous_path = Some(previous.into());
        self
    }

    pub fn with_patch(mut self, patch: impl Into<String>) -> Self {
        self.patch = Some(patch.into());
        self
    }

    /// Exact-string match against a file set.
    ///
    /// A rename matches on either side, so a file renamed out of the set is
    /// still relevant at the rename commit.
    pub fn touches(&self, files: &BTreeSet<String>) -> bool {
        files.contains(&self.path)
            || self
                .previous_path
                .as_ref()
                .is_some_and(|prev| files.contains(prev))
    }

    pub fn churn(&self) -> u64 {
        self.additions + self.deletions
    }
}

/// A commit hydrated with its file-level changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    #[serde(flatten)]
    pub meta: CommitMeta,
    pub files: Vec<ChangedFile>,
}

impl Commit {
    pub fn new(meta: CommitMeta, files: Vec<ChangedFile>) -> Self {
        Self { meta, files }
    }

    pub fn id(&self) -> &CommitId {
        &self.meta.id
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.meta.timestamp
    }
}

/// A lightweight tag pointing at a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    pub commit: CommitId,
}

/// A published release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    pub tag_name: String,
    pub name: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub body: String,
}
