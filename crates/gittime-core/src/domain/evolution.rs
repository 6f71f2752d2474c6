//! Evolution records handed to the presentation layer.

use serde::{Deserialize, Serialize};

use super::commit::{CommitId, CommitMeta, FileStatus};
use super::feature::FeatureId;

/// Narrative used when the summarizer fails or times out.
pub const SUMMARY_UNAVAILABLE: &str = "summary unavailable";

/// Per-file diff statistics, restricted to a feature's files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStat {
    pub path: String,
    pub status: FileStatus,
    pub additions: u64,
    pub deletions: u64,
}

/// Feature-restricted diff statistics for one commit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffStat {
    pub per_file: Vec<FileStat>,
    pub total_additions: u64,
    pub total_deletions: u64,
}

/// One commit's contribution to a feature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvolutionEntry {
    pub commit: CommitMeta,
    pub diff: DiffStat,
    pub narrative: String,
    /// `true` when `narrative` is the fallback placeholder.
    pub degraded: bool,
}

impl EvolutionEntry {
    pub fn short_id(&self) -> &str {
        self.commit.id.short()
    }

    /// Commit date as `YYYY-MM-DD`.
    pub fn date(&self) -> String {
        self.commit.timestamp.format("%Y-%m-%d").to_string()
    }
}

/// Chronological evolution of a single feature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureEvolution {
    pub feature_id: FeatureId,
    pub entries: Vec<EvolutionEntry>,
    pub total_additions: u64,
    pub total_deletions: u64,
}

impl FeatureEvolution {
    /// Build from entries, enforcing oldest-to-newest order.
    pub fn new(feature_id: FeatureId, mut entries: Vec<EvolutionEntry>) -> Self {
        entries.sort_by(|a, b| a.commit.chronological_cmp(&b.commit));
        let total_additions = entries.iter().map(|e| e.diff.total_additions).sum();
        let total_deletions = entries.iter().map(|e| e.diff.total_deletions).sum();
        Self {
            feature_id,
            entries,
            total_additions,
            total_deletions,
        }
    }

    pub fn commit_count(&self) -> usize {
        self.entries.len()
    }

    pub fn degraded_count(&self) -> usize {
        self.entries.iter().filter(|e| e.degraded).count()
    }
}

/// A release-level grouping of evolution entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionEntry {
    /// Release or tag name, or a short SHA for unreleased commits.
    pub version: String,
    /// `YYYY-MM-DD`.
    pub date: String,
    pub description: String,
    pub commits: Vec<CommitId>,
}
