//! Collaborator trait definitions for GitTime
//!
//! These traits define the external capabilities the pipeline consumes:
//! - `HostingApi`: commit, diff, tag and release retrieval
//! - `FeatureClassifier`: turns a repository snapshot into features
//! - `Summarizer`: explains one commit's effect on one feature
//!
//! All traits are async and backend-agnostic. In-memory fakes are provided
//! for testing via the `fakes` module.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{
    ChangedFile, CollaboratorError, CommitId, CommitMeta, FeatureCandidate, HostingResult,
    Release, RepoRef, Tag,
};
use crate::narrator::CommitContext;
use crate::snapshot::RepoSnapshot;

// ---------------------------------------------------------------------------
// HostingApi: repository history retrieval
// ---------------------------------------------------------------------------

/// Repository-level metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoInfo {
    pub default_branch: String,
    pub description: Option<String>,
}

/// One page of a commit listing, optionally restricted to a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitQuery {
    pub path: Option<String>,
    /// 1-based page number.
    pub page: u32,
    pub per_page: u32,
}

impl CommitQuery {
    pub fn page(page: u32, per_page: u32) -> Self {
        Self {
            path: None,
            page,
            per_page,
        }
    }

    pub fn for_path(path: &str, page: u32, per_page: u32) -> Self {
        Self {
            path: Some(path.to_string()),
            page,
            per_page,
        }
    }
}

/// One page of a commit listing.
///
/// `listed` counts every entry the backend returned, including any it could
/// not map into [`CommitMeta`]. Paging stops on `listed`, never on
/// `commits.len()`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitPage {
    pub commits: Vec<CommitMeta>,
    pub listed: usize,
}

impl CommitPage {
    pub fn is_last(&self, per_page: u32) -> bool {
        self.listed < per_page as usize
    }
}

/// Last-seen quota signal from the hosting API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimit {
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
}

/// Read access to a hosted repository's history.
///
/// Implementations must report quota exhaustion as
/// [`HostingError::QuotaExhausted`](crate::HostingError::QuotaExhausted),
/// never as a generic status error.
#[async_trait]
pub trait HostingApi: Send + Sync {
    /// Resolve the repository; `NotFound` if it does not exist or is private.
    async fn repository(&self, repo: &RepoRef) -> HostingResult<RepoInfo>;

    /// List commits newest-first, one page at a time.
    async fn list_commits(
        &self,
        repo: &RepoRef,
        query: &CommitQuery,
    ) -> HostingResult<CommitPage>;

    /// File-level changes of a single commit.
    async fn commit_diff(&self, repo: &RepoRef, sha: &CommitId)
        -> HostingResult<Vec<ChangedFile>>;

    async fn tags(&self, repo: &RepoRef) -> HostingResult<Vec<Tag>>;

    async fn releases(&self, repo: &RepoRef) -> HostingResult<Vec<Release>>;

    /// README text; empty when the repository has none.
    async fn readme(&self, repo: &RepoRef) -> HostingResult<String>;

    /// Blob paths of the tree at `branch`.
    async fn tree(&self, repo: &RepoRef, branch: &str) -> HostingResult<Vec<String>>;

    /// Most recent quota signal, if the backend exposes one.
    fn rate_limit(&self) -> Option<RateLimit> {
        None
    }
}

// ---------------------------------------------------------------------------
// FeatureClassifier
// ---------------------------------------------------------------------------

/// Identifies features from repository metadata.
///
/// Output may differ between calls for the same repository; callers must not
/// assume stable results across classifications.
#[async_trait]
pub trait FeatureClassifier: Send + Sync {
    async fn classify(
        &self,
        snapshot: &RepoSnapshot,
    ) -> Result<Vec<FeatureCandidate>, CollaboratorError>;
}

// ---------------------------------------------------------------------------
// Summarizer
// ---------------------------------------------------------------------------

/// Produces a short narrative for one commit's effect on a feature.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, context: &CommitContext) -> Result<String, CollaboratorError>;
}
