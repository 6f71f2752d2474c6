//! In-memory history of a single repository.
//!
//! The store loads commit metadata, tags and releases eagerly. File-level
//! diff detail is fetched lazily, only for commits that a feature's
//! path-filtered listings name as candidates, and memoized per commit so
//! overlapping features never refetch.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OnceCell, Semaphore};
use tracing::{debug, info, warn};

use crate::collaborators::{CommitQuery, HostingApi, RepoInfo};
use crate::domain::{
    ChangedFile, Commit, CommitId, CommitMeta, HostingResult, PipelineError, Release, RepoRef,
    Result, Tag,
};
use crate::metrics::METRICS;
use crate::retry::{call_upstream, RetryPolicy};
use crate::snapshot::RepoSnapshot;

/// Configuration for loading and hydrating history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HistoryConfig {
    /// Page size for commit listings.
    pub per_page: u32,
    /// Newest commits kept in the store's window.
    pub max_commits: usize,
    /// Maximum concurrent diff-detail fetches.
    pub max_concurrent_fetches: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            per_page: 100,
            max_commits: 300,
            max_concurrent_fetches: 4,
        }
    }
}

type DetailCell = Arc<OnceCell<Arc<Vec<ChangedFile>>>>;
type PathCell = Arc<OnceCell<Arc<Vec<CommitId>>>>;

/// Normalized, chronologically ordered view of a repository's history.
pub struct HistoryStore {
    repo: RepoRef,
    info: RepoInfo,
    /// Ascending by `(timestamp, id)`, unique by id.
    commits: Vec<CommitMeta>,
    index: HashMap<CommitId, usize>,
    tags: Vec<Tag>,
    releases: Vec<Release>,
    hosting: Arc<dyn HostingApi>,
    config: HistoryConfig,
    retry: RetryPolicy,
    details: Mutex<HashMap<CommitId, DetailCell>>,
    path_listings: Mutex<HashMap<String, PathCell>>,
    fetch_permits: Semaphore,
}

impl std::fmt::Debug for HistoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryStore")
            .field("repo", &self.repo)
            .field("commits", &self.commits.len())
            .field("tags", &self.tags.len())
            .field("releases", &self.releases.len())
            .finish()
    }
}

impl HistoryStore {
    /// Load commit metadata, tags and releases for `repo`.
    ///
    /// Fails with [`PipelineError::NotFound`] if the repository does not
    /// resolve, and [`PipelineError::UpstreamUnavailable`] once the retry
    /// budget is spent.
    pub async fn load(
        hosting: Arc<dyn HostingApi>,
        repo: RepoRef,
        config: HistoryConfig,
        retry: RetryPolicy,
    ) -> Result<Self> {
        info!(repo = %repo, "loading repository history");

        let info = upstream(&hosting, &retry, "repository", || hosting.repository(&repo)).await?;

        let per_page = config.per_page.max(1);
        let mut listed = Vec::new();
        let mut page = 1;
        loop {
            let query = CommitQuery::page(page, per_page);
            let batch = upstream(&hosting, &retry, "list_commits", || {
                hosting.list_commits(&repo, &query)
            })
            .await?;
            let last = batch.is_last(per_page);
            listed.extend(batch.commits);
            if last || listed.len() >= config.max_commits {
                break;
            }
            page += 1;
        }
        // Listings are newest-first; keep the newest window.
        listed.truncate(config.max_commits);

        let tags = tolerate(
            "tags",
            upstream(&hosting, &retry, "tags", || hosting.tags(&repo)).await,
        );
        let releases = tolerate(
            "releases",
            upstream(&hosting, &retry, "releases", || hosting.releases(&repo)).await,
        );

        let commits = normalize(listed);
        let index = commits
            .iter()
            .enumerate()
            .map(|(i, c)| (c.id.clone(), i))
            .collect();

        info!(
            repo = %repo,
            commits = commits.len(),
            tags = tags.len(),
            releases = releases.len(),
            "repository history loaded"
        );

        Ok(Self {
            repo,
            info,
            commits,
            index,
            tags,
            releases,
            hosting,
            fetch_permits: Semaphore::new(config.max_concurrent_fetches.max(1)),
            config,
            retry,
            details: Mutex::new(HashMap::new()),
            path_listings: Mutex::new(HashMap::new()),
        })
    }

    pub fn repo(&self) -> &RepoRef {
        &self.repo
    }

    pub fn info(&self) -> &RepoInfo {
        &self.info
    }

    /// All commits in the window, oldest first.
    pub fn commits(&self) -> &[CommitMeta] {
        &self.commits
    }

    pub fn commit(&self, id: &CommitId) -> Option<&CommitMeta> {
        self.index.get(id).map(|&i| &self.commits[i])
    }

    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    pub fn releases(&self) -> &[Release] {
        &self.releases
    }

    /// Collect README and tree for the classifier.
    ///
    /// Missing or failing README/tree fetches yield empty values.
    pub async fn snapshot(&self) -> RepoSnapshot {
        let hosting = &self.hosting;
        let readme = tolerate(
            "readme",
            upstream(hosting, &self.retry, "readme", || hosting.readme(&self.repo)).await,
        );
        let branch = self.info.default_branch.as_str();
        let tree = tolerate(
            "tree",
            upstream(hosting, &self.retry, "tree", || hosting.tree(&self.repo, branch)).await,
        );

        RepoSnapshot {
            repo: self.repo.clone(),
            description: self.info.description.clone(),
            readme,
            tree_paths: tree,
            commits: self.commits.clone(),
            releases: self.releases.clone(),
            tags: self.tags.clone(),
        }
    }

    /// Hydrated commits that may touch `files`, oldest first.
    ///
    /// Only commits named by the hosting API's path-filtered listings are
    /// hydrated; the relevance filter still applies the exact match.
    pub async fn history_for(&self, files: &BTreeSet<String>) -> Result<Vec<Commit>> {
        let candidates = self.candidates(files).await?;
        debug!(
            repo = %self.repo,
            files = files.len(),
            candidates = candidates.len(),
            "hydrating candidate commits"
        );
        self.hydrate(&candidates).await
    }

    /// Commit ids within the window touched by any path in `files`, oldest first.
    ///
    /// Path listings share the `max_concurrent_fetches` limit with diff fetches.
    pub async fn candidates(&self, files: &BTreeSet<String>) -> Result<Vec<CommitId>> {
        let listings = join_all(files.iter().map(|path| self.commits_touching(path))).await;

        let mut seen = HashSet::new();
        for listing in listings {
            for id in listing?.iter() {
                if self.index.contains_key(id) {
                    seen.insert(id.clone());
                }
            }
        }

        let mut ordered: Vec<CommitId> = seen.into_iter().collect();
        ordered.sort_by_key(|id| self.index.get(id).copied().unwrap_or(usize::MAX));
        Ok(ordered)
    }

    /// Fetch file-level detail for `ids`, preserving their order.
    ///
    /// Fetches run concurrently, bounded by `max_concurrent_fetches`.
    pub async fn hydrate(&self, ids: &[CommitId]) -> Result<Vec<Commit>> {
        let fetches = ids.iter().map(|id| async move {
            let meta = self
                .commit(id)
                .ok_or_else(|| PipelineError::NotFound(format!("commit {id}")))?;
            let files = self.changed_files(id).await?;
            Ok::<_, PipelineError>(Commit::new(meta.clone(), files.as_ref().clone()))
        });

        join_all(fetches).await.into_iter().collect()
    }

    /// File-level changes of one commit, fetched at most once per store.
    pub async fn changed_files(&self, id: &CommitId) -> Result<Arc<Vec<ChangedFile>>> {
        let cell = {
            let mut details = self.details.lock().await;
            Arc::clone(details.entry(id.clone()).or_default())
        };

        cell.get_or_try_init(|| async {
            let _permit = self
                .fetch_permits
                .acquire()
                .await
                .map_err(|e| PipelineError::Task(e.to_string()))?;
            METRICS.inc_diff_fetches();
            let hosting = &self.hosting;
            let files = upstream(hosting, &self.retry, "commit_diff", || {
                hosting.commit_diff(&self.repo, id)
            })
            .await?;
            Ok::<_, PipelineError>(Arc::new(files))
        })
        .await
        .cloned()
    }

    async fn commits_touching(&self, path: &str) -> Result<Arc<Vec<CommitId>>> {
        let cell = {
            let mut listings = self.path_listings.lock().await;
            Arc::clone(listings.entry(path.to_string()).or_default())
        };

        cell.get_or_try_init(|| async {
            let _permit = self
                .fetch_permits
                .acquire()
                .await
                .map_err(|e| PipelineError::Task(e.to_string()))?;
            let per_page = self.config.per_page.max(1);
            let hosting = &self.hosting;
            let mut ids = Vec::new();
            let mut page = 1;
            loop {
                let query = CommitQuery::for_path(path, page, per_page);
                let batch = upstream(hosting, &self.retry, "list_commits", || {
                    hosting.list_commits(&self.repo, &query)
                })
                .await?;
                let last = batch.is_last(per_page);
                ids.extend(batch.commits.into_iter().map(|c| c.id));
                if last || ids.len() >= self.config.max_commits {
                    break;
                }
                page += 1;
            }
            Ok::<_, PipelineError>(Arc::new(ids))
        })
        .await
        .cloned()
    }
}

async fn upstream<T, F, Fut>(
    hosting: &Arc<dyn HostingApi>,
    retry: &RetryPolicy,
    operation: &str,
    call: F,
) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = HostingResult<T>>,
{
    call_upstream(retry, operation, || hosting.rate_limit(), call).await
}

/// Auxiliary data is best-effort: log and continue with a default.
fn tolerate<T: Default>(what: &str, result: Result<T>) -> T {
    result.unwrap_or_else(|err| {
        warn!(resource = what, error = %err, "continuing without optional repository data");
        T::default()
    })
}

/// Deduplicate by id and sort ascending by `(timestamp, id)`.
fn normalize(mut commits: Vec<CommitMeta>) -> Vec<CommitMeta> {
    let mut seen = HashSet::new();
    commits.retain(|c| seen.insert(c.id.clone()));
    commits.sort_by(|a, b| a.chronological_cmp(b));
    commits
}
