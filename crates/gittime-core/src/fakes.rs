//! In-memory fakes for collaborator traits (testing only)
//!
//! Provides `MemoryHosting`, `ScriptedClassifier`, and `ScriptedSummarizer`
//! that satisfy the trait contracts without any network access.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use crate::collaborators::*;
use crate::domain::{
    ChangedFile, CollaboratorError, Commit, CommitId, CommitMeta, FeatureCandidate, HostingError,
    HostingResult, Release, RepoRef, Tag,
};
use crate::narrator::CommitContext;
use crate::snapshot::RepoSnapshot;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ---------------------------------------------------------------------------
// MemoryHosting
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct HostedRepo {
    info: Option<RepoInfo>,
    commits: Vec<Commit>,
    tags: Vec<Tag>,
    releases: Vec<Release>,
    readme: String,
    tree: Vec<String>,
    unmappable: Vec<CommitId>,
}

#[derive(Debug)]
struct Injected {
    remaining: usize,
    error: HostingError,
}

/// In-memory hosting service for a single repository.
///
/// Commit listings are newest-first and honour `CommitQuery::path` the way
/// the real API does (path or rename source). Failures can be injected per
/// operation name (`"list_commits"`, `"commit_diff"`, ...).
#[derive(Debug)]
pub struct MemoryHosting {
    repo: RepoRef,
    state: Mutex<HostedRepo>,
    failures: Mutex<HashMap<&'static str, Injected>>,
    calls: Mutex<HashMap<&'static str, usize>>,
    rate_limit: Mutex<Option<RateLimit>>,
    listing_latency: Option<Duration>,
    listings_in_flight: AtomicUsize,
    peak_listings: AtomicUsize,
}

impl MemoryHosting {
    pub fn new(repo: RepoRef) -> Self {
        Self {
            repo,
            state: Mutex::new(HostedRepo {
                info: Some(RepoInfo {
                    default_branch: "main".into(),
                    description: None,
                }),
                ..Default::default()
            }),
            failures: Mutex::new(HashMap::new()),
            calls: Mutex::new(HashMap::new()),
            rate_limit: Mutex::new(None),
            listing_latency: None,
            listings_in_flight: AtomicUsize::new(0),
            peak_listings: AtomicUsize::new(0),
        }
    }

    pub fn with_commits(self, commits: impl IntoIterator<Item = Commit>) -> Self {
        lock(&self.state).commits.extend(commits);
        self
    }

    pub fn with_tags(self, tags: Vec<Tag>) -> Self {
        lock(&self.state).tags = tags;
        self
    }

    pub fn with_releases(self, releases: Vec<Release>) -> Self {
        lock(&self.state).releases = releases;
        self
    }

    pub fn with_readme(self, readme: &str) -> Self {
        lock(&self.state).readme = readme.to_string();
        self
    }

    pub fn with_tree(self, paths: &[&str]) -> Self {
        lock(&self.state).tree = paths.iter().map(|p| p.to_string()).collect();
        self
    }

    /// Keep `sha` in listings' page counts but out of their results, like
    /// an entry the backend cannot map.
    pub fn unmappable(self, sha: &str) -> Self {
        lock(&self.state).unmappable.push(CommitId::new(sha));
        self
    }

    /// Hold every commit listing open for `latency`.
    pub fn with_listing_latency(mut self, latency: Duration) -> Self {
        self.listing_latency = Some(latency);
        self
    }

    /// Highest number of commit listings served at once.
    pub fn peak_listings(&self) -> usize {
        self.peak_listings.load(Ordering::SeqCst)
    }

    /// Make the repository resolve as not found.
    pub fn missing(self) -> Self {
        lock(&self.state).info = None;
        self
    }

    /// Fail the next `times` calls to `operation` with `error`.
    pub fn fail(&self, operation: &'static str, times: usize, error: HostingError) {
        lock(&self.failures).insert(
            operation,
            Injected {
                remaining: times,
                error,
            },
        );
    }

    pub fn set_rate_limit(&self, limit: Option<RateLimit>) {
        *lock(&self.rate_limit) = limit;
    }

    /// Number of calls made to `operation`, including failed ones.
    pub fn calls(&self, operation: &str) -> usize {
        lock(&self.calls).get(operation).copied().unwrap_or(0)
    }

    fn enter(&self, operation: &'static str, repo: &RepoRef) -> HostingResult<()> {
        *lock(&self.calls).entry(operation).or_default() += 1;

        let mut failures = lock(&self.failures);
        if let Some(injected) = failures.get_mut(operation) {
            if injected.remaining > 0 {
                injected.remaining -= 1;
                return Err(injected.error.clone());
            }
        }

        if repo != &self.repo || lock(&self.state).info.is_none() {
            return Err(HostingError::NotFound {
                resource: format!("repos/{repo}"),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl HostingApi for MemoryHosting {
    async fn repository(&self, repo: &RepoRef) -> HostingResult<RepoInfo> {
        self.enter("repository", repo)?;
        lock(&self.state)
            .info
            .clone()
            .ok_or_else(|| HostingError::NotFound {
                resource: format!("repos/{repo}"),
            })
    }

    async fn list_commits(
        &self,
        repo: &RepoRef,
        query: &CommitQuery,
    ) -> HostingResult<CommitPage> {
        self.enter("list_commits", repo)?;
        let now = self.listings_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_listings.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.listings_in_flight);
        if let Some(latency) = self.listing_latency {
            tokio::time::sleep(latency).await;
        }

        let state = lock(&self.state);

        let mut matching: Vec<&Commit> = state
            .commits
            .iter()
            .filter(|c| match &query.path {
                Some(path) => c
                    .files
                    .iter()
                    .any(|f| &f.path == path || f.previous_path.as_ref() == Some(path)),
                None => true,
            })
            .collect();
        matching.sort_by(|a, b| b.meta.chronological_cmp(&a.meta));

        let per_page = query.per_page.max(1) as usize;
        let skip = (query.page.max(1) as usize - 1) * per_page;
        let page: Vec<&Commit> = matching.into_iter().skip(skip).take(per_page).collect();
        Ok(CommitPage {
            listed: page.len(),
            commits: page
                .into_iter()
                .filter(|c| !state.unmappable.contains(c.id()))
                .map(|c| c.meta.clone())
                .collect(),
        })
    }

    async fn commit_diff(&self, repo: &RepoRef, sha: &CommitId) -> HostingResult<Vec<ChangedFile>> {
        self.enter("commit_diff", repo)?;
        lock(&self.state)
            .commits
            .iter()
            .find(|c| c.id() == sha)
            .map(|c| c.files.clone())
            .ok_or_else(|| HostingError::NotFound {
                resource: format!("commits/{sha}"),
            })
    }

    async fn tags(&self, repo: &RepoRef) -> HostingResult<Vec<Tag>> {
        self.enter("tags", repo)?;
        Ok(lock(&self.state).tags.clone())
    }

    async fn releases(&self, repo: &RepoRef) -> HostingResult<Vec<Release>> {
        self.enter("releases", repo)?;
        Ok(lock(&self.state).releases.clone())
    }

    async fn readme(&self, repo: &RepoRef) -> HostingResult<String> {
        self.enter("readme", repo)?;
        Ok(lock(&self.state).readme.clone())
    }

    async fn tree(&self, repo: &RepoRef, _branch: &str) -> HostingResult<Vec<String>> {
        self.enter("tree", repo)?;
        Ok(lock(&self.state).tree.clone())
    }

    fn rate_limit(&self) -> Option<RateLimit> {
        *lock(&self.rate_limit)
    }
}

// ---------------------------------------------------------------------------
// ScriptedClassifier
// ---------------------------------------------------------------------------

/// Classifier returning a fixed candidate list, or a fixed error.
#[derive(Debug)]
pub struct ScriptedClassifier {
    outcome: Result<Vec<FeatureCandidate>, CollaboratorError>,
    calls: AtomicUsize,
}

impl ScriptedClassifier {
    pub fn new(candidates: Vec<FeatureCandidate>) -> Self {
        Self {
            outcome: Ok(candidates),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            outcome: Err(CollaboratorError::Failed(reason.to_string())),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FeatureClassifier for ScriptedClassifier {
    async fn classify(
        &self,
        _snapshot: &RepoSnapshot,
    ) -> Result<Vec<FeatureCandidate>, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcome.clone()
    }
}

// ---------------------------------------------------------------------------
// ScriptedSummarizer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Behaviour {
    Delay(Duration),
    Fail(String),
    Hang,
    Empty,
}

/// Summarizer answering `"<feature>: <headline>"`, with per-commit latency
/// and failure scripting. Tracks call count and peak concurrency.
#[derive(Debug, Default)]
pub struct ScriptedSummarizer {
    behaviours: Mutex<HashMap<CommitId, Behaviour>>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    contexts: Mutex<Vec<CommitContext>>,
}

impl ScriptedSummarizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delay(self, commit: &str, latency: Duration) -> Self {
        self.script(commit, Behaviour::Delay(latency))
    }

    pub fn fail(self, commit: &str, reason: &str) -> Self {
        self.script(commit, Behaviour::Fail(reason.to_string()))
    }

    /// Never answer for `commit`; the narrator's timeout must fire.
    pub fn hang(self, commit: &str) -> Self {
        self.script(commit, Behaviour::Hang)
    }

    pub fn empty(self, commit: &str) -> Self {
        self.script(commit, Behaviour::Empty)
    }

    fn script(self, commit: &str, behaviour: Behaviour) -> Self {
        lock(&self.behaviours).insert(CommitId::new(commit), behaviour);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    /// Contexts received so far, in call order.
    pub fn contexts(&self) -> Vec<CommitContext> {
        lock(&self.contexts).clone()
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Summarizer for ScriptedSummarizer {
    async fn summarize(&self, context: &CommitContext) -> Result<String, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);
        lock(&self.contexts).push(context.clone());

        let behaviour = lock(&self.behaviours).get(&context.commit.id).cloned();
        match behaviour {
            Some(Behaviour::Delay(latency)) => tokio::time::sleep(latency).await,
            Some(Behaviour::Fail(reason)) => return Err(CollaboratorError::Failed(reason)),
            Some(Behaviour::Hang) => std::future::pending::<()>().await,
            Some(Behaviour::Empty) => return Ok(String::new()),
            None => {}
        }

        Ok(format!(
            "{}: {}",
            context.feature_name,
            context.commit.headline()
        ))
    }
}
