//! GitTime Core Library
//!
//! Feature evolution pipeline: load a repository's history, classify its
//! features, and narrate how each feature changed commit by commit.

pub mod aggregate;
pub mod cache;
pub mod collaborators;
pub mod config;
pub mod domain;
pub mod fakes;
pub mod history;
pub mod metrics;
pub mod narrator;
pub mod obs;
pub mod registry;
pub mod relevance;
pub mod retry;
pub mod session;
pub mod snapshot;
pub mod telemetry;
pub mod timeline;

pub use domain::{
    ChangedFile, CollaboratorError, Commit, CommitId, CommitMeta, DiffStat, EvolutionEntry,
    Feature, FeatureCandidate, FeatureEvolution, FeatureId, FileStat, FileStatus, HostingError,
    HostingResult, PipelineError, Release, RepoRef, Result, Tag, VersionEntry,
    SUMMARY_UNAVAILABLE,
};

pub use aggregate::aggregate;
pub use cache::{CacheKey, SessionCache};
pub use collaborators::{
    CommitPage, CommitQuery, FeatureClassifier, HostingApi, RateLimit, RepoInfo, Summarizer,
};
pub use config::PipelineConfig;
pub use history::{HistoryConfig, HistoryStore};
pub use narrator::{CommitContext, EvolutionNarrator, FileContext, NarratorConfig};
pub use registry::FeatureRegistry;
pub use retry::{call_upstream, RetryPolicy};
pub use session::{AnalysisSession, Collaborators, SessionId};
pub use snapshot::RepoSnapshot;
pub use timeline::{release_points, version_timeline, ReleasePoint};

/// Crate version, reported by the CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
