//! Domain models for GitTime.
//!
//! Canonical definitions for the core entities:
//! - `RepoRef`: which repository is being analysed
//! - `Commit` / `ChangedFile`: immutable history records
//! - `Feature`: a classifier-derived capability and its files
//! - `EvolutionEntry` / `FeatureEvolution`: the narrated result

pub mod commit;
pub mod error;
pub mod evolution;
pub mod feature;
pub mod repo;

// Re-export main types and errors
pub use commit::{ChangedFile, Commit, CommitId, CommitMeta, FileStatus, Release, Tag};
pub use error::{CollaboratorError, HostingError, HostingResult, PipelineError, Result};
pub use evolution::{
    DiffStat, EvolutionEntry, FeatureEvolution, FileStat, VersionEntry, SUMMARY_UNAVAILABLE,
};
pub use feature::{Feature, FeatureCandidate, FeatureId};
pub use repo::RepoRef;
