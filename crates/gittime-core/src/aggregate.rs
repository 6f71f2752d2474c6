//! Feature-restricted diff statistics.

use std::collections::BTreeSet;

use crate::domain::{Commit, DiffStat, FileStat};

/// Per-file and total add/delete counts for the files of `commit` that
/// match `files`.
///
/// Unrelated files never contribute to the totals. Reported status and
/// order are preserved, and zero/zero entries (pure renames, mode changes)
/// are kept so callers can tell "no textual change" from "not touched".
pub fn aggregate(commit: &Commit, files: &BTreeSet<String>) -> DiffStat {
    let per_file: Vec<FileStat> = commit
        .files
        .iter()
        .filter(|f| f.touches(files))
        .map(|f| FileStat {
            path: f.path.clone(),
            status: f.status,
            additions: f.additions,
            deletions: f.deletions,
        })
        .collect();

    DiffStat {
        total_additions: per_file.iter().map(|f| f.additions).sum(),
        total_deletions: per_file.iter().map(|f| f.deletions).sum(),
        per_file,
    }
}
