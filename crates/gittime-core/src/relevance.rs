//! Relevance filter: which commits touched a feature's files.

use std::collections::BTreeSet;

use crate::domain::Commit;

/// Select the commits that touched at least one path in `files`.
///
/// Output is ascending by `(timestamp, id)` regardless of input order, and
/// is always a subsequence of the chronologically sorted input. Matching is
/// exact-string per [`crate::ChangedFile::touches`].
pub fn select(commits: &[Commit], files: &BTreeSet<String>) -> Vec<Commit> {
    let mut ordered: Vec<&Commit> = commits.iter().collect();
    ordered.sort_by(|a, b| a.meta.chronological_cmp(&b.meta));

    ordered
        .into_iter()
        .filter(|commit| is_relevant(commit, files))
        .cloned()
        .collect()
}

/// Whether any changed file of `commit` matches `files`.
pub fn is_relevant(commit: &Commit, files: &BTreeSet<String>) -> bool {
    commit.files.iter().any(|f| f.touches(files))
}
