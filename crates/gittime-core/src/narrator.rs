//! Evolution narrator: one summarizer call per relevant commit.
//!
//! Calls fan out through a semaphore and run as spawned tasks, each under a
//! hard timeout. A failed, timed-out or panicked call yields a degraded entry
//! with [`SUMMARY_UNAVAILABLE`]; it never cancels the batch. Entries are
//! returned oldest to newest whatever order the calls complete in.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tracing::debug;

use crate::aggregate::aggregate;
use crate::collaborators::Summarizer;
use crate::domain::{
    Commit, CommitMeta, EvolutionEntry, Feature, FileStatus, SUMMARY_UNAVAILABLE,
};
use crate::metrics::METRICS;
use crate::obs;
use crate::snapshot::truncate_chars;

/// Room kept for the "n more file(s) omitted" line once truncation kicks in.
const OMISSION_NOTE_RESERVE: usize = 48;

/// Configuration for narration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NarratorConfig {
    /// Character budget for a rendered [`CommitContext`].
    pub input_budget: usize,
    /// Per-file cap on patch text before budgeting.
    pub patch_excerpt_chars: usize,
    /// Hard timeout for a single summarizer call (milliseconds).
    pub call_timeout_ms: u64,
    /// Maximum concurrent summarizer calls.
    pub max_concurrent_summaries: usize,
}

impl Default for NarratorConfig {
    fn default() -> Self {
        Self {
            input_budget: 6_000,
            patch_excerpt_chars: 500,
            call_timeout_ms: 60_000,
            max_concurrent_summaries: 4,
        }
    }
}

/// One feature file as shown to the summarizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileContext {
    pub path: String,
    pub status: FileStatus,
    pub additions: u64,
    pub deletions: u64,
    pub excerpt: Option<String>,
}

impl FileContext {
    pub fn churn(&self) -> u64 {
        self.additions + self.deletions
    }

    fn stat_line(&self) -> String {
        format!(
            "  [{}] {} (+{} -{})\n",
            self.status, self.path, self.additions, self.deletions
        )
    }

    fn render(&self) -> String {
        let mut out = self.stat_line();
        if let Some(excerpt) = &self.excerpt {
            for line in excerpt.lines() {
                out.push_str("    ");
                out.push_str(line);
                out.push('\n');
            }
        }
        out
    }

    fn rendered_len(&self) -> usize {
        self.render().chars().count()
    }

    /// Shrink the excerpt until the rendered file fits in `limit` chars.
    /// The stat line is always kept.
    fn shrink_to(&mut self, limit: usize) {
        let stat_len = self.stat_line().chars().count();
        if let Some(excerpt) = self.excerpt.take() {
            let room = limit.saturating_sub(stat_len);
            let mut cut = truncate_chars(&excerpt, room).to_string();
            self.excerpt = Some(cut.clone());
            while self.rendered_len() > limit && !cut.is_empty() {
                match cut.rfind('\n') {
                    Some(pos) => cut.truncate(pos),
                    None => cut.clear(),
                }
                self.excerpt = Some(cut.clone());
            }
            if cut.is_empty() {
                self.excerpt = None;
            }
        }
    }
}

/// Bounded input for one summarizer call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitContext {
    pub feature_name: String,
    pub feature_description: String,
    pub commit: CommitMeta,
    /// Feature files only, in the commit's reported order.
    pub files: Vec<FileContext>,
    /// Files dropped to meet the input budget.
    pub omitted_files: usize,
}

impl CommitContext {
    /// Build the context for `commit`, restricted to the feature's files and
    /// truncated to `config.input_budget`.
    pub fn build(feature: &Feature, commit: &Commit, config: &NarratorConfig) -> Self {
        let files = commit
            .files
            .iter()
            .filter(|f| f.touches(feature.files()))
            .map(|f| FileContext {
                path: f.path.clone(),
                status: f.status,
                additions: f.additions,
                deletions: f.deletions,
                excerpt: f
                    .patch
                    .as_deref()
                    .map(|p| truncate_chars(p, config.patch_excerpt_chars).to_string())
                    .filter(|p| !p.is_empty()),
            })
            .collect();

        let mut context = Self {
            feature_name: feature.name().to_string(),
            feature_description: feature.description().to_string(),
            commit: commit.meta.clone(),
            files,
            omitted_files: 0,
        };
        context.fit_header(config.input_budget / 2);
        let header_len = context.render_header().chars().count();
        context.fit_files(config.input_budget.saturating_sub(header_len));
        context
    }

    /// Cut the commit message and feature description until the header fits
    /// `limit` chars. The message keeps at least two thirds of the room.
    fn fit_header(&mut self, limit: usize) {
        let len = self.render_header().chars().count();
        if len <= limit {
            return;
        }

        let message = self.commit.message.trim().to_string();
        let message_len = message.chars().count();
        let description_len = self.feature_description.chars().count();
        let fixed = len - message_len - description_len;
        let room = limit.saturating_sub(fixed);

        let message_room = message_len.min(room - description_len.min(room / 3));
        let description_room = room - message_room;
        self.commit.message = truncate_chars(&message, message_room).to_string();
        self.feature_description =
            truncate_chars(&self.feature_description, description_room).to_string();
    }

    /// Truncate file entries independently until they fit `budget` chars.
    ///
    /// Files are ranked by churn (largest first, ties by path). The top file
    /// always keeps its detail, cut to the remaining room; lower-ranked files
    /// that do not fit lose their excerpt, then are omitted entirely.
    fn fit_files(&mut self, budget: usize) {
        let total: usize = self.files.iter().map(FileContext::rendered_len).sum();
        if total <= budget || self.files.is_empty() {
            return;
        }

        let mut ranked: Vec<usize> = (0..self.files.len()).collect();
        ranked.sort_by(|&a, &b| {
            let (fa, fb) = (&self.files[a], &self.files[b]);
            fb.churn().cmp(&fa.churn()).then_with(|| fa.path.cmp(&fb.path))
        });

        let mut remaining = budget.saturating_sub(OMISSION_NOTE_RESERVE);
        let mut keep = vec![true; self.files.len()];

        for (rank, &idx) in ranked.iter().enumerate() {
            let file = &mut self.files[idx];
            let full = file.rendered_len();
            if full <= remaining {
                remaining -= full;
                continue;
            }

            if rank == 0 {
                file.shrink_to(remaining);
                remaining = remaining.saturating_sub(file.rendered_len());
                continue;
            }

            let stat_len = file.stat_line().chars().count();
            if stat_len <= remaining {
                file.excerpt = None;
                remaining -= stat_len;
            } else {
                keep[idx] = false;
            }
        }

        let mut flags = keep.into_iter();
        self.files.retain(|_| flags.next().unwrap_or(true));
        self.omitted_files = ranked.len() - self.files.len();
    }

    fn render_header(&self) -> String {
        format!(
            "## Feature\nName: {}\nDescription: {}\n\n## Commit {} ({}) by {}\nMessage: {}\nFiles:\n",
            self.feature_name,
            self.feature_description,
            self.commit.id.short(),
            self.commit.timestamp.format("%Y-%m-%d"),
            self.commit.author,
            self.commit.message.trim(),
        )
    }

    /// Text sent to the summarizer.
    pub fn render(&self) -> String {
        let mut out = self.render_header();
        for file in &self.files {
            out.push_str(&file.render());
        }
        if self.omitted_files > 0 {
            out.push_str(&format!(
                "  ... {} more file(s) omitted\n",
                self.omitted_files
            ));
        }
        out
    }
}

/// Narrates a feature's relevant commits through a [`Summarizer`].
pub struct EvolutionNarrator {
    summarizer: Arc<dyn Summarizer>,
    config: NarratorConfig,
    permits: Arc<Semaphore>,
}

impl EvolutionNarrator {
    pub fn new(summarizer: Arc<dyn Summarizer>, config: NarratorConfig) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_concurrent_summaries.max(1)));
        Self {
            summarizer,
            config,
            permits,
        }
    }

    pub fn config(&self) -> &NarratorConfig {
        &self.config
    }

    /// Produce one entry per commit, oldest to newest.
    ///
    /// Never fails: summarizer problems degrade individual entries.
    pub async fn narrate(&self, feature: &Feature, commits: Vec<Commit>) -> Vec<EvolutionEntry> {
        let timeout = Duration::from_millis(self.config.call_timeout_ms);
        let mut pending = Vec::with_capacity(commits.len());

        for commit in commits {
            let diff = aggregate(&commit, feature.files());
            let context = CommitContext::build(feature, &commit, &self.config);
            let summarizer = Arc::clone(&self.summarizer);
            let permits = Arc::clone(&self.permits);

            let handle = tokio::spawn(async move {
                let _permit = permits.acquire_owned().await.ok();
                summarize_one(summarizer.as_ref(), &context, timeout).await
            });
            pending.push((commit.meta, diff, handle));
        }

        let mut entries = Vec::with_capacity(pending.len());
        for (meta, diff, handle) in pending {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(join_err) => Err(format!("summarizer task failed: {join_err}")),
            };

            let (narrative, degraded) = match outcome {
                Ok(text) => (text, false),
                Err(reason) => {
                    METRICS.inc_summaries_degraded();
                    obs::emit_summary_degraded(meta.id.short(), &reason);
                    (SUMMARY_UNAVAILABLE.to_string(), true)
                }
            };

            entries.push(EvolutionEntry {
                commit: meta,
                diff,
                narrative,
                degraded,
            });
        }

        entries.sort_by(|a, b| a.commit.chronological_cmp(&b.commit));
        debug!(
            feature = %feature.name(),
            entries = entries.len(),
            "narration complete"
        );
        entries
    }
}

async fn summarize_one(
    summarizer: &dyn Summarizer,
    context: &CommitContext,
    timeout: Duration,
) -> Result<String, String> {
    METRICS.inc_summaries_requested();
    match tokio::time::timeout(timeout, summarizer.summarize(context)).await {
        Ok(Ok(text)) if !text.trim().is_empty() => Ok(text.trim().to_string()),
        Ok(Ok(_)) => Err("summarizer returned an empty narrative".to_string()),
        Ok(Err(err)) => Err(err.to_string()),
        Err(_elapsed) => Err(format!(
            "summarizer timed out after {}ms",
            timeout.as_millis()
        )),
    }
}
