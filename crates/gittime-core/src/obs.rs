//! Structured observability hooks for the evolution pipeline.
//!
//! This module provides:
//! - The `gittime.session` span that session futures are instrumented with
//! - Emission functions for key lifecycle events: session open, evolution
//!   start/finish, cache hits, degraded summaries and upstream backoff
//!
//! Events are emitted at `info!` level (filter via `RUST_LOG`), except for
//! degradations and retries which are `warn!`.

use std::time::Duration;

use tracing::{info, warn};

/// Span tagging everything a session does; futures are `.instrument`ed with it.
pub fn session_span(session_id: &str, repo: &str) -> tracing::Span {
    tracing::info_span!("gittime.session", session_id = %session_id, repo = %repo)
}

/// Emit event: session opened with the number of loaded commits and features.
pub fn emit_session_opened(session_id: &str, repo: &str, commits: usize, features: usize) {
    info!(
        event = "session.opened",
        session_id = %session_id,
        repo = %repo,
        commits = commits,
        features = features,
    );
}

/// Emit event: an evolution computation started for a feature.
pub fn emit_evolution_started(repo: &str, feature_id: &str, files: usize) {
    info!(event = "evolution.started", repo = %repo, feature_id = %feature_id, files = files);
}

/// Emit event: evolution computation finished.
pub fn emit_evolution_finished(
    repo: &str,
    feature_id: &str,
    entries: usize,
    degraded: usize,
    duration_ms: u64,
) {
    info!(
        event = "evolution.finished",
        repo = %repo,
        feature_id = %feature_id,
        entries = entries,
        degraded = degraded,
        duration_ms = duration_ms,
    );
}

/// Emit event: evolution served from (or joined to) an existing cache slot.
pub fn emit_cache_hit(repo: &str, feature_id: &str) {
    info!(event = "evolution.cache_hit", repo = %repo, feature_id = %feature_id);
}

/// Emit event: a commit narrative fell back to the placeholder.
pub fn emit_summary_degraded(commit: &str, reason: &dyn std::fmt::Display) {
    warn!(event = "summary.degraded", commit = %commit, reason = %reason);
}

/// Emit event: pausing before an upstream call because quota is low.
pub fn emit_quota_backoff(operation: &str, pause: Duration) {
    warn!(
        event = "quota.backoff",
        operation = %operation,
        pause_ms = pause.as_millis() as u64,
    );
}

/// Emit event: an upstream call failed and will be retried.
pub fn emit_upstream_retry(
    operation: &str,
    attempt: u32,
    delay: Duration,
    error: &dyn std::fmt::Display,
) {
    warn!(
        event = "upstream.retry",
        operation = %operation,
        attempt = attempt,
        delay_ms = delay.as_millis() as u64,
        error = %error,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_inside_session_span() {
        session_span("session-1", "owner/repo").in_scope(|| {
            emit_cache_hit("owner/repo", "abc123");
            emit_summary_degraded("abc1234", &"timed out");
        });
    }
}
