//! Global atomic counters for pipeline observability.
//!
//! Counters are incremented silently at the call site. Call
//! [`Metrics::flush`] to emit current values as a single
//! `tracing::info!` event (e.g. when a CLI command completes).

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

/// Lightweight atomic counters with no allocation or locking.
pub struct Metrics {
    upstream_calls: AtomicU64,
    upstream_retries: AtomicU64,
    diff_fetches: AtomicU64,
    summaries_requested: AtomicU64,
    summaries_degraded: AtomicU64,
    cache_hits: AtomicU64,
    evolutions_computed: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            upstream_calls: AtomicU64::new(0),
            upstream_retries: AtomicU64::new(0),
            diff_fetches: AtomicU64::new(0),
            summaries_requested: AtomicU64::new(0),
            summaries_degraded: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            evolutions_computed: AtomicU64::new(0),
        }
    }

    pub fn inc_upstream_calls(&self) {
        self.upstream_calls.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "upstream_calls", "counter incremented");
    }

    pub fn inc_upstream_retries(&self) {
        self.upstream_retries.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "upstream_retries", "counter incremented");
    }

    pub fn inc_diff_fetches(&self) {
        self.diff_fetches.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "diff_fetches", "counter incremented");
    }

    pub fn inc_summaries_requested(&self) {
        self.summaries_requested.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "summaries_requested", "counter incremented");
    }

    pub fn inc_summaries_degraded(&self) {
        self.summaries_degraded.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "summaries_degraded", "counter incremented");
    }

    pub fn inc_cache_hits(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "cache_hits", "counter incremented");
    }

    pub fn inc_evolutions_computed(&self) {
        self.evolutions_computed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "evolutions_computed", "counter incremented");
    }

    /// Emit all current counter values as a single `info!` event.
    ///
    /// Call this at natural boundaries (end of a command, session teardown)
    /// rather than on every increment.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            upstream_calls = self.upstream_calls(),
            upstream_retries = self.upstream_retries(),
            diff_fetches = self.diff_fetches(),
            summaries_requested = self.summaries_requested(),
            summaries_degraded = self.summaries_degraded(),
            cache_hits = self.cache_hits(),
            evolutions_computed = self.evolutions_computed(),
        );
    }

    pub fn upstream_calls(&self) -> u64 {
        self.upstream_calls.load(Ordering::Relaxed)
    }

    pub fn upstream_retries(&self) -> u64 {
        self.upstream_retries.load(Ordering::Relaxed)
    }

    pub fn diff_fetches(&self) -> u64 {
        self.diff_fetches.load(Ordering::Relaxed)
    }

    pub fn summaries_requested(&self) -> u64 {
        self.summaries_requested.load(Ordering::Relaxed)
    }

    pub fn summaries_degraded(&self) -> u64 {
        self.summaries_degraded.load(Ordering::Relaxed)
    }

    pub fn cache_hits(&self) -> u64 {
        self.cache_hits.load(Ordering::Relaxed)
    }

    pub fn evolutions_computed(&self) -> u64 {
        self.evolutions_computed.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_increment() {
        let m = Metrics::new();
        assert_eq!(m.upstream_calls(), 0);
        m.inc_upstream_calls();
        m.inc_upstream_calls();
        assert_eq!(m.upstream_calls(), 2);

        m.inc_summaries_requested();
        m.inc_summaries_degraded();
        assert_eq!(m.summaries_requested(), 1);
        assert_eq!(m.summaries_degraded(), 1);

        m.inc_cache_hits();
        m.inc_evolutions_computed();
        m.inc_diff_fetches();
        assert_eq!(m.cache_hits(), 1);
        assert_eq!(m.evolutions_computed(), 1);
        assert_eq!(m.diff_fetches(), 1);
    }
}
