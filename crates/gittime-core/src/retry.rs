//! Upstream call controls: timeout, retry with exponential backoff, quota guard.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::collaborators::RateLimit;
use crate::domain::{HostingError, HostingResult, PipelineError, Result};
use crate::metrics::METRICS;
use crate::obs;

/// Retry and quota configuration for hosting API calls.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetryPolicy {
    /// Maximum number of retries (0 = no retries, run once).
    pub max_retries: u32,
    /// Base delay for exponential backoff between retries (milliseconds).
    pub backoff_base_ms: u64,
    /// Upper bound for any single backoff delay (milliseconds).
    pub max_backoff_ms: u64,
    /// Maximum wall-clock time for a single attempt (milliseconds).
    pub request_timeout_ms: u64,
    /// Pause before calling when remaining quota is at or below this value.
    pub quota_low_watermark: u32,
    /// Upper bound for a pre-emptive quota pause (milliseconds).
    pub max_quota_wait_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_base_ms: 500,
            max_backoff_ms: 30_000,
            request_timeout_ms: 30_000,
            quota_low_watermark: 5,
            max_quota_wait_ms: 60_000,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
        Duration::from_millis(
            self.backoff_base_ms
                .saturating_mul(factor)
                .min(self.max_backoff_ms),
        )
    }

    /// Delay after a quota-exhausted response: wait for the reset, at least
    /// the regular backoff and at most `max_quota_wait_ms`.
    pub fn quota_backoff(&self, reset_at: Option<DateTime<Utc>>, attempt: u32) -> Duration {
        let floor = self.backoff(attempt);
        let until_reset = reset_at
            .and_then(|at| (at - Utc::now()).to_std().ok())
            .unwrap_or(Duration::ZERO);
        until_reset
            .max(floor)
            .min(Duration::from_millis(self.max_quota_wait_ms))
    }

    /// Pause to take before the next call given the last quota signal.
    pub fn quota_pause(&self, signal: Option<RateLimit>) -> Option<Duration> {
        let signal = signal?;
        if signal.remaining > self.quota_low_watermark {
            return None;
        }
        let wait = (signal.reset_at - Utc::now()).to_std().ok()?;
        Some(wait.min(Duration::from_millis(self.max_quota_wait_ms)))
    }
}

/// Run a hosting call with quota guard, per-attempt timeout and retries.
///
/// `NotFound` is surfaced immediately as [`PipelineError::NotFound`]. Other
/// non-retryable failures and exhausted retries become
/// [`PipelineError::UpstreamUnavailable`].
pub async fn call_upstream<T, S, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    quota_signal: S,
    call: F,
) -> Result<T>
where
    S: Fn() -> Option<RateLimit>,
    F: Fn() -> Fut,
    Fut: Future<Output = HostingResult<T>>,
{
    let max_attempts = policy.max_retries + 1;
    let timeout = Duration::from_millis(policy.request_timeout_ms);
    let mut last_error = String::new();

    for attempt in 1..=max_attempts {
        if let Some(pause) = policy.quota_pause(quota_signal()) {
            obs::emit_quota_backoff(operation, pause);
            tokio::time::sleep(pause).await;
        }

        METRICS.inc_upstream_calls();
        let outcome = match tokio::time::timeout(timeout, call()).await {
            Ok(result) => result,
            Err(_elapsed) => Err(HostingError::Network(format!(
                "{operation} timed out after {}ms",
                policy.request_timeout_ms
            ))),
        };

        let err = match outcome {
            Ok(value) => return Ok(value),
            Err(HostingError::NotFound { resource }) => {
                return Err(PipelineError::NotFound(resource))
            }
            Err(err) if !err.is_retryable() => {
                return Err(PipelineError::UpstreamUnavailable {
                    attempts: attempt,
                    reason: err.to_string(),
                })
            }
            Err(err) => err,
        };

        last_error = err.to_string();
        if attempt == max_attempts {
            break;
        }

        let delay = match &err {
            HostingError::QuotaExhausted { reset_at } => policy.quota_backoff(*reset_at, attempt),
            _ => policy.backoff(attempt),
        };
        METRICS.inc_upstream_retries();
        obs::emit_upstream_retry(operation, attempt, delay, &err);
        tokio::time::sleep(delay).await;
    }

    Err(PipelineError::UpstreamUnavailable {
        attempts: max_attempts,
        reason: last_error,
    })
}
