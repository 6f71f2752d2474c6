//! Session-scoped memoization of feature evolutions.
//!
//! At most one computation runs per key. The first caller installs a spawned
//! computation wrapped in a [`Shared`] future; later callers join it. A
//! successful result stays for the session lifetime. A failed one is handed
//! to every waiter and then cleared so the next request recomputes.

use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::Mutex;
use tracing::debug;

use crate::domain::{FeatureEvolution, FeatureId, PipelineError, RepoRef, Result};
use crate::metrics::METRICS;
use crate::obs;

/// Cache key: one feature of one repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub repo: RepoRef,
    pub feature: FeatureId,
}

impl CacheKey {
    pub fn new(repo: RepoRef, feature: FeatureId) -> Self {
        Self { repo, feature }
    }
}

type Slot = Shared<BoxFuture<'static, Result<Arc<FeatureEvolution>>>>;

/// Per-session evolution cache. No persistence, no eviction.
#[derive(Default)]
pub struct SessionCache {
    slots: Mutex<HashMap<CacheKey, Slot>>,
}

impl SessionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached evolution for `key`, or run `compute` to produce it.
    ///
    /// `compute` is spawned onto the runtime, so dropping this future does not
    /// cancel it. Concurrent callers for the same key share one computation.
    pub async fn get_or_compute<F>(&self, key: CacheKey, compute: F) -> Result<Arc<FeatureEvolution>>
    where
        F: Future<Output = Result<FeatureEvolution>> + Send + 'static,
    {
        let (slot, joined) = {
            let mut slots = self.slots.lock().await;

            // A failure nobody awaited is still sitting in the map.
            if slots
                .get(&key)
                .is_some_and(|slot| matches!(slot.peek(), Some(Err(_))))
            {
                slots.remove(&key);
            }

            match slots.get(&key) {
                Some(slot) => (slot.clone(), true),
                None => {
                    let slot = AssertUnwindSafe(compute)
                        .catch_unwind()
                        .map(|outcome| match outcome {
                            Ok(result) => result.map(Arc::new),
                            Err(_) => Err(PipelineError::Task(
                                "evolution computation panicked".to_string(),
                            )),
                        })
                        .boxed()
                        .shared();
                    // The spawned task drives the slot to completion even
                    // if every caller goes away.
                    tokio::spawn(slot.clone());
                    slots.insert(key.clone(), slot.clone());
                    (slot, false)
                }
            }
        };

        if joined {
            METRICS.inc_cache_hits();
            obs::emit_cache_hit(&key.repo.to_string(), key.feature.as_str());
        }

        let result = slot.clone().await;

        if let Err(err) = &result {
            let mut slots = self.slots.lock().await;
            if slots.get(&key).is_some_and(|current| current.ptr_eq(&slot)) {
                slots.remove(&key);
                debug!(feature = %key.feature, error = %err, "cleared failed evolution slot");
            }
        }

        result
    }

    /// Completed, successful evolution for `key`, if any.
    pub async fn get(&self, key: &CacheKey) -> Option<Arc<FeatureEvolution>> {
        let slots = self.slots.lock().await;
        slots
            .get(key)
            .and_then(|slot| slot.peek().cloned())
            .and_then(|result| result.ok())
    }

    /// Number of occupied slots, in flight or completed.
    pub async fn len(&self) -> usize {
        self.slots.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn key() -> CacheKey {
        CacheKey::new(RepoRef::new("acme", "widgets"), FeatureId::from_name("Export"))
    }

    fn evolution() -> FeatureEvolution {
        FeatureEvolution::new(FeatureId::from_name("Export"), Vec::new())
    }

    #[tokio::test]
    async fn test_success_is_memoized() {
        let cache = SessionCache::new();
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let calls = Arc::clone(&calls);
            let evo = cache
                .get_or_compute(key(), async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, PipelineError>(evolution())
                })
                .await
                .unwrap();
            assert_eq!(evo.feature_id, FeatureId::from_name("Export"));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(cache.get(&key()).await.is_some());
    }

    #[tokio::test]
    async fn test_failure_is_not_memoized() {
        let cache = SessionCache::new();

        let err = cache
            .get_or_compute(key(), async {
                Err::<FeatureEvolution, _>(PipelineError::UpstreamUnavailable {
                    attempts: 4,
                    reason: "quota".into(),
                })
            })
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::UpstreamUnavailable { .. }));
        assert!(cache.is_empty().await);

        let evo = cache
            .get_or_compute(key(), async { Ok::<_, PipelineError>(evolution()) })
            .await
            .unwrap();
        assert_eq!(evo.commit_count(), 0);
    }

    #[tokio::test]
    async fn test_panicking_compute_becomes_task_error() {
        let cache = SessionCache::new();
        let err = cache
            .get_or_compute(key(), async {
                if true {
                    panic!("boom");
                }
                Ok::<_, PipelineError>(evolution())
            })
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Task(_)));
    }

    #[tokio::test]
    async fn test_abandoned_caller_still_fills_cache() {
        let cache = Arc::new(SessionCache::new());

        let waiter = {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move {
                cache
                    .get_or_compute(key(), async {
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Ok::<_, PipelineError>(evolution())
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(5)).await;
        waiter.abort();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(cache.get(&key()).await.is_some());
    }
}
