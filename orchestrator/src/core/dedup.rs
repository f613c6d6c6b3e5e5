//! In-flight deduplication in front of the result cache
//!
//! At most one generation attempt runs per fingerprint. The first caller
//! registers a shared handle and starts the producer on a tracked task;
//! every concurrent caller for the same fingerprint awaits that handle. The
//! handle is removed by a drop guard once the attempt settles, after the
//! cache has been populated, so a later caller sees either the in-flight
//! handle or the cached result and never starts a second attempt.

use std::future::Future;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use shared::component_debug;
use tokio::sync::oneshot;
use tokio_util::task::TaskTracker;

use crate::core::cache::ResultCache;
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::types::{Fingerprint, GenerationResult};

const COMPONENT: &str = "dedup";

type SharedAttempt = Shared<BoxFuture<'static, OrchestratorResult<GenerationResult>>>;

/// Where a result came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Served from a fresh cache entry
    Cached,
    /// Awaited an attempt started by another caller
    Joined,
    /// This caller started the attempt
    Produced,
}

/// Removes the in-flight handle when the attempt ends, however it ends
struct InFlightGuard {
    in_flight: Arc<DashMap<Fingerprint, SharedAttempt>>,
    fingerprint: Fingerprint,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.remove(&self.fingerprint);
    }
}

pub struct InFlightDeduplicator {
    cache: Arc<ResultCache>,
    in_flight: Arc<DashMap<Fingerprint, SharedAttempt>>,
    tracker: TaskTracker,
}

impl InFlightDeduplicator {
    pub fn new(cache: Arc<ResultCache>, tracker: TaskTracker) -> Self {
        Self {
            cache,
            in_flight: Arc::new(DashMap::new()),
            tracker,
        }
    }

    pub fn cache(&self) -> &Arc<ResultCache> {
        &self.cache
    }

    pub fn is_in_flight(&self, fingerprint: &Fingerprint) -> bool {
        self.in_flight.contains_key(fingerprint)
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Return the cached result, join the running attempt, or start one
    pub async fn get_or_create<F, Fut>(&self, fingerprint: Fingerprint, producer: F) -> OrchestratorResult<GenerationResult>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = OrchestratorResult<GenerationResult>> + Send + 'static,
    {
        self.resolve(fingerprint, producer).await.map(|(result, _)| result)
    }

    /// Like [`get_or_create`](Self::get_or_create), also reporting how the result was obtained
    pub async fn resolve<F, Fut>(
        &self,
        fingerprint: Fingerprint,
        producer: F,
    ) -> OrchestratorResult<(GenerationResult, Resolution)>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = OrchestratorResult<GenerationResult>> + Send + 'static,
    {
        if let Some(hit) = self.cache.get(&fingerprint) {
            component_debug!(COMPONENT, fingerprint = fingerprint.short(), "Cache hit");
            return Ok((hit, Resolution::Cached));
        }

        let (attempt, start) = match self.in_flight.entry(fingerprint.clone()) {
            Entry::Occupied(entry) => (entry.get().clone(), None),
            Entry::Vacant(entry) => {
                // an attempt may have finished between the first lookup and taking this entry
                if let Some(hit) = self.cache.get(&fingerprint) {
                    return Ok((hit, Resolution::Cached));
                }
                let (tx, rx) = oneshot::channel();
                let aborted = fingerprint.to_string();
                let attempt = async move {
                    rx.await
                        .unwrap_or(Err(OrchestratorError::AttemptAborted { fingerprint: aborted }))
                }
                .boxed()
                .shared();
                entry.insert(attempt.clone());
                (attempt, Some(tx))
            }
        };

        let resolution = match start {
            Some(tx) => {
                component_debug!(COMPONENT, fingerprint = fingerprint.short(), "Starting generation attempt");
                self.spawn_attempt(fingerprint, producer, tx);
                Resolution::Produced
            }
            None => {
                component_debug!(COMPONENT, fingerprint = fingerprint.short(), "Joining in-flight attempt");
                Resolution::Joined
            }
        };

        attempt.await.map(|result| (result, resolution))
    }

    fn spawn_attempt<F, Fut>(
        &self,
        fingerprint: Fingerprint,
        producer: F,
        tx: oneshot::Sender<OrchestratorResult<GenerationResult>>,
    ) where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = OrchestratorResult<GenerationResult>> + Send + 'static,
    {
        let guard = InFlightGuard {
            in_flight: self.in_flight.clone(),
            fingerprint: fingerprint.clone(),
        };
        let cache = self.cache.clone();

        self.tracker.spawn(async move {
            let outcome = producer().await;
            if let Ok(result) = &outcome {
                if result.success {
                    cache.put(fingerprint, result.clone());
                }
            }
            drop(guard);
            let _ = tx.send(outcome);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Payload;
    use shared::{ContentId, ImageSize, ImageStyle, ProviderFailure, ProviderId};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn fingerprint(id: &str) -> Fingerprint {
        Fingerprint::compute(&ContentId::from(id), ImageStyle::Default, ImageSize::default())
    }

    fn dedup() -> InFlightDeduplicator {
        InFlightDeduplicator::new(Arc::new(ResultCache::default()), TaskTracker::new())
    }

    fn ok_result(provider: &str) -> GenerationResult {
        GenerationResult::success(ProviderId::from(provider), Payload::url("u"), Duration::from_millis(5), 80)
    }

    #[tokio::test]
    async fn test_producer_runs_once_for_concurrent_callers() {
        let dedup = Arc::new(dedup());
        let calls = Arc::new(AtomicUsize::new(0));
        let fp = fingerprint("post-1");

        let mut handles = Vec::new();
        for _ in 0..8 {
            let dedup = dedup.clone();
            let calls = calls.clone();
            let fp = fp.clone();
            handles.push(tokio::spawn(async move {
                dedup
                    .get_or_create(fp, move || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok(ok_result("alpha"))
                    })
                    .await
            }));
        }

        for handle in handles {
            let result = handle.await.unwrap().unwrap();
            assert_eq!(result.provider_id.as_str(), "alpha");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(dedup.in_flight_count(), 0);
        assert!(dedup.cache().contains(&fp));
    }

    #[tokio::test]
    async fn test_failed_attempt_is_not_cached_and_handle_removed() {
        let dedup = dedup();
        let fp = fingerprint("post-2");

        let result = dedup
            .get_or_create(fp.clone(), || async {
                Ok(GenerationResult::failure(
                    ProviderId::from("alpha"),
                    ProviderFailure::ServiceUnavailable,
                    Duration::from_millis(1),
                ))
            })
            .await
            .unwrap();

        assert!(!result.success);
        assert!(!dedup.is_in_flight(&fp));
        assert!(!dedup.cache().contains(&fp));
    }

    #[tokio::test]
    async fn test_error_is_shared_with_joined_callers() {
        let dedup = Arc::new(dedup());
        let fp = fingerprint("post-3");

        let first = {
            let dedup = dedup.clone();
            let fp = fp.clone();
            tokio::spawn(async move {
                dedup
                    .resolve(fp, || async {
                        tokio::time::sleep(Duration::from_millis(30)).await;
                        Err(OrchestratorError::config("providers", "none"))
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(5)).await;
        let second = dedup
            .resolve(fp.clone(), || async { Ok(ok_result("never")) })
            .await;

        assert!(matches!(second, Err(OrchestratorError::ConfigurationError { .. })));
        assert!(first.await.unwrap().is_err());
        assert!(!dedup.is_in_flight(&fp));
    }

    #[tokio::test]
    async fn test_panicking_producer_releases_waiters() {
        let dedup = dedup();
        let fp = fingerprint("post-4");

        let result = dedup
            .get_or_create(fp.clone(), || async {
                if true {
                    panic!("producer bug");
                }
                Ok(ok_result("unreachable"))
            })
            .await;

        assert!(matches!(result, Err(OrchestratorError::AttemptAborted { .. })));
        assert!(!dedup.is_in_flight(&fp));
    }

    #[tokio::test]
    async fn test_cached_result_short_circuits() {
        let dedup = dedup();
        let fp = fingerprint("post-5");
        dedup.cache().put(fp.clone(), ok_result("cached"));

        let (result, resolution) = dedup
            .resolve(fp, || async { Ok(ok_result("fresh")) })
            .await
            .unwrap();

        assert_eq!(resolution, Resolution::Cached);
        assert_eq!(result.provider_id.as_str(), "cached");
    }
}
