//! Orchestrator facade
//!
//! Turns a [`GenerationRequest`] into exactly one [`GenerationResult`]:
//! cache and in-flight deduplication first, then a race across the best
//! providers for the request's priority, then the local fallback when no
//! provider delivers. Every raced provider reports its own outcome to the
//! registry from inside its task, so losers and late finishers are counted
//! too.

use std::sync::Arc;

use async_trait::async_trait;
use shared::{
    component_debug, component_error, component_info, component_warn, CacheStatus, ContentItem, ProviderStatusEntry,
    StatusSnapshot,
};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::task::TaskTracker;

use crate::core::{
    InFlightDeduplicator, PerformanceStats, ProviderAdapter, ProviderRegistry, Resolution, ResultCache,
    SelectionPolicy,
};
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::traits::{FallbackGenerator, ImageGenerator};
use crate::types::{Fingerprint, GenerationRequest, GenerationResult, PromptPayload};

const COMPONENT: &str = "orchestrator";

/// Quality reported for locally generated fallback images
pub const DEFAULT_FALLBACK_QUALITY: u8 = 30;

/// Tunables that are not owned by one of the injected components
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorSettings {
    pub fallback_quality: u8,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            fallback_quality: DEFAULT_FALLBACK_QUALITY,
        }
    }
}

/// Main entry point for share-image generation.
///
/// Cheap to clone; clones share the registry, cache, in-flight table and
/// background task tracker.
pub struct Orchestrator<F>
where
    F: FallbackGenerator + 'static,
{
    inner: Arc<Inner<F>>,
}

struct Inner<F> {
    registry: Arc<ProviderRegistry>,
    policy: SelectionPolicy,
    dedup: InFlightDeduplicator,
    fallback: F,
    settings: OrchestratorSettings,
    stats: PerformanceStats,
    tracker: TaskTracker,
}

impl<F> Clone for Orchestrator<F>
where
    F: FallbackGenerator + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<F> Orchestrator<F>
where
    F: FallbackGenerator + 'static,
{
    /// Wire an orchestrator from its collaborators.
    ///
    /// Fails with [`OrchestratorError::NoProvidersRegistered`] when the
    /// registry is empty.
    pub fn new(
        registry: Arc<ProviderRegistry>,
        policy: SelectionPolicy,
        cache: Arc<ResultCache>,
        fallback: F,
        settings: OrchestratorSettings,
    ) -> OrchestratorResult<Self> {
        if registry.is_empty() {
            return Err(OrchestratorError::NoProvidersRegistered);
        }

        let tracker = TaskTracker::new();
        component_info!(
            COMPONENT,
            providers = registry.len(),
            cache_ttl_ms = cache.ttl().as_millis() as u64,
            "Orchestrator ready"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                registry,
                policy,
                dedup: InFlightDeduplicator::new(cache, tracker.clone()),
                fallback,
                settings,
                stats: PerformanceStats::new(),
                tracker,
            }),
        })
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.inner.registry
    }

    pub fn cache(&self) -> &Arc<ResultCache> {
        self.inner.dedup.cache()
    }

    /// Generate (or reuse) the share image for a request
    pub async fn generate(&self, request: GenerationRequest) -> OrchestratorResult<GenerationResult> {
        let started = Instant::now();
        let fingerprint = request.fingerprint();
        let content_id = request.content_id.clone();

        let inner = self.inner.clone();
        let outcome = self
            .inner
            .dedup
            .resolve(fingerprint.clone(), move || async move { inner.produce(request).await })
            .await;

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match outcome {
            Ok((result, resolution)) => {
                self.inner.stats.record_request(result.success, elapsed_ms);
                if resolution == Resolution::Cached {
                    self.inner.stats.record_cache_hit();
                }
                component_debug!(
                    COMPONENT,
                    content_id = %content_id,
                    fingerprint = fingerprint.short(),
                    provider = %result.provider_id,
                    resolution = ?resolution,
                    elapsed_ms,
                    "Request answered"
                );
                Ok(result)
            }
            Err(e) => {
                self.inner.stats.record_request(false, elapsed_ms);
                component_error!(COMPONENT, content_id = %content_id, error = %e, "Request failed");
                Err(e)
            }
        }
    }

    /// Generate for an inbound content item, applying style and priority defaults
    pub async fn generate_item(&self, item: ContentItem) -> OrchestratorResult<GenerationResult> {
        self.generate(GenerationRequest::from(item)).await
    }

    /// Whether the fingerprint is cached or being generated right now
    pub fn is_known(&self, fingerprint: &Fingerprint) -> bool {
        self.inner.dedup.cache().contains(fingerprint) || self.inner.dedup.is_in_flight(fingerprint)
    }

    pub fn status(&self) -> StatusSnapshot {
        let providers = self
            .inner
            .registry
            .descriptors()
            .into_iter()
            .map(|d| ProviderStatusEntry {
                id: d.id,
                name: d.name,
                is_active: d.is_active,
                current_load: d.current_load,
                success_rate: d.success_rate,
                avg_response_time_ms: d.avg_response_time_ms,
            })
            .collect();

        StatusSnapshot {
            providers,
            cache: CacheStatus {
                size: self.inner.dedup.cache().len(),
                in_flight: self.inner.dedup.in_flight_count(),
            },
            performance: self.inner.stats.snapshot(),
        }
    }

    /// Wait for every background attempt and race task to finish
    pub async fn shutdown(&self) {
        self.inner.tracker.close();
        self.inner.tracker.wait().await;
        component_info!(COMPONENT, "Background generation tasks drained");
    }
}

impl<F> Inner<F>
where
    F: FallbackGenerator + 'static,
{
    /// One generation attempt: select, race, fall back
    async fn produce(&self, request: GenerationRequest) -> OrchestratorResult<GenerationResult> {
        let started = Instant::now();
        let selected = self.policy.select(&self.registry.list_available(), request.priority);

        if selected.is_empty() {
            component_warn!(COMPONENT, content_id = %request.content_id, "No provider available, using fallback");
            return self.fallback(&request, started);
        }

        let prompt = Arc::new(PromptPayload::from(&request));
        let (tx, mut rx) = mpsc::channel(selected.len());

        for descriptor in &selected {
            let adapter = ProviderAdapter::new(self.registry.clone(), descriptor.id.clone());
            let registry = self.registry.clone();
            let prompt = prompt.clone();
            let tx = tx.clone();
            let timeout = descriptor.timeout;

            self.tracker.spawn(async move {
                let result = adapter.generate(&prompt, timeout).await;
                let counts = result.error.as_ref().map_or(true, |e| e.counts_against_provider());
                if counts {
                    registry.record_result(&result);
                }
                // the race may already be decided
                let _ = tx.send(result).await;
            });
        }
        drop(tx);

        let mut first = true;
        let mut successes = Vec::new();
        while let Some(result) = rx.recv().await {
            if result.success {
                if first {
                    component_debug!(
                        COMPONENT,
                        content_id = %request.content_id,
                        provider = %result.provider_id,
                        response_time_ms = result.response_time_ms,
                        "First result won the race"
                    );
                    return Ok(result);
                }
                successes.push(result);
            } else {
                component_debug!(
                    COMPONENT,
                    content_id = %request.content_id,
                    provider = %result.provider_id,
                    error = ?result.error,
                    "Provider attempt failed"
                );
            }
            first = false;
        }

        let best = successes.into_iter().max_by(|a, b| {
            a.quality_score
                .cmp(&b.quality_score)
                .then_with(|| b.response_time_ms.cmp(&a.response_time_ms))
        });

        match best {
            Some(result) => Ok(result),
            None => {
                component_warn!(
                    COMPONENT,
                    content_id = %request.content_id,
                    raced = selected.len(),
                    "Every selected provider failed, using fallback"
                );
                self.fallback(&request, started)
            }
        }
    }

    fn fallback(&self, request: &GenerationRequest, started: Instant) -> OrchestratorResult<GenerationResult> {
        self.stats.record_fallback();
        match self.fallback.generate(request) {
            Ok(payload) => Ok(GenerationResult::fallback(
                payload,
                started.elapsed(),
                self.settings.fallback_quality,
            )),
            Err(e) => Err(OrchestratorError::FallbackFailed {
                content_id: request.content_id.clone(),
                reason: e.to_string(),
            }),
        }
    }
}

#[async_trait]
impl<F> ImageGenerator for Orchestrator<F>
where
    F: FallbackGenerator + 'static,
{
    async fn generate(&self, request: GenerationRequest) -> OrchestratorResult<GenerationResult> {
        Orchestrator::generate(self, request).await
    }

    fn is_known(&self, fingerprint: &Fingerprint) -> bool {
        Orchestrator::is_known(self, fingerprint)
    }
}
