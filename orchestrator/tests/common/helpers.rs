//! Test helpers and builder patterns for orchestrator tests
//!
//! [`ScriptedProvider`] stands in for a real backend: it waits a fixed
//! delay, then returns a fixed outcome, counting calls and the peak number
//! of concurrent calls it has seen.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use shared::{ProviderFailure, ProviderId};

use orchestrator::services::LocalFallbackGenerator;
use orchestrator::{
    ImageProvider, Orchestrator, OrchestratorResult, OrchestratorSettings, Payload, PromptPayload, ProviderOutput,
    ProviderRegistry, ProviderSettings, ResultCache, ScoringWeights, SelectionPolicy,
};

use super::fixtures::TestFixtures;

pub type TestOrchestrator = Orchestrator<LocalFallbackGenerator>;

pub struct ScriptedProvider {
    id: ProviderId,
    delay: Duration,
    outcome: Result<ProviderOutput, ProviderFailure>,
    healthy: AtomicBool,
    calls: AtomicUsize,
    running: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedProvider {
    pub fn succeeding(id: &str, delay: Duration, quality: u8) -> Arc<Self> {
        Self::with_outcome(
            id,
            delay,
            Ok(ProviderOutput {
                payload: Payload::url(format!("https://cdn.example.com/{id}.png")),
                quality_score: Some(quality),
            }),
        )
    }

    pub fn failing(id: &str, delay: Duration, failure: ProviderFailure) -> Arc<Self> {
        Self::with_outcome(id, delay, Err(failure))
    }

    pub fn with_outcome(id: &str, delay: Duration, outcome: Result<ProviderOutput, ProviderFailure>) -> Arc<Self> {
        Arc::new(Self {
            id: ProviderId::from(id),
            delay,
            outcome,
            healthy: AtomicBool::new(true),
            calls: AtomicUsize::new(0),
            running: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }
}

/// Decrements the running count even when the call is cancelled mid-sleep
struct Running<'a>(&'a AtomicUsize);

impl Drop for Running<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ImageProvider for ScriptedProvider {
    fn id(&self) -> &ProviderId {
        &self.id
    }

    async fn generate(&self, _prompt: &PromptPayload) -> Result<ProviderOutput, ProviderFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now_running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        let _running = Running(&self.running);
        self.peak.fetch_max(now_running, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.outcome.clone()
    }

    async fn health_check(&self) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }
}

/// Builder pattern for creating test orchestrators with sensible defaults
pub struct OrchestratorBuilder {
    providers: Vec<(Arc<ScriptedProvider>, ProviderSettings)>,
    cache_ttl: Duration,
    weights: ScoringWeights,
    settings: OrchestratorSettings,
}

impl OrchestratorBuilder {
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
            cache_ttl: Duration::from_secs(3600),
            weights: ScoringWeights::default(),
            settings: OrchestratorSettings::default(),
        }
    }

    /// Register a provider with default settings
    pub fn with_provider(self, provider: Arc<ScriptedProvider>) -> Self {
        let name = provider.id().to_string();
        self.with_provider_settings(provider, ProviderSettings::new(name))
    }

    pub fn with_provider_settings(mut self, provider: Arc<ScriptedProvider>, settings: ProviderSettings) -> Self {
        self.providers.push((provider, settings));
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn with_weights(mut self, weights: ScoringWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn with_fallback_quality(mut self, quality: u8) -> Self {
        self.settings.fallback_quality = quality;
        self
    }

    pub fn try_build(self) -> OrchestratorResult<TestOrchestrator> {
        let mut registry = ProviderRegistry::new();
        for (provider, settings) in self.providers {
            let provider: Arc<dyn ImageProvider> = provider;
            registry.register(provider, settings)?;
        }

        Orchestrator::new(
            Arc::new(registry),
            SelectionPolicy::new(self.weights),
            Arc::new(ResultCache::new(self.cache_ttl)),
            LocalFallbackGenerator::new(),
            self.settings,
        )
    }

    pub fn build(self) -> TestOrchestrator {
        self.try_build().expect("test orchestrator should build")
    }
}

impl Default for OrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Common test scenarios and assertions
pub struct TestHelpers;

impl TestHelpers {
    /// One fast provider that always succeeds
    pub fn single_provider_orchestrator(delay: Duration) -> (TestOrchestrator, Arc<ScriptedProvider>) {
        let provider = ScriptedProvider::succeeding(TestFixtures::ALPHA, delay, 80);
        let orchestrator = OrchestratorBuilder::new().with_provider(provider.clone()).build();
        (orchestrator, provider)
    }

    /// Registry view of a provider, by id
    pub fn descriptor(orchestrator: &TestOrchestrator, id: &str) -> orchestrator::ProviderDescriptor {
        orchestrator
            .registry()
            .descriptor(&ProviderId::from(id))
            .expect("provider should be registered")
    }

    pub fn assert_load_released(orchestrator: &TestOrchestrator) {
        for descriptor in orchestrator.registry().descriptors() {
            assert_eq!(descriptor.current_load, 0, "load leaked on {}", descriptor.id);
        }
    }
}
