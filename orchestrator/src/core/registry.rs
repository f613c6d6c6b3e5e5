//! Provider registry: the roster of backend providers and their live metrics
//!
//! The registry is built once at startup and never shrinks; providers are
//! only deactivated. Each provider has its own lock for EMA metrics and
//! atomics for load and activity, so concurrent callers for different
//! providers never contend.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use shared::{component_debug, component_warn, ProviderId};

use crate::error::{OrchestratorError, OrchestratorResult};
use crate::traits::ImageProvider;
use crate::types::{GenerationResult, ProviderDescriptor};

const COMPONENT: &str = "registry";

/// Default smoothing factor for success rate and latency averages
pub const DEFAULT_EMA_ALPHA: f64 = 0.1;

/// Static configuration of one provider
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderSettings {
    pub name: String,
    /// Static tie-break, lower is preferred
    pub priority: u32,
    pub max_concurrent: u32,
    pub timeout: Duration,
    pub initial_success_rate: f64,
    pub initial_response_time_ms: f64,
}

impl ProviderSettings {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_max_concurrent(mut self, max_concurrent: u32) -> Self {
        self.max_concurrent = max_concurrent;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_initial_metrics(mut self, success_rate: f64, response_time_ms: f64) -> Self {
        self.initial_success_rate = success_rate;
        self.initial_response_time_ms = response_time_ms;
        self
    }
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            name: String::new(),
            priority: 5,
            max_concurrent: 4,
            timeout: Duration::from_secs(15),
            initial_success_rate: 1.0,
            initial_response_time_ms: 2000.0,
        }
    }
}

#[derive(Debug, Clone)]
struct ProviderMetrics {
    success_rate: f64,
    avg_response_time_ms: f64,
    total_requests: u64,
    failed_requests: u64,
    last_error: Option<String>,
}

struct ProviderSlot {
    id: ProviderId,
    provider: Arc<dyn ImageProvider>,
    settings: ProviderSettings,
    is_active: AtomicBool,
    current_load: AtomicU32,
    metrics: Mutex<ProviderMetrics>,
}

impl ProviderSlot {
    fn descriptor(&self) -> ProviderDescriptor {
        let metrics = self.metrics.lock().clone();
        ProviderDescriptor {
            id: self.id.clone(),
            name: self.settings.name.clone(),
            priority: self.settings.priority,
            max_concurrent: self.settings.max_concurrent,
            timeout: self.settings.timeout,
            is_active: self.is_active.load(Ordering::Acquire),
            current_load: self.current_load.load(Ordering::Acquire),
            success_rate: metrics.success_rate,
            avg_response_time_ms: metrics.avg_response_time_ms,
            total_requests: metrics.total_requests,
            failed_requests: metrics.failed_requests,
            last_error: metrics.last_error,
        }
    }
}

/// One unit of provider load. Dropping the guard releases it.
pub struct LoadGuard {
    slot: Arc<ProviderSlot>,
}

impl LoadGuard {
    pub fn provider_id(&self) -> &ProviderId {
        &self.slot.id
    }
}

impl Drop for LoadGuard {
    fn drop(&mut self) {
        self.slot.current_load.fetch_sub(1, Ordering::AcqRel);
    }
}

impl std::fmt::Debug for LoadGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadGuard").field("provider", &self.slot.id).finish()
    }
}

/// Roster of providers with health and performance metrics
pub struct ProviderRegistry {
    slots: Vec<Arc<ProviderSlot>>,
    index: HashMap<ProviderId, usize>,
    ema_alpha: f64,
}

impl ProviderRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            index: HashMap::new(),
            ema_alpha: DEFAULT_EMA_ALPHA,
        }
    }

    pub fn with_ema_alpha(mut self, alpha: f64) -> Self {
        self.ema_alpha = alpha.clamp(0.0, 1.0);
        self
    }

    /// Add a provider at startup
    pub fn register(&mut self, provider: Arc<dyn ImageProvider>, settings: ProviderSettings) -> OrchestratorResult<()> {
        let id = provider.id().clone();
        if self.index.contains_key(&id) {
            return Err(OrchestratorError::config(
                format!("providers.{id}"),
                "provider registered twice",
            ));
        }
        if settings.max_concurrent == 0 {
            return Err(OrchestratorError::config(
                format!("providers.{id}.max_concurrent"),
                "must be at least 1",
            ));
        }
        if settings.timeout.is_zero() {
            return Err(OrchestratorError::config(format!("providers.{id}.timeout_ms"), "must be non-zero"));
        }

        let metrics = ProviderMetrics {
            success_rate: settings.initial_success_rate.clamp(0.0, 1.0),
            avg_response_time_ms: settings.initial_response_time_ms.max(1.0),
            total_requests: 0,
            failed_requests: 0,
            last_error: None,
        };

        self.index.insert(id.clone(), self.slots.len());
        self.slots.push(Arc::new(ProviderSlot {
            id,
            provider,
            settings,
            is_active: AtomicBool::new(true),
            current_load: AtomicU32::new(0),
            metrics: Mutex::new(metrics),
        }));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn slot(&self, id: &ProviderId) -> Option<&Arc<ProviderSlot>> {
        self.index.get(id).map(|&i| &self.slots[i])
    }

    /// Backend implementation for a provider
    pub fn provider(&self, id: &ProviderId) -> Option<Arc<dyn ImageProvider>> {
        self.slot(id).map(|slot| slot.provider.clone())
    }

    /// Providers that are active and below their concurrency limit
    pub fn list_available(&self) -> Vec<ProviderDescriptor> {
        self.slots
            .iter()
            .map(|slot| slot.descriptor())
            .filter(|d| d.is_active && d.has_capacity())
            .collect()
    }

    /// Every registered provider in registration order
    pub fn descriptors(&self) -> Vec<ProviderDescriptor> {
        self.slots.iter().map(|slot| slot.descriptor()).collect()
    }

    pub fn descriptor(&self, id: &ProviderId) -> Option<ProviderDescriptor> {
        self.slot(id).map(|slot| slot.descriptor())
    }

    /// Reserve one unit of load, refusing when the provider is full
    pub fn try_acquire(&self, id: &ProviderId) -> Option<LoadGuard> {
        let slot = self.slot(id)?;
        let max = slot.settings.max_concurrent;
        slot.current_load
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |load| (load < max).then_some(load + 1))
            .ok()
            .map(|_| LoadGuard { slot: slot.clone() })
    }

    /// Fold one call outcome into the provider's moving averages
    pub fn record_outcome(&self, id: &ProviderId, success: bool, response_time_ms: u64) {
        let Some(slot) = self.slot(id) else {
            component_warn!(COMPONENT, provider = %id, "Outcome recorded for unknown provider");
            return;
        };

        let alpha = self.ema_alpha;
        let mut metrics = slot.metrics.lock();
        let observed = if success { 1.0 } else { 0.0 };
        metrics.success_rate = (1.0 - alpha) * metrics.success_rate + alpha * observed;
        metrics.avg_response_time_ms =
            ((1.0 - alpha) * metrics.avg_response_time_ms + alpha * response_time_ms as f64).max(1.0);
        metrics.total_requests += 1;
        if !success {
            metrics.failed_requests += 1;
        }
    }

    /// Record a full adapter result, keeping the failure reason for status output
    pub fn record_result(&self, result: &GenerationResult) {
        self.record_outcome(&result.provider_id, result.success, result.response_time_ms);
        if let (Some(error), Some(slot)) = (&result.error, self.slot(&result.provider_id)) {
            slot.metrics.lock().last_error = Some(error.to_string());
        }
    }

    pub fn set_active(&self, id: &ProviderId, active: bool) {
        if let Some(slot) = self.slot(id) {
            let was_active = slot.is_active.swap(active, Ordering::AcqRel);
            if was_active != active {
                if active {
                    component_debug!(COMPONENT, provider = %id, "Provider reactivated");
                } else {
                    component_warn!(COMPONENT, provider = %id, "Provider deactivated");
                }
            }
        }
    }

    /// Probe every provider and update `is_active`. Never fails.
    pub async fn run_health_check(&self) {
        let probes = self.slots.iter().map(|slot| async move {
            let healthy = tokio::time::timeout(slot.settings.timeout, slot.provider.health_check())
                .await
                .unwrap_or(false);
            (slot.id.clone(), healthy)
        });

        for (id, healthy) in futures::future::join_all(probes).await {
            self.set_active(&id, healthy);
        }
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}
