//! Provider adapter: one uniform, bounded, load-accounted call to a backend

use std::sync::Arc;
use std::time::Duration;

use shared::{component_debug, ProviderFailure, ProviderId};
use tokio::time::Instant;

use crate::core::registry::ProviderRegistry;
use crate::types::{GenerationResult, PromptPayload};

const COMPONENT: &str = "adapter";

/// Quality assumed when a provider does not report one
pub const DEFAULT_PROVIDER_QUALITY: u8 = 75;

/// Wraps a registered provider with its own timeout and load accounting.
///
/// Expected failures (backend errors, timeouts, capacity refusals) come back
/// as unsuccessful [`GenerationResult`]s; nothing is returned as an error.
#[derive(Clone)]
pub struct ProviderAdapter {
    registry: Arc<ProviderRegistry>,
    provider_id: ProviderId,
}

impl ProviderAdapter {
    pub fn new(registry: Arc<ProviderRegistry>, provider_id: ProviderId) -> Self {
        Self { registry, provider_id }
    }

    pub fn provider_id(&self) -> &ProviderId {
        &self.provider_id
    }

    /// Call the backend, bounded by `timeout`
    pub async fn generate(&self, prompt: &PromptPayload, timeout: Duration) -> GenerationResult {
        let started = Instant::now();

        let Some(provider) = self.registry.provider(&self.provider_id) else {
            return GenerationResult::failure(
                self.provider_id.clone(),
                ProviderFailure::ServiceUnavailable,
                started.elapsed(),
            );
        };

        // released on every exit path, including cancellation of this future
        let Some(_load) = self.registry.try_acquire(&self.provider_id) else {
            component_debug!(COMPONENT, provider = %self.provider_id, "Provider at capacity");
            return GenerationResult::failure(self.provider_id.clone(), ProviderFailure::AtCapacity, started.elapsed());
        };

        match tokio::time::timeout(timeout, provider.generate(prompt)).await {
            Ok(Ok(output)) => GenerationResult::success(
                self.provider_id.clone(),
                output.payload,
                started.elapsed(),
                output.quality_score.unwrap_or(DEFAULT_PROVIDER_QUALITY),
            ),
            Ok(Err(failure)) => {
                component_debug!(COMPONENT, provider = %self.provider_id, error = %failure, "Provider call failed");
                GenerationResult::failure(self.provider_id.clone(), failure, started.elapsed())
            }
            Err(_) => {
                component_debug!(
                    COMPONENT,
                    provider = %self.provider_id,
                    timeout_ms = timeout.as_millis() as u64,
                    "Provider call timed out"
                );
                GenerationResult::failure(
                    self.provider_id.clone(),
                    ProviderFailure::Timeout {
                        after_ms: timeout.as_millis() as u64,
                    },
                    started.elapsed(),
                )
            }
        }
    }
}
