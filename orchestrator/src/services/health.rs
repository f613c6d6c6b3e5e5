//! Periodic health probing and cache housekeeping

use std::sync::Arc;
use std::time::Duration;

use shared::{component_debug, component_info};
use tokio_util::sync::CancellationToken;

use crate::core::{ProviderRegistry, ResultCache};

const COMPONENT: &str = "health";

pub struct HealthMonitor {
    registry: Arc<ProviderRegistry>,
    cache: Arc<ResultCache>,
    interval: Duration,
}

impl HealthMonitor {
    pub fn new(registry: Arc<ProviderRegistry>, cache: Arc<ResultCache>, interval: Duration) -> Self {
        Self {
            registry,
            cache,
            interval,
        }
    }

    /// Probe every provider and drop expired cache entries
    pub async fn tick(&self) {
        self.registry.run_health_check().await;
        let purged = self.cache.purge_expired();

        let active = self.registry.descriptors().iter().filter(|d| d.is_active).count();
        component_debug!(
            COMPONENT,
            active,
            registered = self.registry.len(),
            purged,
            "Health check complete"
        );
    }

    /// Tick every `interval` until `cancel` fires. The first tick waits one interval.
    pub async fn run(&self, cancel: CancellationToken) {
        component_info!(COMPONENT, interval_ms = self.interval.as_millis() as u64, "Health monitor started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    component_info!(COMPONENT, "Health monitor stopped");
                    return;
                }
                _ = tokio::time::sleep(self.interval) => {
                    self.tick().await;
                }
            }
        }
    }
}
