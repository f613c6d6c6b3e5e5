//! Aggregate request statistics reported in status snapshots

use parking_lot::Mutex;
use shared::PerformanceStatus;

/// Running totals across every request the orchestrator has answered
#[derive(Debug, Default)]
pub struct PerformanceStats {
    inner: Mutex<Totals>,
}

#[derive(Debug, Default, Clone, Copy)]
struct Totals {
    total_requests: u64,
    successes: u64,
    total_time_ms: u64,
    cache_hits: u64,
    fallbacks: u64,
}

impl PerformanceStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one answered request
    pub fn record_request(&self, success: bool, response_time_ms: u64) {
        let mut totals = self.inner.lock();
        totals.total_requests += 1;
        totals.total_time_ms = totals.total_time_ms.saturating_add(response_time_ms);
        if success {
            totals.successes += 1;
        }
    }

    pub fn record_cache_hit(&self) {
        self.inner.lock().cache_hits += 1;
    }

    pub fn record_fallback(&self) {
        self.inner.lock().fallbacks += 1;
    }

    pub fn snapshot(&self) -> PerformanceStatus {
        let totals = *self.inner.lock();
        let (average_time_ms, success_rate) = if totals.total_requests == 0 {
            (0.0, 1.0)
        } else {
            let n = totals.total_requests as f64;
            (totals.total_time_ms as f64 / n, totals.successes as f64 / n)
        };

        PerformanceStatus {
            total_requests: totals.total_requests,
            average_time_ms,
            success_rate,
            cache_hits: totals.cache_hits,
            fallbacks: totals.fallbacks,
        }
    }
}
