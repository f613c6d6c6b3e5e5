//! Selection policy: score available providers and pick the ones to race

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use shared::Priority;

use crate::types::ProviderDescriptor;

/// Tunable constants of the provider scoring formula
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub success_rate: f64,
    pub speed: f64,
    /// Latency (ms) that earns a speed term of exactly `speed`
    pub speed_reference_ms: f64,
    pub static_priority: f64,
    pub priority_ceiling: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            success_rate: 0.4,
            speed: 0.3,
            speed_reference_ms: 1000.0,
            static_priority: 0.03,
            priority_ceiling: 10.0,
        }
    }
}

/// Pure, deterministic provider selection
#[derive(Debug, Clone, Default)]
pub struct SelectionPolicy {
    weights: ScoringWeights,
}

impl SelectionPolicy {
    pub fn new(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    /// `w_s * success_rate + w_v * (ref_ms / avg_ms) + w_p * (ceiling - priority)`
    pub fn score(&self, provider: &ProviderDescriptor) -> f64 {
        let w = &self.weights;
        let avg_ms = provider.avg_response_time_ms.max(1.0);
        w.success_rate * provider.success_rate
            + w.speed * (w.speed_reference_ms / avg_ms)
            + w.static_priority * (w.priority_ceiling - provider.priority as f64)
    }

    /// Best-scoring providers first, truncated to the priority's race width
    pub fn select(&self, available: &[ProviderDescriptor], priority: Priority) -> Vec<ProviderDescriptor> {
        let mut scored: Vec<(f64, &ProviderDescriptor)> = available.iter().map(|p| (self.score(p), p)).collect();

        scored.sort_by(|(score_a, a), (score_b, b)| {
            score_b
                .partial_cmp(score_a)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.priority.cmp(&b.priority))
                .then_with(|| a.id.cmp(&b.id))
        });

        scored
            .into_iter()
            .take(priority.race_width())
            .map(|(_, p)| p.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::ProviderId;
    use std::time::Duration;

    fn descriptor(id: &str, success_rate: f64, avg_ms: f64, priority: u32) -> ProviderDescriptor {
        ProviderDescriptor {
            id: ProviderId::from(id),
            name: id.to_string(),
            priority,
            max_concurrent: 4,
            timeout: Duration::from_secs(5),
            is_active: true,
            current_load: 0,
            success_rate,
            avg_response_time_ms: avg_ms,
            total_requests: 0,
            failed_requests: 0,
            last_error: None,
        }
    }

    #[test]
    fn test_empty_input_selects_nothing() {
        let policy = SelectionPolicy::default();
        assert!(policy.select(&[], Priority::Urgent).is_empty());
    }

    #[test]
    fn test_race_width_by_priority() {
        let policy = SelectionPolicy::default();
        let providers = vec![
            descriptor("a", 0.9, 500.0, 1),
            descriptor("b", 0.9, 600.0, 1),
            descriptor("c", 0.9, 700.0, 1),
            descriptor("d", 0.9, 800.0, 1),
        ];

        assert_eq!(policy.select(&providers, Priority::Low).len(), 1);
        assert_eq!(policy.select(&providers, Priority::Normal).len(), 1);
        assert_eq!(policy.select(&providers, Priority::High).len(), 2);

        let urgent: Vec<_> = policy
            .select(&providers, Priority::Urgent)
            .into_iter()
            .map(|p| p.id.to_string())
            .collect();
        assert_eq!(urgent, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_ties_break_on_static_priority_then_id() {
        let policy = SelectionPolicy::new(ScoringWeights {
            static_priority: 0.0,
            ..Default::default()
        });
        let providers = vec![
            descriptor("zeta", 0.8, 1000.0, 1),
            descriptor("beta", 0.8, 1000.0, 2),
            descriptor("alpha", 0.8, 1000.0, 1),
        ];

        let order: Vec<_> = policy
            .select(&providers, Priority::Urgent)
            .into_iter()
            .map(|p| p.id.to_string())
            .collect();
        assert_eq!(order, vec!["alpha", "zeta", "beta"]);
    }

    #[test]
    fn test_zero_latency_does_not_divide_by_zero() {
        let policy = SelectionPolicy::default();
        let score = policy.score(&descriptor("instant", 1.0, 0.0, 0));
        assert!(score.is_finite());
    }
}
