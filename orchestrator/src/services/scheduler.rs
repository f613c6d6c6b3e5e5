//! Pre-generation scheduler
//!
//! Background queue that warms the cache for content that is likely to be
//! shared soon. Requests are scored by recency and category, kept in a
//! bounded queue and drained at low priority through the generator with a
//! small concurrency budget. Nothing here ever surfaces an error to an
//! interactive caller.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use shared::{component_debug, component_info, component_warn, Priority, VisibilitySignal};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::config::OrchestratorConfig;
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::traits::ImageGenerator;
use crate::types::{Fingerprint, GenerationRequest};

const COMPONENT: &str = "scheduler";

/// Scheduler tunables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    pub max_concurrent: usize,
    pub capacity: usize,
    /// Total attempts per queued request, first try included
    pub max_attempts: u32,
    pub drain_interval_ms: u64,
    pub retry_delay_ms: u64,
    /// Score bonus per lowercase category name
    pub category_bonus: HashMap<String, f64>,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            max_concurrent: 2,
            capacity: 50,
            max_attempts: 2,
            drain_interval_ms: 1_000,
            retry_delay_ms: 500,
            category_bonus: HashMap::new(),
        }
    }
}

impl SchedulerSettings {
    pub fn validate(&self) -> OrchestratorResult<()> {
        if self.max_concurrent == 0 {
            return Err(OrchestratorError::config("scheduler.max_concurrent", "must be at least 1"));
        }
        if self.capacity == 0 {
            return Err(OrchestratorError::config("scheduler.capacity", "must be at least 1"));
        }
        if self.max_attempts == 0 {
            return Err(OrchestratorError::config("scheduler.max_attempts", "must be at least 1"));
        }
        if self.drain_interval_ms == 0 {
            return Err(OrchestratorError::config("scheduler.drain_interval_ms", "must be non-zero"));
        }
        Ok(())
    }
}

/// What `schedule` did with a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleOutcome {
    Queued,
    /// Already cached or being generated
    AlreadyKnown,
    AlreadyQueued,
    /// Queue full and the request scored lowest
    Rejected,
}

#[derive(Debug, Clone)]
struct QueuedRequest {
    request: GenerationRequest,
    fingerprint: Fingerprint,
    score: f64,
    seq: u64,
}

/// `max(0, 100 - 2 * age_hours)`; unknown publish time scores 0
pub fn recency_score(published_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f64 {
    match published_at {
        None => 0.0,
        Some(published) => {
            let age_hours = (now - published).num_seconds().max(0) as f64 / 3600.0;
            (100.0 - 2.0 * age_hours).max(0.0)
        }
    }
}

pub struct PreGenerationScheduler<G>
where
    G: ImageGenerator + 'static,
{
    generator: Arc<G>,
    settings: SchedulerSettings,
    queue: Mutex<Vec<QueuedRequest>>,
    permits: Arc<Semaphore>,
    tracker: TaskTracker,
    seq: AtomicU64,
}

impl<G> PreGenerationScheduler<G>
where
    G: ImageGenerator + 'static,
{
    pub fn new(generator: Arc<G>, settings: SchedulerSettings) -> Self {
        let permits = Arc::new(Semaphore::new(settings.max_concurrent));
        Self {
            generator,
            settings,
            queue: Mutex::new(Vec::new()),
            permits,
            tracker: TaskTracker::new(),
            seq: AtomicU64::new(0),
        }
    }

    /// Build with the `scheduler` section of a loaded configuration
    pub fn from_config(generator: Arc<G>, config: &OrchestratorConfig) -> Self {
        Self::new(generator, config.scheduler.clone())
    }

    pub fn settings(&self) -> &SchedulerSettings {
        &self.settings
    }

    /// Priority score of a request at `now`
    pub fn score_at(&self, request: &GenerationRequest, now: DateTime<Utc>) -> f64 {
        let bonus = self
            .settings
            .category_bonus
            .get(&request.payload.category.to_lowercase())
            .copied()
            .unwrap_or(0.0);
        recency_score(request.payload.published_at, now) + bonus
    }

    /// Queue a speculative request
    pub fn schedule(&self, request: GenerationRequest) -> ScheduleOutcome {
        let request = request.with_priority(Priority::Low);
        let fingerprint = request.fingerprint();

        if self.generator.is_known(&fingerprint) {
            return ScheduleOutcome::AlreadyKnown;
        }

        let score = self.score_at(&request, Utc::now());
        let mut queue = self.queue.lock();

        if queue.iter().any(|queued| queued.fingerprint == fingerprint) {
            return ScheduleOutcome::AlreadyQueued;
        }

        if queue.len() >= self.settings.capacity {
            // lowest score, oldest among ties
            let lowest = queue
                .iter()
                .enumerate()
                .min_by(|(_, a), (_, b)| a.score.total_cmp(&b.score).then(a.seq.cmp(&b.seq)))
                .map(|(i, queued)| (i, queued.score));

            if let Some((index, lowest_score)) = lowest {
                if score < lowest_score {
                    component_debug!(COMPONENT, content_id = %request.content_id, score, "Queue full, request rejected");
                    return ScheduleOutcome::Rejected;
                }
                let evicted = queue.swap_remove(index);
                component_debug!(
                    COMPONENT,
                    evicted = %evicted.request.content_id,
                    evicted_score = evicted.score,
                    "Queue full, evicted lowest entry"
                );
            }
        }

        component_debug!(COMPONENT, content_id = %request.content_id, score, "Request queued");
        queue.push(QueuedRequest {
            request,
            fingerprint,
            score,
            seq: self.seq.fetch_add(1, Ordering::Relaxed),
        });
        ScheduleOutcome::Queued
    }

    /// Entry point for "content became visible" signals
    pub fn on_visible(&self, signal: VisibilitySignal) -> ScheduleOutcome {
        self.schedule(GenerationRequest::new(signal.content_id, signal.payload))
    }

    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    fn pop_best(&self) -> Option<QueuedRequest> {
        let mut queue = self.queue.lock();
        let best = queue
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.score.total_cmp(&b.score).then(b.seq.cmp(&a.seq)))
            .map(|(i, _)| i)?;
        Some(queue.swap_remove(best))
    }

    /// Start as many queued requests as there are free permits; returns how many started
    pub fn drain_once(&self) -> usize {
        let mut started = 0;
        loop {
            let Ok(permit) = self.permits.clone().try_acquire_owned() else {
                break;
            };
            let Some(queued) = self.pop_best() else {
                break;
            };

            let generator = self.generator.clone();
            let max_attempts = self.settings.max_attempts;
            let retry_delay = Duration::from_millis(self.settings.retry_delay_ms);

            self.tracker.spawn(async move {
                let _permit = permit;
                let content_id = queued.request.content_id.clone();
                for attempt in 1..=max_attempts {
                    match generator.generate(queued.request.clone()).await {
                        Ok(result) => {
                            component_debug!(
                                COMPONENT,
                                content_id = %content_id,
                                provider = %result.provider_id,
                                attempt,
                                "Pre-generation finished"
                            );
                            return;
                        }
                        Err(e) => {
                            component_warn!(COMPONENT, content_id = %content_id, attempt, error = %e, "Pre-generation failed");
                            if attempt < max_attempts {
                                tokio::time::sleep(retry_delay).await;
                            }
                        }
                    }
                }
            });
            started += 1;
        }
        started
    }

    /// Drain on a fixed interval until cancelled
    pub async fn run(&self, cancel: CancellationToken) {
        let interval = Duration::from_millis(self.settings.drain_interval_ms);
        component_info!(
            COMPONENT,
            interval_ms = self.settings.drain_interval_ms,
            max_concurrent = self.settings.max_concurrent,
            "Pre-generation scheduler started"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    component_info!(COMPONENT, pending = self.pending(), "Pre-generation scheduler stopped");
                    return;
                }
                _ = tokio::time::sleep(interval) => {
                    self.drain_once();
                }
            }
        }
    }

    /// Wait for running jobs; queued requests that never started are dropped
    pub async fn shutdown(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.queue.lock().clear();
    }
}
