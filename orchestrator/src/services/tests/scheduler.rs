//! Tests for PreGenerationScheduler

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use mockall::predicate::always;
use shared::{Priority, ProviderId, SemanticPayload, VisibilitySignal};
use tokio_util::sync::CancellationToken;

use super::common::test_request;
use crate::config::{OrchestratorConfig, ENV_SCHEDULER_MAX_CONCURRENT};
use crate::error::OrchestratorError;
use crate::services::scheduler::{recency_score, PreGenerationScheduler, ScheduleOutcome, SchedulerSettings};
use crate::traits::MockImageGenerator;
use crate::types::{GenerationRequest, GenerationResult, Payload};

fn settings(capacity: usize, max_concurrent: usize) -> SchedulerSettings {
    SchedulerSettings {
        capacity,
        max_concurrent,
        retry_delay_ms: 0,
        drain_interval_ms: 10,
        ..Default::default()
    }
}

fn unknown_generator() -> MockImageGenerator {
    let mut generator = MockImageGenerator::new();
    generator.expect_is_known().returning(|_| false);
    generator
}

fn published_hours_ago(content_id: &str, hours: i64) -> GenerationRequest {
    let mut request = test_request(content_id);
    request.payload.published_at = Some(Utc::now() - chrono::Duration::hours(hours));
    request
}

fn ok_result() -> GenerationResult {
    GenerationResult::success(ProviderId::from("alpha"), Payload::url("https://img/1.png"), Duration::from_millis(5), 80)
}

/// Test the recency formula
#[test]
fn test_recency_score() {
    let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();

    assert_eq!(recency_score(None, now), 0.0);
    assert_eq!(recency_score(Some(now), now), 100.0);
    assert_eq!(recency_score(Some(now - chrono::Duration::hours(10)), now), 80.0);
    assert_eq!(recency_score(Some(now - chrono::Duration::hours(60)), now), 0.0);
    assert_eq!(recency_score(Some(now + chrono::Duration::hours(3)), now), 100.0);
}

/// Test the category bonus is added to recency
#[test]
fn test_category_bonus() {
    let mut settings = settings(10, 1);
    settings.category_bonus.insert("tech".to_string(), 15.0);
    let scheduler = PreGenerationScheduler::new(Arc::new(unknown_generator()), settings);
    let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();

    let mut request = test_request("post-1");
    request.payload.category = "Tech".to_string();
    request.payload.published_at = Some(now - chrono::Duration::hours(5));

    assert_eq!(scheduler.score_at(&request, now), 105.0);
}

/// Test duplicate and already-known requests are no-ops
#[test]
fn test_schedule_dedup() {
    // Arrange
    let known = test_request("known").fingerprint();
    let mut generator = MockImageGenerator::new();
    generator.expect_is_known().returning(move |fp| *fp == known);
    let scheduler = PreGenerationScheduler::new(Arc::new(generator), settings(10, 1));

    // Act / Assert
    assert_eq!(scheduler.schedule(test_request("post-1")), ScheduleOutcome::Queued);
    assert_eq!(
        scheduler.schedule(test_request("post-1").with_priority(Priority::Urgent)),
        ScheduleOutcome::AlreadyQueued
    );
    assert_eq!(scheduler.schedule(test_request("known")), ScheduleOutcome::AlreadyKnown);
    assert_eq!(scheduler.pending(), 1);
}

/// Test overflow evicts the lowest entry or rejects a lower newcomer
#[test]
fn test_overflow_eviction() {
    let scheduler = PreGenerationScheduler::new(Arc::new(unknown_generator()), settings(2, 1));

    assert_eq!(scheduler.schedule(published_hours_ago("fresh", 0)), ScheduleOutcome::Queued);
    assert_eq!(scheduler.schedule(published_hours_ago("older", 10)), ScheduleOutcome::Queued);

    // scores ~40 against a queue minimum of ~80
    assert_eq!(scheduler.schedule(published_hours_ago("stale", 30)), ScheduleOutcome::Rejected);
    assert_eq!(scheduler.pending(), 2);

    // ~90 beats "older", which is evicted
    assert_eq!(scheduler.schedule(published_hours_ago("recent", 5)), ScheduleOutcome::Queued);
    assert_eq!(scheduler.pending(), 2);
    assert_eq!(scheduler.schedule(published_hours_ago("older", 10)), ScheduleOutcome::Rejected);
    assert_eq!(scheduler.schedule(published_hours_ago("recent", 5)), ScheduleOutcome::AlreadyQueued);
}

/// Test drains respect the concurrency budget and run at low priority
#[tokio::test]
async fn test_drain_respects_concurrency() {
    // Arrange
    let mut generator = unknown_generator();
    generator
        .expect_generate()
        .withf(|request| request.priority == Priority::Low)
        .times(3)
        .returning(|_| Ok(ok_result()));
    let scheduler = PreGenerationScheduler::new(Arc::new(generator), settings(10, 2));
    for id in ["a", "b", "c"] {
        scheduler.schedule(test_request(id).with_priority(Priority::High));
    }

    // Act
    let first = scheduler.drain_once();

    // Assert
    assert_eq!(first, 2);
    assert_eq!(scheduler.pending(), 1);

    // permits come back once the running jobs finish
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(scheduler.drain_once(), 1);
    scheduler.shutdown().await;
}

/// Test the configured concurrency override reaches the scheduler
#[tokio::test]
async fn test_from_config_uses_scheduler_section() {
    // Arrange
    let mut config = OrchestratorConfig::default();
    config
        .apply_overrides(|key| (key == ENV_SCHEDULER_MAX_CONCURRENT).then(|| "3".to_string()))
        .unwrap();
    config.scheduler.retry_delay_ms = 0;
    let mut generator = unknown_generator();
    generator.expect_generate().times(4).returning(|_| Ok(ok_result()));
    let scheduler = PreGenerationScheduler::from_config(Arc::new(generator), &config);
    for id in ["a", "b", "c", "d"] {
        scheduler.schedule(test_request(id));
    }

    // Act
    let started = scheduler.drain_once();

    // Assert
    assert_eq!(scheduler.settings().max_concurrent, 3);
    assert_eq!(started, 3);
    assert_eq!(scheduler.pending(), 1);

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(scheduler.drain_once(), 1);
    scheduler.shutdown().await;
}

/// Test the freshest request is drained first
#[tokio::test]
async fn test_drain_order_by_score() {
    let mut generator = unknown_generator();
    generator
        .expect_generate()
        .withf(|request| request.content_id.as_str() == "fresh")
        .times(1)
        .returning(|_| Ok(ok_result()));
    let scheduler = PreGenerationScheduler::new(Arc::new(generator), settings(10, 1));
    scheduler.schedule(published_hours_ago("old", 20));
    scheduler.schedule(published_hours_ago("fresh", 1));

    assert_eq!(scheduler.drain_once(), 1);
    assert_eq!(scheduler.pending(), 1);
    scheduler.shutdown().await;
}

/// Test failures are retried at most twice and then swallowed
#[tokio::test]
async fn test_failures_retried_then_swallowed() {
    let mut generator = unknown_generator();
    generator
        .expect_generate()
        .with(always())
        .times(2)
        .returning(|request| {
            Err(OrchestratorError::FallbackFailed {
                content_id: request.content_id,
                reason: "nothing to render".to_string(),
            })
        });
    let scheduler = PreGenerationScheduler::new(Arc::new(generator), settings(10, 1));
    scheduler.schedule(test_request("post-1"));

    assert_eq!(scheduler.drain_once(), 1);
    scheduler.shutdown().await;

    assert_eq!(scheduler.pending(), 0);
}

/// Test visibility signals enter the queue
#[test]
fn test_on_visible() {
    let scheduler = PreGenerationScheduler::new(Arc::new(unknown_generator()), settings(10, 1));
    let signal = VisibilitySignal {
        content_id: "post-9".into(),
        payload: SemanticPayload {
            title: "Visible".to_string(),
            ..Default::default()
        },
    };

    assert_eq!(scheduler.on_visible(signal.clone()), ScheduleOutcome::Queued);
    assert_eq!(scheduler.on_visible(signal), ScheduleOutcome::AlreadyQueued);
}

/// Test the run loop drains until cancelled
#[tokio::test]
async fn test_run_until_cancelled() {
    let mut generator = unknown_generator();
    generator.expect_generate().times(1).returning(|_| Ok(ok_result()));
    let scheduler = Arc::new(PreGenerationScheduler::new(Arc::new(generator), settings(10, 1)));
    scheduler.schedule(test_request("post-1"));
    let cancel = CancellationToken::new();

    let handle = tokio::spawn({
        let scheduler = scheduler.clone();
        let cancel = cancel.clone();
        async move { scheduler.run(cancel).await }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    cancel.cancel();
    handle.await.unwrap();
    scheduler.shutdown().await;

    assert_eq!(scheduler.pending(), 0);
}
