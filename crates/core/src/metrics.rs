//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Broker consumption (deliveries, acks, reconnects)
//! - Task lifecycle (created, completed, failed, duration)
//! - Remote analysis service (submissions, polls, wait duration)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Broker Metrics
// =============================================================================

/// Messages delivered by the broker.
pub static MESSAGES_CONSUMED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "conveyor_messages_consumed_total",
        "Total messages delivered by the broker",
    )
    .unwrap()
});

/// Messages rejected at the decode step (no task created).
pub static MESSAGES_REJECTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "conveyor_messages_rejected_total",
        "Total malformed messages rejected and requeued",
    )
    .unwrap()
});

/// Acknowledgments applied on the broker channel, by outcome.
pub static ACKS_APPLIED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "conveyor_acks_applied_total",
            "Acknowledgments applied on the broker channel",
        ),
        &["outcome"], // "ack", "nack"
    )
    .unwrap()
});

/// Broker reconnection attempts.
pub static BROKER_RECONNECTS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "conveyor_broker_reconnects_total",
        "Total broker reconnection attempts",
    )
    .unwrap()
});

// =============================================================================
// Task Metrics
// =============================================================================

/// Tasks created, by stage.
pub static TASKS_CREATED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("conveyor_tasks_created_total", "Total tasks created"),
        &["stage"], // "parallel", "sequential"
    )
    .unwrap()
});

/// Tasks that reached `completed`, by stage.
pub static TASKS_COMPLETED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("conveyor_tasks_completed_total", "Total tasks completed"),
        &["stage"],
    )
    .unwrap()
});

/// Tasks that reached `failed`, by stage.
pub static TASKS_FAILED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("conveyor_tasks_failed_total", "Total tasks failed"),
        &["stage"],
    )
    .unwrap()
});

/// Time from start of processing to a terminal state.
pub static TASK_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "conveyor_task_duration_seconds",
            "Duration of task processing",
        )
        .buckets(vec![
            0.1, 0.5, 1.0, 5.0, 15.0, 60.0, 300.0, 1800.0, 3600.0, 7200.0,
        ]),
        &["stage"],
    )
    .unwrap()
});

// =============================================================================
// Remote Analysis Metrics
// =============================================================================

/// Artifact submissions to the analysis service, by result.
pub static REMOTE_SUBMISSIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "conveyor_remote_submissions_total",
            "Artifact submissions to the analysis service",
        ),
        &["result"], // "success", "error"
    )
    .unwrap()
});

/// Status checks against the analysis service.
pub static REMOTE_POLLS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "conveyor_remote_polls_total",
        "Total status checks against the analysis service",
    )
    .unwrap()
});

/// Time spent waiting on a remote analysis task.
pub static REMOTE_WAIT_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "conveyor_remote_wait_duration_seconds",
            "Time spent waiting for remote analysis tasks",
        )
        .buckets(vec![
            1.0, 5.0, 15.0, 60.0, 300.0, 900.0, 1800.0, 3600.0, 7200.0,
        ]),
        &["result"], // "success", "failure", "timeout"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Broker
        Box::new(MESSAGES_CONSUMED.clone()),
        Box::new(MESSAGES_REJECTED.clone()),
        Box::new(ACKS_APPLIED.clone()),
        Box::new(BROKER_RECONNECTS.clone()),
        // Tasks
        Box::new(TASKS_CREATED.clone()),
        Box::new(TASKS_COMPLETED.clone()),
        Box::new(TASKS_FAILED.clone()),
        Box::new(TASK_DURATION.clone()),
        // Remote analysis
        Box::new(REMOTE_SUBMISSIONS.clone()),
        Box::new(REMOTE_POLLS.clone()),
        Box::new(REMOTE_WAIT_DURATION.clone()),
    ]
}
