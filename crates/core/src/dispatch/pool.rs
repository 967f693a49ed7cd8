//! Parallel worker pool dispatch.
//!
//! Each inbound message becomes a task processed on its own tokio task,
//! bounded by a semaphore sized to `max_workers`. The broker prefetch is set
//! to the same bound, so the broker never delivers more unacknowledged
//! messages than the pool can actually run.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use crate::broker::{AckSender, Dispatcher, InboundMessage};
use crate::metrics;
use crate::processor::Processor;
use crate::registry::{TaskRegistry, TaskStatus};

/// Bounded pool that processes messages concurrently.
pub struct WorkerPool {
    registry: Arc<TaskRegistry>,
    processor: Arc<dyn Processor>,
    max_workers: usize,
    semaphore: Arc<Semaphore>,
}

impl WorkerPool {
    pub fn new(
        registry: Arc<TaskRegistry>,
        processor: Arc<dyn Processor>,
        max_workers: usize,
    ) -> Self {
        Self {
            registry,
            processor,
            max_workers,
            semaphore: Arc::new(Semaphore::new(max_workers)),
        }
    }
}

#[async_trait]
impl Dispatcher for WorkerPool {
    fn concurrency_bound(&self) -> u16 {
        self.max_workers as u16
    }

    async fn dispatch(&self, message: InboundMessage, ack: AckSender) {
        let payload: Value = match serde_json::from_slice(&message.body) {
            Ok(payload) => payload,
            Err(e) => {
                // No task is created for undecodable bodies; requeue and let
                // the producer side sort it out.
                warn!("Rejecting malformed message body: {}", e);
                metrics::MESSAGES_REJECTED.inc();
                ack.nack_requeue();
                return;
            }
        };

        let task = self.registry.create(TaskStatus::Pending, payload.clone());
        metrics::TASKS_CREATED.with_label_values(&["parallel"]).inc();
        info!("[task {}] admitted to worker pool", task.task_id);

        let registry = Arc::clone(&self.registry);
        let processor = Arc::clone(&self.processor);
        let semaphore = Arc::clone(&self.semaphore);
        let task_id = task.task_id;

        tokio::spawn(async move {
            // The pool semaphore is never closed.
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return,
            };

            if let Err(e) = registry.transition(&task_id, TaskStatus::Running) {
                error!("[task {}] failed to mark running: {}", task_id, e);
            }

            let started = Instant::now();
            match processor.process(&payload).await {
                Ok(outcome) => {
                    let update = registry.update(&task_id, |t| {
                        t.file_count = Some(outcome.file_count);
                        t.merged_file = outcome
                            .merged_file
                            .as_ref()
                            .map(|p| p.display().to_string());
                    });
                    if let Err(e) = update {
                        error!("[task {}] failed to record outcome: {}", task_id, e);
                    }
                    if let Err(e) = registry.transition(&task_id, TaskStatus::Completed) {
                        error!("[task {}] failed to mark completed: {}", task_id, e);
                    }
                    metrics::TASKS_COMPLETED
                        .with_label_values(&["parallel"])
                        .inc();
                    info!("[task {}] processing completed", task_id);
                }
                Err(e) => {
                    // The failure is recorded on the task, not retried at the
                    // broker level.
                    error!("[task {}] processing failed: {}", task_id, e);
                    let message = e.to_string();
                    if let Err(e) = registry.update(&task_id, |t| t.error = Some(message.clone()))
                    {
                        error!("[task {}] failed to record error: {}", task_id, e);
                    }
                    if let Err(e) = registry.transition(&task_id, TaskStatus::Failed) {
                        error!("[task {}] failed to mark failed: {}", task_id, e);
                    }
                    metrics::TASKS_FAILED.with_label_values(&["parallel"]).inc();
                }
            }
            metrics::TASK_DURATION
                .with_label_values(&["parallel"])
                .observe(started.elapsed().as_secs_f64());

            // Exactly one acknowledgment per message, after the task is
            // terminal, regardless of processing result.
            ack.ack();
        });
    }
}
