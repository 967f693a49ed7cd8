//! Sequential lane dispatch.
//!
//! Messages are acknowledged as soon as they land on the internal queue; a
//! single background worker drains the queue one task at a time and drives
//! each task's artifacts through the remote analysis service to completion
//! before pulling the next. At most one task is ever in its processing phase.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use regex_lite::Regex;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, RwLock};
use tracing::{debug, error, info, warn};

use crate::analyzer::{AnalyzerClient, RemotePoller};
use crate::artifacts::{self, ArtifactError};
use crate::broker::{AckSender, Dispatcher, InboundMessage};
use crate::metrics;
use crate::registry::{RegistryError, TaskRegistry, TaskStatus};

/// Errors that abort a lane task to `failed`.
#[derive(Debug, Error)]
pub enum LaneError {
    #[error("Artifact error: {0}")]
    Artifact(#[from] ArtifactError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),
}

/// An admitted task waiting in the lane.
struct LaneItem {
    task_id: String,
    payload: Value,
}

/// Front half of the sequential lane: receives messages from the consumer
/// and exposes queue state to the status API.
pub struct SequentialLane {
    registry: Arc<TaskRegistry>,
    queue_tx: mpsc::UnboundedSender<LaneItem>,
    queue_depth: Arc<AtomicUsize>,
    current_task: Arc<RwLock<Option<String>>>,
}

impl SequentialLane {
    /// Create the lane and its background worker.
    ///
    /// The worker must be spawned by the caller (`tokio::spawn(worker.run(..))`);
    /// until then enqueued tasks simply wait.
    pub fn new(
        registry: Arc<TaskRegistry>,
        analyzer: Arc<dyn AnalyzerClient>,
        poller: RemotePoller,
        input_dir: PathBuf,
        staging_dir: PathBuf,
        pattern: Regex,
    ) -> (Self, LaneWorker) {
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        let queue_depth = Arc::new(AtomicUsize::new(0));
        let current_task = Arc::new(RwLock::new(None));

        let lane = Self {
            registry: Arc::clone(&registry),
            queue_tx,
            queue_depth: Arc::clone(&queue_depth),
            current_task: Arc::clone(&current_task),
        };

        let worker = LaneWorker {
            registry,
            analyzer,
            poller,
            input_dir,
            staging_dir,
            pattern,
            queue_rx,
            queue_depth,
            current_task,
        };

        (lane, worker)
    }

    /// Number of tasks waiting in the lane.
    pub fn queue_depth(&self) -> usize {
        self.queue_depth.load(Ordering::SeqCst)
    }

    /// Id of the task currently being processed, if any.
    pub async fn current_task(&self) -> Option<String> {
        self.current_task.read().await.clone()
    }
}

#[async_trait]
impl Dispatcher for SequentialLane {
    // One unacknowledged message at a time; the internal queue provides the
    // buffering, not the broker.
    fn concurrency_bound(&self) -> u16 {
        1
    }

    async fn dispatch(&self, message: InboundMessage, ack: AckSender) {
        let payload: Value = match serde_json::from_slice(&message.body) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Rejecting malformed message body: {}", e);
                metrics::MESSAGES_REJECTED.inc();
                ack.nack_requeue();
                return;
            }
        };

        let task = self.registry.create(TaskStatus::Queued, payload.clone());
        metrics::TASKS_CREATED
            .with_label_values(&["sequential"])
            .inc();

        let item = LaneItem {
            task_id: task.task_id.clone(),
            payload,
        };
        if self.queue_tx.send(item).is_err() {
            // Worker is gone; refuse the message so the broker redelivers it.
            error!(
                "[task {}] sequential worker unavailable, requeueing message",
                task.task_id
            );
            let _ = self
                .registry
                .update(&task.task_id, |t| {
                    t.error = Some("sequential worker unavailable".to_string())
                });
            let _ = self.registry.transition(&task.task_id, TaskStatus::Failed);
            ack.nack_requeue();
            return;
        }

        self.queue_depth.fetch_add(1, Ordering::SeqCst);
        // Receipt into the internal queue is treated as durable enough: a
        // crash between this ack and processing loses the task.
        ack.ack();
        info!(
            "[task {}] enqueued for analysis (queue depth: {})",
            task.task_id,
            self.queue_depth()
        );
    }
}

/// Background worker that drains the lane one task at a time.
pub struct LaneWorker {
    registry: Arc<TaskRegistry>,
    analyzer: Arc<dyn AnalyzerClient>,
    poller: RemotePoller,
    input_dir: PathBuf,
    staging_dir: PathBuf,
    pattern: Regex,
    queue_rx: mpsc::UnboundedReceiver<LaneItem>,
    queue_depth: Arc<AtomicUsize>,
    current_task: Arc<RwLock<Option<String>>>,
}

impl LaneWorker {
    /// Run until shutdown is signalled or the lane is dropped.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        info!("Sequential lane worker started");

        loop {
            let item = tokio::select! {
                _ = shutdown.recv() => {
                    info!("Sequential lane worker received shutdown signal");
                    break;
                }
                item = self.queue_rx.recv() => match item {
                    Some(item) => item,
                    None => break,
                },
            };

            self.queue_depth.fetch_sub(1, Ordering::SeqCst);
            debug!("[task {}] picked up from lane queue", item.task_id);

            *self.current_task.write().await = Some(item.task_id.clone());
            let started = Instant::now();

            if let Err(e) = self.process_item(&item).await {
                error!("[task {}] analysis batch failed: {}", item.task_id, e);
                let message = e.to_string();
                let _ = self
                    .registry
                    .update(&item.task_id, |t| t.error = Some(message.clone()));
                let _ = self.registry.transition(&item.task_id, TaskStatus::Failed);
                metrics::TASKS_FAILED
                    .with_label_values(&["sequential"])
                    .inc();
            } else {
                metrics::TASKS_COMPLETED
                    .with_label_values(&["sequential"])
                    .inc();
            }
            metrics::TASK_DURATION
                .with_label_values(&["sequential"])
                .observe(started.elapsed().as_secs_f64());

            *self.current_task.write().await = None;
        }

        info!("Sequential lane worker stopped");
    }

    /// Drive one task to a terminal state.
    async fn process_item(&self, item: &LaneItem) -> Result<(), LaneError> {
        let task_id = &item.task_id;
        debug!("[task {}] message payload: {}", task_id, item.payload);

        self.registry.transition(task_id, TaskStatus::Processing)?;

        let found = artifacts::find_artifacts(&self.input_dir, &self.pattern).await?;

        if found.is_empty() {
            warn!("[task {}] no artifacts found", task_id);
            self.registry.update(task_id, |t| t.file_count = Some(0))?;
            self.registry.transition(task_id, TaskStatus::Completed)?;
            return Ok(());
        }

        self.registry.update(task_id, |t| {
            t.file_count = Some(found.len());
            t.processed_files = Some(Vec::new());
        })?;

        for (idx, artifact) in found.iter().enumerate() {
            let name = artifact
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            info!(
                "[task {}] processing artifact {}/{}: {}",
                task_id,
                idx + 1,
                found.len(),
                name
            );

            let staged = artifacts::stage_artifact(artifact, &self.staging_dir).await?;

            let Some(remote_id) = self.submit(task_id, &staged).await else {
                // Submission failure skips the artifact, not the batch.
                continue;
            };

            self.registry
                .update(task_id, |t| t.remote_task_id = Some(remote_id.clone()))?;
            self.registry
                .transition(task_id, TaskStatus::WaitingForRemote)?;

            let outcome = self.poller.await_completion(&remote_id).await;
            if outcome.is_success() {
                info!("[task {}] artifact {} analyzed successfully", task_id, name);
                self.registry.update(task_id, |t| {
                    t.processed_files.get_or_insert_with(Vec::new).push(name)
                })?;
            } else {
                warn!(
                    "[task {}] remote analysis did not complete for {}",
                    task_id, name
                );
            }

            self.registry.transition(task_id, TaskStatus::Processing)?;
        }

        let task = self.registry.transition(task_id, TaskStatus::Completed)?;
        info!(
            "[task {}] analysis batch completed ({} of {} artifacts processed)",
            task_id,
            task.processed_files.map(|f| f.len()).unwrap_or(0),
            found.len()
        );
        Ok(())
    }

    /// Submit one staged artifact. A failed submission is logged and skipped.
    async fn submit(&self, task_id: &str, staged: &Path) -> Option<String> {
        match self.analyzer.submit(staged).await {
            Ok(remote_id) => {
                info!(
                    "[task {}] analyzer accepted {}, remote task {}",
                    task_id,
                    staged.display(),
                    remote_id
                );
                metrics::REMOTE_SUBMISSIONS
                    .with_label_values(&["success"])
                    .inc();
                Some(remote_id)
            }
            Err(e) => {
                error!(
                    "[task {}] failed to submit {}: {}",
                    task_id,
                    staged.display(),
                    e
                );
                metrics::REMOTE_SUBMISSIONS
                    .with_label_values(&["error"])
                    .inc();
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::{AckCommand, AckOutcome};
    use crate::testing::MockAnalyzerClient;
    use serde_json::json;
    use std::time::Duration;
    use tempfile::TempDir;

    struct Fixture {
        lane: SequentialLane,
        registry: Arc<TaskRegistry>,
        analyzer: Arc<MockAnalyzerClient>,
        input: TempDir,
        _staging: TempDir,
        _shutdown_tx: broadcast::Sender<()>,
    }

    fn fixture(analyzer: MockAnalyzerClient) -> Fixture {
        let registry = Arc::new(TaskRegistry::new());
        let analyzer = Arc::new(analyzer);
        let input = TempDir::new().unwrap();
        let staging = TempDir::new().unwrap();

        let poller = RemotePoller::new(
            Arc::clone(&analyzer) as Arc<dyn AnalyzerClient>,
            Duration::from_millis(500),
            Duration::from_millis(5),
        );
        let (lane, worker) = SequentialLane::new(
            Arc::clone(&registry),
            Arc::clone(&analyzer) as Arc<dyn AnalyzerClient>,
            poller,
            input.path().to_path_buf(),
            staging.path().to_path_buf(),
            Regex::new(r".*\.json$").unwrap(),
        );

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        tokio::spawn(worker.run(shutdown_rx));

        Fixture {
            lane,
            registry,
            analyzer,
            input,
            _staging: staging,
            _shutdown_tx: shutdown_tx,
        }
    }

    fn message(tag: u64) -> InboundMessage {
        InboundMessage {
            delivery_tag: tag,
            body: json!({"event": "graph.done"}).to_string().into_bytes(),
        }
    }

    async fn wait_terminal(registry: &TaskRegistry, task_id: &str) -> crate::registry::Task {
        for _ in 0..400 {
            if let Some(task) = registry.get(task_id) {
                if task.status.is_terminal() {
                    return task;
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("task {} did not reach terminal state in time", task_id);
    }

    #[tokio::test]
    async fn test_malformed_payload_is_nacked_without_task() {
        let f = fixture(MockAnalyzerClient::new());
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<AckCommand>();

        let bad = InboundMessage {
            delivery_tag: 1,
            body: b"][".to_vec(),
        };
        f.lane.dispatch(bad, AckSender::new(1, tx)).await;

        assert_eq!(rx.recv().await.unwrap().outcome, AckOutcome::NackRequeue);
        assert!(f.registry.is_empty());
    }

    #[tokio::test]
    async fn test_message_is_acked_on_enqueue() {
        let f = fixture(MockAnalyzerClient::new());
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<AckCommand>();

        f.lane.dispatch(message(2), AckSender::new(2, tx)).await;

        // Acked immediately at receipt, before processing completes.
        let command = rx.recv().await.unwrap();
        assert_eq!(command.outcome, AckOutcome::Ack);
        assert_eq!(command.delivery_tag, 2);
    }

    #[tokio::test]
    async fn test_zero_artifacts_completes_immediately_without_remote_calls() {
        let f = fixture(MockAnalyzerClient::new());
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel::<AckCommand>();

        f.lane.dispatch(message(1), AckSender::new(1, tx)).await;

        let task_id = f.registry.list(None, 1)[0].task_id.clone();
        let task = wait_terminal(&f.registry, &task_id).await;
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.file_count, Some(0));
        assert!(task.processed_files.is_none());
        assert!(f.analyzer.submitted().is_empty());
    }

    #[tokio::test]
    async fn test_round_trip_all_artifacts_processed() {
        let f = fixture(MockAnalyzerClient::new());
        std::fs::write(
            f.input.path().join("a.json"),
            json!({"summary": "a"}).to_string(),
        )
        .unwrap();
        std::fs::write(
            f.input.path().join("b.json"),
            json!({"summary": "b"}).to_string(),
        )
        .unwrap();

        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel::<AckCommand>();
        f.lane.dispatch(message(1), AckSender::new(1, tx)).await;

        let task_id = f.registry.list(None, 1)[0].task_id.clone();
        let task = wait_terminal(&f.registry, &task_id).await;

        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.file_count, Some(2));
        assert_eq!(
            task.processed_files.unwrap(),
            vec!["a.json".to_string(), "b.json".to_string()]
        );
        assert!(task.remote_task_id.is_some());
        assert_eq!(f.analyzer.submitted().len(), 2);
    }

    #[tokio::test]
    async fn test_not_found_excludes_artifact_but_batch_completes() {
        let analyzer = MockAnalyzerClient::new();
        // First artifact gets lost remotely, the second completes.
        analyzer.push_status("not_found");
        let f = fixture(analyzer);

        std::fs::write(f.input.path().join("a.json"), "{}").unwrap();
        std::fs::write(f.input.path().join("b.json"), "{}").unwrap();

        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel::<AckCommand>();
        f.lane.dispatch(message(1), AckSender::new(1, tx)).await;

        let task_id = f.registry.list(None, 1)[0].task_id.clone();
        let task = wait_terminal(&f.registry, &task_id).await;

        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.processed_files.unwrap(), vec!["b.json".to_string()]);
    }

    #[tokio::test]
    async fn test_submission_failure_skips_artifacts_but_batch_completes() {
        let analyzer = MockAnalyzerClient::new();
        analyzer.set_submit_failure(true);
        let f = fixture(analyzer);

        std::fs::write(f.input.path().join("a.json"), "{}").unwrap();

        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel::<AckCommand>();
        f.lane.dispatch(message(1), AckSender::new(1, tx)).await;

        let task_id = f.registry.list(None, 1)[0].task_id.clone();
        let task = wait_terminal(&f.registry, &task_id).await;

        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.file_count, Some(1));
        assert_eq!(task.processed_files.unwrap(), Vec::<String>::new());
    }

    #[tokio::test]
    async fn test_staging_failure_aborts_task_to_failed() {
        let f = fixture(MockAnalyzerClient::new());
        std::fs::write(f.input.path().join("broken.json"), "{not json").unwrap();

        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel::<AckCommand>();
        f.lane.dispatch(message(1), AckSender::new(1, tx)).await;

        let task_id = f.registry.list(None, 1)[0].task_id.clone();
        let task = wait_terminal(&f.registry, &task_id).await;

        assert_eq!(task.status, TaskStatus::Failed);
        assert!(task.error.is_some());
        assert!(task.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_strict_serialization_between_tasks() {
        let analyzer = MockAnalyzerClient::new();
        analyzer.set_submit_delay(Duration::from_millis(30));
        let f = fixture(analyzer);

        std::fs::write(f.input.path().join("a.json"), "{}").unwrap();

        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel::<AckCommand>();
        f.lane
            .dispatch(message(1), AckSender::new(1, tx.clone()))
            .await;
        f.lane.dispatch(message(2), AckSender::new(2, tx)).await;

        let tasks = f.registry.list(None, 10);
        assert_eq!(tasks.len(), 2);
        // list() is newest-first; the older task was submitted first.
        let second_id = tasks[0].task_id.clone();
        let first_id = tasks[1].task_id.clone();

        let first = wait_terminal(&f.registry, &first_id).await;
        let second = wait_terminal(&f.registry, &second_id).await;

        // The first task reached a terminal state before the second started.
        assert!(first.completed_at.unwrap() <= second.started_at.unwrap());
    }
}
