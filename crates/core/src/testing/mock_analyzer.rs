//! Mock analyzer client with scripted status responses.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::analyzer::{AnalyzerClient, AnalyzerError, RemoteStatus, RemoteTask};

/// One scripted response of the status endpoint.
enum ScriptedStatus {
    Status(String),
    TransportError(String),
}

/// Mock implementation of [`AnalyzerClient`].
///
/// Status checks consume scripted responses in order; once the script is
/// exhausted the configured default status (or `completed`) is returned
/// forever. Submissions are recorded and hand out sequential remote ids.
pub struct MockAnalyzerClient {
    script: Mutex<VecDeque<ScriptedStatus>>,
    default_status: Mutex<Option<String>>,
    submitted: Mutex<Vec<PathBuf>>,
    submit_fails: AtomicBool,
    submit_delay: Mutex<Option<Duration>>,
    next_id: AtomicUsize,
}

impl MockAnalyzerClient {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            default_status: Mutex::new(None),
            submitted: Mutex::new(Vec::new()),
            submit_fails: AtomicBool::new(false),
            submit_delay: Mutex::new(None),
            next_id: AtomicUsize::new(0),
        }
    }

    /// Queue a status string to be returned by the next status check.
    pub fn push_status(&self, status: &str) {
        self.script
            .lock()
            .unwrap()
            .push_back(ScriptedStatus::Status(status.to_string()));
    }

    /// Queue a transport error for the next status check.
    pub fn push_error(&self, message: &str) {
        self.script
            .lock()
            .unwrap()
            .push_back(ScriptedStatus::TransportError(message.to_string()));
    }

    /// Status returned once the script is exhausted (default: "completed").
    pub fn set_default_status(&self, status: &str) {
        *self.default_status.lock().unwrap() = Some(status.to_string());
    }

    /// Make all submissions fail.
    pub fn set_submit_failure(&self, fail: bool) {
        self.submit_fails.store(fail, Ordering::SeqCst);
    }

    /// Delay every submission, to make processing observably slow.
    pub fn set_submit_delay(&self, delay: Duration) {
        *self.submit_delay.lock().unwrap() = Some(delay);
    }

    /// Paths submitted so far.
    pub fn submitted(&self) -> Vec<PathBuf> {
        self.submitted.lock().unwrap().clone()
    }
}

impl Default for MockAnalyzerClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AnalyzerClient for MockAnalyzerClient {
    async fn submit(&self, artifact_path: &Path) -> Result<String, AnalyzerError> {
        let delay = *self.submit_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.submit_fails.load(Ordering::SeqCst) {
            return Err(AnalyzerError::ApiError("mock submission failure".into()));
        }

        self.submitted
            .lock()
            .unwrap()
            .push(artifact_path.to_path_buf());
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        Ok(format!("remote-{}", id))
    }

    async fn task_status(&self, _remote_id: &str) -> Result<RemoteTask, AnalyzerError> {
        let scripted = self.script.lock().unwrap().pop_front();
        match scripted {
            Some(ScriptedStatus::Status(status)) => Ok(RemoteTask {
                status: RemoteStatus::parse(&status),
                error: None,
            }),
            Some(ScriptedStatus::TransportError(message)) => {
                Err(AnalyzerError::ConnectionFailed(message))
            }
            None => {
                let status = self
                    .default_status
                    .lock()
                    .unwrap()
                    .clone()
                    .unwrap_or_else(|| "completed".to_string());
                Ok(RemoteTask {
                    status: RemoteStatus::parse(&status),
                    error: None,
                })
            }
        }
    }
}
