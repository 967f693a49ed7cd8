//! Remote task polling.
//!
//! Tracks an externally executed analysis to completion via periodic status
//! checks. Polling never raises past this boundary: transport errors are
//! logged and retried until the task terminates or the timeout elapses.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::metrics;

use super::types::{AnalyzerClient, RemoteStatus};

/// Final result of waiting on a remote task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Remote task completed successfully.
    Succeeded,
    /// Remote task failed or was lost.
    Failed,
    /// The configured timeout elapsed before a terminal status was seen.
    TimedOut,
}

impl PollOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, PollOutcome::Succeeded)
    }
}

/// Polls the analysis service until a remote task reaches a terminal state.
pub struct RemotePoller {
    client: Arc<dyn AnalyzerClient>,
    timeout: Duration,
    interval: Duration,
}

impl RemotePoller {
    pub fn new(client: Arc<dyn AnalyzerClient>, timeout: Duration, interval: Duration) -> Self {
        Self {
            client,
            timeout,
            interval,
        }
    }

    /// Wait for a remote task to complete.
    ///
    /// Sleeps `interval` between checks. `completed` is success; `failed` and
    /// `not_found` are failures; any other status (including strings this
    /// client does not recognize) is still-pending and re-polled. Exceeding
    /// the timeout yields `TimedOut` without a further poll.
    pub async fn await_completion(&self, remote_id: &str) -> PollOutcome {
        let start = Instant::now();
        info!("Waiting for remote task {} to complete...", remote_id);

        loop {
            if start.elapsed() > self.timeout {
                error!(
                    "Timed out waiting for remote task {} after {}s",
                    remote_id,
                    self.timeout.as_secs()
                );
                metrics::REMOTE_WAIT_DURATION
                    .with_label_values(&["timeout"])
                    .observe(start.elapsed().as_secs_f64());
                return PollOutcome::TimedOut;
            }

            metrics::REMOTE_POLLS.inc();
            match self.client.task_status(remote_id).await {
                Ok(remote) => match remote.status {
                    RemoteStatus::Completed => {
                        info!("Remote task {} completed successfully", remote_id);
                        metrics::REMOTE_WAIT_DURATION
                            .with_label_values(&["success"])
                            .observe(start.elapsed().as_secs_f64());
                        return PollOutcome::Succeeded;
                    }
                    RemoteStatus::Failed => {
                        error!(
                            "Remote task {} failed: {}",
                            remote_id,
                            remote.error.as_deref().unwrap_or("unknown error")
                        );
                        metrics::REMOTE_WAIT_DURATION
                            .with_label_values(&["failure"])
                            .observe(start.elapsed().as_secs_f64());
                        return PollOutcome::Failed;
                    }
                    RemoteStatus::NotFound => {
                        error!("Remote task {} got lost", remote_id);
                        metrics::REMOTE_WAIT_DURATION
                            .with_label_values(&["failure"])
                            .observe(start.elapsed().as_secs_f64());
                        return PollOutcome::Failed;
                    }
                    RemoteStatus::Pending | RemoteStatus::Running => {
                        debug!("Remote task {} still in flight", remote_id);
                    }
                    RemoteStatus::Other(status) => {
                        warn!("Unknown status '{}' for remote task {}", status, remote_id);
                    }
                },
                Err(e) => {
                    warn!("Error polling remote task {}: {}", remote_id, e);
                }
            }

            tokio::time::sleep(self.interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockAnalyzerClient;

    fn poller(client: MockAnalyzerClient, timeout_ms: u64, interval_ms: u64) -> RemotePoller {
        RemotePoller::new(
            Arc::new(client),
            Duration::from_millis(timeout_ms),
            Duration::from_millis(interval_ms),
        )
    }

    #[tokio::test]
    async fn test_completed_after_pending() {
        let client = MockAnalyzerClient::new();
        client.push_status("pending");
        client.push_status("running");
        client.push_status("completed");

        let outcome = poller(client, 5_000, 5).await_completion("rt-1").await;
        assert_eq!(outcome, PollOutcome::Succeeded);
    }

    #[tokio::test]
    async fn test_failed_is_terminal() {
        let client = MockAnalyzerClient::new();
        client.push_status("failed");

        let outcome = poller(client, 5_000, 5).await_completion("rt-2").await;
        assert_eq!(outcome, PollOutcome::Failed);
    }

    #[tokio::test]
    async fn test_not_found_is_failure() {
        let client = MockAnalyzerClient::new();
        client.push_status("not_found");

        let outcome = poller(client, 5_000, 5).await_completion("rt-3").await;
        assert_eq!(outcome, PollOutcome::Failed);
    }

    #[tokio::test]
    async fn test_unknown_status_keeps_polling() {
        let client = MockAnalyzerClient::new();
        client.push_status("reticulating");
        client.push_status("completed");

        let outcome = poller(client, 5_000, 5).await_completion("rt-4").await;
        assert_eq!(outcome, PollOutcome::Succeeded);
    }

    #[tokio::test]
    async fn test_transport_errors_are_swallowed_and_retried() {
        let client = MockAnalyzerClient::new();
        client.push_error("connection refused");
        client.push_status("completed");

        let outcome = poller(client, 5_000, 5).await_completion("rt-5").await;
        assert_eq!(outcome, PollOutcome::Succeeded);
    }

    #[tokio::test]
    async fn test_timeout_forces_failure_without_panicking() {
        // Mock always reports pending, so only the timeout can end the wait.
        let client = MockAnalyzerClient::new();
        client.set_default_status("pending");

        let outcome = poller(client, 40, 5).await_completion("rt-6").await;
        assert_eq!(outcome, PollOutcome::TimedOut);
    }
}
