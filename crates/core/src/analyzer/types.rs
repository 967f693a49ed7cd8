//! Types for the remote analysis service client.

use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

/// Errors that can occur while talking to the analysis service.
#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request timeout")]
    Timeout,

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Status of a remote analysis task.
///
/// `completed`, `failed` and `not_found` are terminal; anything else —
/// including status strings this client has never seen — means the task is
/// still in flight and should be polled again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteStatus {
    Pending,
    Running,
    Completed,
    Failed,
    NotFound,
    /// Unrecognized status string, treated as still pending.
    Other(String),
}

impl RemoteStatus {
    pub fn parse(value: &str) -> Self {
        match value {
            "pending" => RemoteStatus::Pending,
            "running" => RemoteStatus::Running,
            "completed" => RemoteStatus::Completed,
            "failed" => RemoteStatus::Failed,
            "not_found" => RemoteStatus::NotFound,
            other => RemoteStatus::Other(other.to_string()),
        }
    }
}

/// Status report for a remote analysis task.
#[derive(Debug, Clone)]
pub struct RemoteTask {
    pub status: RemoteStatus,
    pub error: Option<String>,
}

/// Wire format of the status endpoint response.
#[derive(Debug, Deserialize)]
pub(crate) struct RawRemoteTask {
    pub status: String,
    #[serde(default)]
    pub error: Option<String>,
}

impl From<RawRemoteTask> for RemoteTask {
    fn from(raw: RawRemoteTask) -> Self {
        Self {
            status: RemoteStatus::parse(&raw.status),
            error: raw.error,
        }
    }
}

/// Wire format of the submission endpoint response.
#[derive(Debug, Deserialize)]
pub(crate) struct SubmitResponse {
    pub task_id: String,
}

/// Client for the external analysis service.
#[async_trait]
pub trait AnalyzerClient: Send + Sync {
    /// Submit an artifact for analysis. Returns the remote task id.
    async fn submit(&self, artifact_path: &Path) -> Result<String, AnalyzerError>;

    /// Fetch the current status of a remote task.
    async fn task_status(&self, remote_id: &str) -> Result<RemoteTask, AnalyzerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_statuses() {
        assert_eq!(RemoteStatus::parse("pending"), RemoteStatus::Pending);
        assert_eq!(RemoteStatus::parse("running"), RemoteStatus::Running);
        assert_eq!(RemoteStatus::parse("completed"), RemoteStatus::Completed);
        assert_eq!(RemoteStatus::parse("failed"), RemoteStatus::Failed);
        assert_eq!(RemoteStatus::parse("not_found"), RemoteStatus::NotFound);
    }

    #[test]
    fn test_parse_unknown_status_is_other() {
        assert_eq!(
            RemoteStatus::parse("paused"),
            RemoteStatus::Other("paused".to_string())
        );
    }
}
