//! Core task data types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status of a tracked task.
///
/// `Pending`/`Running` are used by the parallel worker pool,
/// `Queued`/`Processing`/`WaitingForRemote` by the sequential lane.
/// `Completed` and `Failed` are terminal for both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Admitted, waiting for a pool worker.
    Pending,
    /// A pool worker is processing the message.
    Running,
    /// Admitted, waiting in the sequential lane.
    Queued,
    /// The sequential worker is processing the task.
    Processing,
    /// Blocked on a remote analysis task.
    WaitingForRemote,
    /// Finished successfully.
    Completed,
    /// Finished with an error.
    Failed,
}

impl TaskStatus {
    /// Returns true when no further transition is possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    /// Returns true for the states a task is created in.
    pub fn is_initial(&self) -> bool {
        matches!(self, TaskStatus::Pending | TaskStatus::Queued)
    }

    /// Returns the string representation for API responses and filters.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Queued => "queued",
            TaskStatus::Processing => "processing",
            TaskStatus::WaitingForRemote => "waiting_for_remote",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }

    /// Parse a status filter value. Returns None for unrecognized input.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(TaskStatus::Pending),
            "running" => Some(TaskStatus::Running),
            "queued" => Some(TaskStatus::Queued),
            "processing" => Some(TaskStatus::Processing),
            "waiting_for_remote" => Some(TaskStatus::WaitingForRemote),
            "completed" => Some(TaskStatus::Completed),
            "failed" => Some(TaskStatus::Failed),
            _ => None,
        }
    }
}

/// A tracked unit of work, created when a broker message is received.
///
/// Records live for the lifetime of the process; there is no eviction and no
/// persistence across restarts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier, generated at message receipt.
    pub task_id: String,
    /// Current status.
    pub status: TaskStatus,
    /// When the task record was created.
    pub created_at: DateTime<Utc>,
    /// When processing began. Set at most once.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// When the task reached a terminal state. Set exactly once.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// The decoded message payload, retained for audit/debugging.
    pub message_data: serde_json::Value,
    /// Number of input artifacts discovered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_count: Option<usize>,
    /// Artifacts that were processed successfully, in order.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_files: Option<Vec<String>>,
    /// Path of the merged output file (parallel stage).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merged_file: Option<String>,
    /// Identifier of the remote analysis task currently waited on.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_task_id: Option<String>,
    /// Last error message, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
