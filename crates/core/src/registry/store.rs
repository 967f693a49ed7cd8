//! In-memory task registry.
//!
//! The registry is the only shared mutable structure in the orchestrator.
//! Every operation takes the lock only for the duration of the map access;
//! returned records are clones, never live references, so callers can
//! serialize or inspect them without racing concurrent mutation.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::Utc;
use thiserror::Error;
use uuid::Uuid;

use super::types::{Task, TaskStatus};

/// Errors for registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Task not found: {0}")]
    NotFound(String),

    #[error("Task {task_id} is already terminal ({status}), refusing transition")]
    TerminalState { task_id: String, status: String },
}

/// Concurrency-safe mapping from task id to task record.
///
/// Handed to components as an explicit `Arc` handle at construction time;
/// there is no ambient global state.
pub struct TaskRegistry {
    tasks: RwLock<HashMap<String, Task>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self {
            tasks: RwLock::new(HashMap::new()),
        }
    }

    /// Create a new task record in the given initial status.
    ///
    /// Returns a snapshot of the inserted record.
    pub fn create(&self, status: TaskStatus, message_data: serde_json::Value) -> Task {
        let task = Task {
            task_id: Uuid::new_v4().to_string(),
            status,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            message_data,
            file_count: None,
            processed_files: None,
            merged_file: None,
            remote_task_id: None,
            error: None,
        };

        let mut tasks = self.tasks.write().expect("registry lock poisoned");
        tasks.insert(task.task_id.clone(), task.clone());
        task
    }

    /// Get a snapshot of a task by id.
    pub fn get(&self, task_id: &str) -> Option<Task> {
        let tasks = self.tasks.read().expect("registry lock poisoned");
        tasks.get(task_id).cloned()
    }

    /// Apply a mutation to a task under the registry lock.
    ///
    /// Returns `RegistryError::NotFound` if the id is absent; normal flow
    /// always creates before updating, so a miss indicates a bug.
    pub fn update<F>(&self, task_id: &str, mutate: F) -> Result<Task, RegistryError>
    where
        F: FnOnce(&mut Task),
    {
        let mut tasks = self.tasks.write().expect("registry lock poisoned");
        let task = tasks
            .get_mut(task_id)
            .ok_or_else(|| RegistryError::NotFound(task_id.to_string()))?;
        mutate(task);
        Ok(task.clone())
    }

    /// Transition a task to a new status, maintaining timestamp invariants:
    /// `started_at` is set once on the first transition out of an initial
    /// state, `completed_at` exactly once on entering a terminal state, and
    /// terminal states are never left.
    pub fn transition(
        &self,
        task_id: &str,
        new_status: TaskStatus,
    ) -> Result<Task, RegistryError> {
        let mut tasks = self.tasks.write().expect("registry lock poisoned");
        let task = tasks
            .get_mut(task_id)
            .ok_or_else(|| RegistryError::NotFound(task_id.to_string()))?;

        if task.status.is_terminal() {
            return Err(RegistryError::TerminalState {
                task_id: task_id.to_string(),
                status: task.status.as_str().to_string(),
            });
        }

        if task.status.is_initial() && !new_status.is_initial() && task.started_at.is_none() {
            task.started_at = Some(Utc::now());
        }
        if new_status.is_terminal() {
            task.completed_at = Some(Utc::now());
        }
        task.status = new_status;
        Ok(task.clone())
    }

    /// List task snapshots, newest first.
    ///
    /// An absent filter returns all tasks; an unknown status simply matches
    /// nothing. Never errors.
    pub fn list(&self, filter: Option<TaskStatus>, limit: usize) -> Vec<Task> {
        let mut all: Vec<Task> = {
            let tasks = self.tasks.read().expect("registry lock poisoned");
            tasks.values().cloned().collect()
        };

        if let Some(status) = filter {
            all.retain(|t| t.status == status);
        }

        // Sorting and truncation happen on the snapshot, outside the lock.
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        all.truncate(limit);
        all
    }

    /// Number of tasks tracked since startup.
    pub fn len(&self) -> usize {
        let tasks = self.tasks.read().expect("registry lock poisoned");
        tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Count tasks currently in the given status.
    pub fn count_by_status(&self, status: TaskStatus) -> usize {
        let tasks = self.tasks.read().expect("registry lock poisoned");
        tasks.values().filter(|t| t.status == status).count()
    }
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}
