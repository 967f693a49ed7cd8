//! Task API handlers.
//!
//! Read-only projections of the task registry; there is deliberately no
//! mutating endpoint.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use conveyor_core::{Task, TaskStatus};

use crate::state::AppState;

/// Maximum allowed limit for task queries
const MAX_LIMIT: usize = 1000;

/// Default limit for task queries
const DEFAULT_LIMIT: usize = 100;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Query parameters for listing tasks
#[derive(Debug, Deserialize)]
pub struct ListTasksParams {
    /// Filter by status
    pub status: Option<String>,
    /// Maximum number of tasks to return
    pub limit: Option<usize>,
}

/// Response for listing tasks
#[derive(Debug, Serialize)]
pub struct ListTasksResponse {
    pub total: usize,
    pub tasks: Vec<Task>,
}

/// Response for a single task
#[derive(Debug, Serialize)]
pub struct TaskStatusResponse {
    pub task: Task,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct TaskErrorResponse {
    pub error: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// List tasks, newest first, with optional status filter
pub async fn list_tasks(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListTasksParams>,
) -> Json<ListTasksResponse> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

    let filter = match params.status.as_deref() {
        Some(raw) => match TaskStatus::parse(raw) {
            Some(status) => Some(status),
            // An unknown status matches nothing rather than erroring.
            None => {
                return Json(ListTasksResponse {
                    total: 0,
                    tasks: Vec::new(),
                });
            }
        },
        None => None,
    };

    let tasks = state.registry().list(filter, limit);
    Json(ListTasksResponse {
        total: tasks.len(),
        tasks,
    })
}

/// Get a task by ID
pub async fn get_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<TaskStatusResponse>, (StatusCode, Json<TaskErrorResponse>)> {
    match state.registry().get(&id) {
        Some(task) => Ok(Json(TaskStatusResponse { task })),
        None => Err((
            StatusCode::NOT_FOUND,
            Json(TaskErrorResponse {
                error: format!("Task not found: {}", id),
            }),
        )),
    }
}
