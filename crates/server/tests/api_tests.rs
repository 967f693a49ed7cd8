//! API integration tests against the in-process router.

mod common;

use axum::http::StatusCode;
use common::TestFixture;
use serde_json::json;

use conveyor_core::TaskStatus;

#[tokio::test]
async fn test_health_parallel_mode() {
    let fixture = TestFixture::parallel();

    let response = fixture.get("/health").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "healthy");
    assert_eq!(response.body["service"], "conveyor");
    assert_eq!(response.body["stage"], "parallel");
    assert_eq!(response.body["total_tasks"], 0);
    // Queue fields only exist in sequential mode.
    assert!(response.body.get("queue_size").is_none());
}

#[tokio::test]
async fn test_health_sequential_mode_reports_queue() {
    let fixture = TestFixture::sequential();

    let response = fixture.get("/health").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["stage"], "sequential");
    assert_eq!(response.body["queue_size"], 0);
    assert!(response.body.get("current_task").is_none());
}

#[tokio::test]
async fn test_health_counts_tasks() {
    let fixture = TestFixture::parallel();
    fixture.registry.create(TaskStatus::Pending, json!({}));
    fixture.registry.create(TaskStatus::Pending, json!({}));

    let response = fixture.get("/health").await;
    assert_eq!(response.body["total_tasks"], 2);
}

#[tokio::test]
async fn test_list_tasks_empty() {
    let fixture = TestFixture::parallel();

    let response = fixture.get("/tasks").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["total"], 0);
    assert!(response.body["tasks"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_list_tasks_newest_first_with_limit() {
    let fixture = TestFixture::parallel();
    let first = fixture
        .registry
        .create(TaskStatus::Pending, json!({"n": 1}));
    std::thread::sleep(std::time::Duration::from_millis(2));
    let second = fixture
        .registry
        .create(TaskStatus::Pending, json!({"n": 2}));

    let response = fixture.get("/tasks").await;
    let tasks = response.body["tasks"].as_array().unwrap();
    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks[0]["task_id"], second.task_id.as_str());
    assert_eq!(tasks[1]["task_id"], first.task_id.as_str());

    let response = fixture.get("/tasks?limit=1").await;
    assert_eq!(response.body["total"], 1);
    let tasks = response.body["tasks"].as_array().unwrap();
    assert_eq!(tasks[0]["task_id"], second.task_id.as_str());
}

#[tokio::test]
async fn test_list_tasks_filters_by_status() {
    let fixture = TestFixture::parallel();
    let done = fixture.registry.create(TaskStatus::Pending, json!({}));
    fixture.registry.create(TaskStatus::Pending, json!({}));
    fixture
        .registry
        .transition(&done.task_id, TaskStatus::Completed)
        .unwrap();

    let response = fixture.get("/tasks?status=completed").await;
    assert_eq!(response.body["total"], 1);
    assert_eq!(
        response.body["tasks"][0]["task_id"],
        done.task_id.as_str()
    );
    assert_eq!(response.body["tasks"][0]["status"], "completed");

    let response = fixture.get("/tasks?status=failed").await;
    assert_eq!(response.body["total"], 0);
}

#[tokio::test]
async fn test_list_tasks_unknown_status_matches_nothing() {
    let fixture = TestFixture::parallel();
    fixture.registry.create(TaskStatus::Pending, json!({}));

    let response = fixture.get("/tasks?status=bogus").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["total"], 0);
}

#[tokio::test]
async fn test_get_task_by_id() {
    let fixture = TestFixture::parallel();
    let task = fixture
        .registry
        .create(TaskStatus::Pending, json!({"event": "ingest.done"}));

    let response = fixture.get(&format!("/tasks/{}", task.task_id)).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["task"]["task_id"], task.task_id.as_str());
    assert_eq!(response.body["task"]["status"], "pending");
    assert_eq!(response.body["task"]["message_data"]["event"], "ingest.done");
}

#[tokio::test]
async fn test_get_missing_task_is_404() {
    let fixture = TestFixture::parallel();

    let response = fixture.get("/tasks/no-such-task").await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert!(response.body["error"]
        .as_str()
        .unwrap()
        .contains("no-such-task"));
}

#[tokio::test]
async fn test_config_endpoint_redacts_credentials() {
    let fixture = TestFixture::parallel();

    let response = fixture.get("/config").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["broker"]["credentials_configured"], true);
    assert!(response.body["broker"].get("password").is_none());
    assert!(!response.body.to_string().contains("test-secret"));
}

#[tokio::test]
async fn test_metrics_endpoint_exposes_prometheus_text() {
    let fixture = TestFixture::parallel();
    fixture.registry.create(TaskStatus::Pending, json!({}));

    let response = fixture.get("/metrics").await;
    assert_eq!(response.status, StatusCode::OK);
    let body = response.body.as_str().unwrap();
    assert!(body.contains("conveyor_tasks_by_status"));
    assert!(body.contains("# HELP"));
}
