//! Common test utilities for in-process API testing.
//!
//! Builds the axum router with a real registry and, for sequential mode, a
//! real lane backed by the mock analyzer — no broker or analysis service
//! required.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use conveyor_core::testing::MockAnalyzerClient;
use conveyor_core::{
    load_config_from_str, AnalyzerClient, LaneWorker, RemotePoller, SequentialLane, TaskRegistry,
};
use conveyor_server::api::create_router;
use conveyor_server::state::AppState;

/// Test fixture exposing the router and the registry behind it.
pub struct TestFixture {
    pub router: Router,
    pub registry: Arc<TaskRegistry>,
    // Keeps the lane's internal queue open for the fixture's lifetime.
    _lane_worker: Option<LaneWorker>,
    _dirs: Vec<TempDir>,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestFixture {
    /// Fixture running the parallel stage.
    pub fn parallel() -> Self {
        let config = load_config_from_str(
            r#"
[stage]
mode = "parallel"

[broker]
password = "test-secret"
"#,
        )
        .unwrap();

        let registry = Arc::new(TaskRegistry::new());
        let state = Arc::new(AppState::new(config, Arc::clone(&registry), None));

        Self {
            router: create_router(state),
            registry,
            _lane_worker: None,
            _dirs: Vec::new(),
        }
    }

    /// Fixture running the sequential stage, lane included.
    pub fn sequential() -> Self {
        let config = load_config_from_str(
            r#"
[stage]
mode = "sequential"
"#,
        )
        .unwrap();

        let registry = Arc::new(TaskRegistry::new());
        let input = TempDir::new().unwrap();
        let staging = TempDir::new().unwrap();

        let analyzer: Arc<dyn AnalyzerClient> = Arc::new(MockAnalyzerClient::new());
        let poller = RemotePoller::new(
            Arc::clone(&analyzer),
            Duration::from_millis(100),
            Duration::from_millis(5),
        );
        let (lane, worker) = SequentialLane::new(
            Arc::clone(&registry),
            analyzer,
            poller,
            input.path().to_path_buf(),
            staging.path().to_path_buf(),
            regex_lite::Regex::new(r".*\.json$").unwrap(),
        );

        let state = Arc::new(AppState::new(
            config,
            Arc::clone(&registry),
            Some(Arc::new(lane)),
        ));

        Self {
            router: create_router(state),
            registry,
            _lane_worker: Some(worker),
            _dirs: vec![input, staging],
        }
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&body_bytes).into()))
        };

        TestResponse { status, body }
    }
}
