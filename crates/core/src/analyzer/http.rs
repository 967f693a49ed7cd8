//! HTTP implementation of the analyzer client.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::debug;

use crate::config::AnalyzerConfig;

use super::types::{
    AnalyzerClient, AnalyzerError, RawRemoteTask, RemoteTask, SubmitResponse,
};

/// Analyzer client talking to the remote analysis service over HTTP.
pub struct HttpAnalyzerClient {
    client: Client,
    config: AnalyzerConfig,
}

impl HttpAnalyzerClient {
    /// Create a new HTTP analyzer client.
    pub fn new(config: AnalyzerConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs as u64))
            .build()
            .expect("Failed to create HTTP client");

        Self { client, config }
    }

    /// Get the base URL without trailing slash.
    fn base_url(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    fn map_error(e: reqwest::Error) -> AnalyzerError {
        if e.is_timeout() {
            AnalyzerError::Timeout
        } else if e.is_connect() {
            AnalyzerError::ConnectionFailed(e.to_string())
        } else {
            AnalyzerError::ApiError(e.to_string())
        }
    }
}

#[async_trait]
impl AnalyzerClient for HttpAnalyzerClient {
    async fn submit(&self, artifact_path: &Path) -> Result<String, AnalyzerError> {
        let url = format!("{}/analyze", self.base_url());
        debug!("Submitting {} to {}", artifact_path.display(), url);

        let response = self
            .client
            .post(&url)
            .json(&json!({
                "artifact_path": artifact_path.to_string_lossy(),
            }))
            .send()
            .await
            .map_err(Self::map_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(AnalyzerError::ApiError(format!("HTTP {}", status)));
        }

        let body: SubmitResponse = response
            .json()
            .await
            .map_err(|e| AnalyzerError::InvalidResponse(e.to_string()))?;

        Ok(body.task_id)
    }

    async fn task_status(&self, remote_id: &str) -> Result<RemoteTask, AnalyzerError> {
        let url = format!("{}/tasks/{}", self.base_url(), remote_id);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(Self::map_error)?;

        let status = response.status();
        if !status.is_success() {
            // Transport-level failures (including HTTP 404) are transient to
            // the poller; only an in-body "not_found" status is terminal.
            return Err(AnalyzerError::ApiError(format!("HTTP {}", status)));
        }

        let body: RawRemoteTask = response
            .json()
            .await
            .map_err(|e| AnalyzerError::InvalidResponse(e.to_string()))?;

        Ok(RemoteTask::from(body))
    }
}
