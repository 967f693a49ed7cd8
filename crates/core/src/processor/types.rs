//! Types for the message processing seam.

use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::artifacts::ArtifactError;

/// Errors surfaced by a processor. Captured on the task record; never
/// re-raised to the broker.
#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Artifact error: {0}")]
    Artifact(#[from] ArtifactError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Processing failed: {0}")]
    Other(String),
}

/// Result of a successful processing run.
#[derive(Debug, Clone)]
pub struct ProcessOutcome {
    /// Number of input records the run consumed.
    pub file_count: usize,
    /// Output file handed off downstream, if any was produced.
    pub merged_file: Option<PathBuf>,
}

/// The business transform applied to a message by the worker pool.
///
/// Implementations receive the decoded payload; the surrounding task
/// lifecycle (status transitions, error capture, acknowledgment) is handled
/// by the dispatcher.
#[async_trait]
pub trait Processor: Send + Sync {
    async fn process(&self, payload: &Value) -> Result<ProcessOutcome, ProcessorError>;
}
