//! Merge processor: the parallel stage's transform.
//!
//! Loads every matching JSON artifact from the input directory, renames the
//! `summary` field to `text`, merges the records into a single array and
//! writes it into the pending directory for the downstream ingestion step to
//! pick up.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use regex_lite::Regex;
use serde_json::Value;
use tracing::{info, warn};

use crate::artifacts;

use super::types::{ProcessOutcome, Processor, ProcessorError};

/// Processor that merges input artifacts into one pending file.
pub struct MergeProcessor {
    input_dir: PathBuf,
    pending_dir: PathBuf,
    pattern: Regex,
}

impl MergeProcessor {
    pub fn new(input_dir: PathBuf, pending_dir: PathBuf, pattern: Regex) -> Self {
        Self {
            input_dir,
            pending_dir,
            pattern,
        }
    }

    /// Rename the `summary` field to `text`, in place. Records without a
    /// `summary` field pass through unchanged.
    pub fn transform_record(record: &mut Value) {
        if let Some(object) = record.as_object_mut() {
            if let Some(summary) = object.remove("summary") {
                object.insert("text".to_string(), summary);
            }
        }
    }

    async fn load_record(path: &Path) -> Result<Value, ProcessorError> {
        let raw = tokio::fs::read(path).await?;
        Ok(serde_json::from_slice(&raw)?)
    }
}

#[async_trait]
impl Processor for MergeProcessor {
    async fn process(&self, _payload: &Value) -> Result<ProcessOutcome, ProcessorError> {
        let files = artifacts::find_artifacts(&self.input_dir, &self.pattern).await?;

        let mut records = Vec::new();
        for file in &files {
            match Self::load_record(file).await {
                Ok(mut record) => {
                    Self::transform_record(&mut record);
                    records.push(record);
                }
                Err(e) => {
                    // A single unreadable artifact does not fail the batch.
                    warn!("Skipping unreadable artifact {}: {}", file.display(), e);
                }
            }
        }

        if records.is_empty() {
            warn!(
                "No artifacts found to merge in {}",
                self.input_dir.display()
            );
            return Ok(ProcessOutcome {
                file_count: 0,
                merged_file: None,
            });
        }

        tokio::fs::create_dir_all(&self.pending_dir).await?;

        let file_name = format!("merged_{}.json", Utc::now().format("%Y%m%d_%H%M%S"));
        let output = self.pending_dir.join(file_name);
        tokio::fs::write(&output, serde_json::to_vec_pretty(&records)?).await?;

        info!(
            "Merged {} records into {}",
            records.len(),
            output.display()
        );

        Ok(ProcessOutcome {
            file_count: records.len(),
            merged_file: Some(output),
        })
    }
}
