//! Artifact discovery and staging.
//!
//! The input directory is shared with external producers, so discovery
//! tolerates it being absent and staging always creates its target
//! directory if needed.

use std::path::{Path, PathBuf};

use regex_lite::Regex;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

/// Errors for artifact operations.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON in {path}: {source}")]
    InvalidJson {
        path: String,
        source: serde_json::Error,
    },

    #[error("Artifact {0} is not a JSON object")]
    NotAnObject(String),
}

/// Find all files in `dir` whose name matches `pattern`, sorted by path for
/// a deterministic processing order. A missing directory yields an empty
/// list rather than an error.
pub async fn find_artifacts(dir: &Path, pattern: &Regex) -> Result<Vec<PathBuf>, ArtifactError> {
    if tokio::fs::metadata(dir).await.is_err() {
        debug!("Input directory {} does not exist", dir.display());
        return Ok(Vec::new());
    }

    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut files = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }
        let path = entry.path();
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            if pattern.is_match(name) {
                files.push(path);
            }
        }
    }

    files.sort();
    info!(
        "Found {} artifacts matching '{}' in {}",
        files.len(),
        pattern.as_str(),
        dir.display()
    );
    Ok(files)
}

/// Copy an artifact into the staging directory and tag it with an `_id`
/// field derived from the filename (without extension).
///
/// Returns the path of the staged copy. The source file is left untouched.
pub async fn stage_artifact(source: &Path, staging_dir: &Path) -> Result<PathBuf, ArtifactError> {
    tokio::fs::create_dir_all(staging_dir).await?;

    let file_name = source.file_name().ok_or_else(|| {
        ArtifactError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("artifact path has no file name: {}", source.display()),
        ))
    })?;
    let staged = staging_dir.join(file_name);

    tokio::fs::copy(source, &staged).await?;
    debug!("Copied {} to {}", source.display(), staged.display());

    let raw = tokio::fs::read(&staged).await?;
    let mut data: Value =
        serde_json::from_slice(&raw).map_err(|e| ArtifactError::InvalidJson {
            path: staged.display().to_string(),
            source: e,
        })?;

    let artifact_id = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    match data.as_object_mut() {
        Some(object) => {
            object.insert("_id".to_string(), Value::String(artifact_id.clone()));
        }
        None => return Err(ArtifactError::NotAnObject(staged.display().to_string())),
    }

    let serialized = serde_json::to_vec_pretty(&data).map_err(|e| ArtifactError::InvalidJson {
        path: staged.display().to_string(),
        source: e,
    })?;
    tokio::fs::write(&staged, serialized).await?;

    debug!("Tagged {} with _id '{}'", staged.display(), artifact_id);
    Ok(staged)
}
