//! Manifest error types

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CloudError {
    #[error("Duplicate logical id: {0}")]
    DuplicateLogicalId(String),

    #[error("{from} references unknown resource {logical_id}")]
    DanglingReference { from: String, logical_id: String },

    #[error("Duplicate output: {0}")]
    DuplicateOutput(String),

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CloudError>;
