//! Error types for inventory, template and dataset operations.

use std::path::Path;

use thiserror::Error;

/// Errors surfaced to callers of this crate.
///
/// Missing data, unmatched messages and inventory cache misses are recovered
/// locally and never show up here.
#[derive(Error, Debug)]
pub enum DatasetError {
    /// Grid or reference time mismatch while building a template, thinned or
    /// unsupported grids.
    #[error("Schema violation: {0}")]
    Schema(String),

    #[error("Failed to decode {file}: {reason}")]
    Decode { file: String, reason: String },

    /// A file selected for assembly is on a different grid than the template.
    #[error("Grid mismatch in {file}: {reason}")]
    GridMismatch { file: String, reason: String },

    #[error("Missing reference times: {0}")]
    MissingReferenceTimes(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Failure of the Zarr store while exporting a dataset.
    #[error("Storage error: {0}")]
    Storage(String),
}

impl DatasetError {
    pub fn schema(msg: impl Into<String>) -> Self {
        Self::Schema(msg.into())
    }

    pub fn decode(file: &Path, reason: impl ToString) -> Self {
        Self::Decode {
            file: file.display().to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn grid_mismatch(file: &Path, reason: impl Into<String>) -> Self {
        Self::GridMismatch {
            file: file.display().to_string(),
            reason: reason.into(),
        }
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    pub fn storage(err: impl ToString) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for DatasetError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for DatasetError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::InvalidConfig(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DatasetError>;
