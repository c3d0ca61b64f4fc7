//! Error Handling Module
//!
//! Defines the error types for the continual rehearser training library.
//! Uses thiserror for ergonomic error definitions.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for rehearser training operations
#[derive(Error, Debug)]
pub enum RehearserError {
    /// Invalid or inconsistent configuration (bad flag combination,
    /// undeclared setting, impossible hyperparameters)
    #[error("Configuration error: {0}")]
    Config(String),

    /// A dataset could not be located or scanned
    #[error("Failed to load dataset '{name}': {reason}")]
    DataLoad { name: String, reason: String },

    /// A training step failed (numeric divergence, device failure)
    #[error("Training step failed on '{dataset}' at epoch {epoch}: {reason}")]
    TrainingStep {
        dataset: String,
        epoch: usize,
        reason: String,
    },

    /// Filesystem failure while persisting a checkpoint
    #[error("Checkpoint I/O error at '{path}': {source}")]
    CheckpointIo {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RehearserError {
    /// Build a data-load error for a named dataset
    pub fn data_load(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DataLoad {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Build a checkpoint error from any displayable cause
    pub fn checkpoint(path: impl Into<PathBuf>, cause: impl std::fmt::Display) -> Self {
        Self::CheckpointIo {
            path: path.into(),
            source: std::io::Error::new(std::io::ErrorKind::Other, cause.to_string()),
        }
    }
}

/// Convenience Result type for rehearser training operations
pub type Result<T> = std::result::Result<T, RehearserError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RehearserError::Config("no variant selected".to_string());
        assert_eq!(format!("{}", err), "Configuration error: no variant selected");
    }

    #[test]
    fn test_data_load_error() {
        let err = RehearserError::data_load("market1501", "directory not found");
        let text = format!("{}", err);
        assert!(text.contains("market1501"));
        assert!(text.contains("directory not found"));
    }

    #[test]
    fn test_checkpoint_error_keeps_path() {
        let err = RehearserError::checkpoint("/tmp/ckpt/market1501_rehearser", "disk full");
        assert!(format!("{}", err).contains("market1501_rehearser"));
    }
}
