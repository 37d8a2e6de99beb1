use std::path::PathBuf;

use thiserror::Error;

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Error types for indexing, persistence and stage execution
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Dataset root directory not found: {0:?}")]
    RootNotFound(PathBuf),

    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to walk directory: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("Failed to (de)serialize {path:?}: {source}")]
    Serialization {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("No images with extension {extension:?} found under {root:?}")]
    NoImages { root: PathBuf, extension: String },

    #[error("Corrupt index artifacts: {0}")]
    CorruptArtifacts(String),

    #[error("Stage {stage} failed: {reason}")]
    StageFailed { stage: String, reason: String },

    #[error("Unknown stage: {0}")]
    UnknownStage(String),
}

impl PipelineError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PipelineError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn serialization(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        PipelineError::Serialization {
            path: path.into(),
            source,
        }
    }
}
