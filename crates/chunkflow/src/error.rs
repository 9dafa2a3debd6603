//! Error types for chunking and batch ingestion

use std::collections::HashMap;

use thiserror::Error;
use uuid::Uuid;

/// Result type alias for chunkflow operations
pub type Result<T> = std::result::Result<T, Error>;

/// Chunking and scheduling errors
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid chunker or scheduler configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// A file could not be converted to structured text
    #[error("Failed to convert '{filename}': {message}")]
    Conversion { filename: String, message: String },

    /// The work queue had no room left for a file
    #[error("Queue is full (capacity {capacity}, accepted {accepted} file(s))")]
    QueueFull {
        capacity: usize,
        accepted: usize,
        /// Set when some files of the call were queued before the queue filled up
        job_id: Option<Uuid>,
    },

    /// Unknown job id
    #[error("Job not found: {0}")]
    JobNotFound(Uuid),

    /// Result requested for a job that ended in `failed`
    #[error("Job {job_id} failed ({} file error(s))", errors.len())]
    JobFailed {
        job_id: Uuid,
        errors: HashMap<String, String>,
    },

    /// Per-file processing deadline exceeded
    #[error("Processing '{path}' timed out after {secs}s")]
    Timeout { path: String, secs: u64 },

    /// Enrichment hook error
    #[error("Enrichment failed: {0}")]
    Enrichment(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML config parse error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a conversion error
    pub fn conversion(filename: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Conversion {
            filename: filename.into(),
            message: message.into(),
        }
    }

    /// Create an enrichment error
    pub fn enrichment(message: impl Into<String>) -> Self {
        Self::Enrichment(message.into())
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Whether a per-file failure may succeed on another attempt
    ///
    /// Anything the pipeline returns for a file is retried. Only
    /// configuration and scheduler bookkeeping errors are final.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Self::Config(_)
                | Self::QueueFull { .. }
                | Self::JobNotFound(_)
                | Self::JobFailed { .. }
        )
    }
}
