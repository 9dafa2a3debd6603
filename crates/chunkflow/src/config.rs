//! Configuration for chunking and batch ingestion

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};

/// Top-level ingestion configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Chunking configuration
    #[serde(default)]
    pub chunking: ChunkConfig,
    /// Batch scheduler configuration
    #[serde(default)]
    pub batch: BatchConfig,
}

impl IngestConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&raw)
    }

    /// Validate both sections
    pub fn validate(&self) -> Result<()> {
        self.chunking.validate()?;
        self.batch.validate()
    }
}

/// Text chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkConfig {
    /// Target chunk size in bytes of UTF-8 text
    pub chunk_size: usize,
    /// Maximum overlap carried from the previous chunk
    pub chunk_overlap: usize,
    /// Start a new section at every heading
    pub respect_headings: bool,
    /// Append a `chunk_boundary` comment to every chunk
    pub add_chunk_markers: bool,
    /// Remove a leading `---` metadata block before chunking
    pub strip_front_matter: bool,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            respect_headings: true,
            add_chunk_markers: false,
            strip_front_matter: true,
        }
    }
}

impl ChunkConfig {
    /// Create a config with the given size and overlap, other fields default
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
            ..Self::default()
        }
    }

    pub fn with_overlap(mut self, chunk_overlap: usize) -> Self {
        self.chunk_overlap = chunk_overlap;
        self
    }

    pub fn with_respect_headings(mut self, respect_headings: bool) -> Self {
        self.respect_headings = respect_headings;
        self
    }

    pub fn with_chunk_markers(mut self, add_chunk_markers: bool) -> Self {
        self.add_chunk_markers = add_chunk_markers;
        self
    }

    /// Check size and overlap bounds
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::config("chunk_size must be greater than 0"));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(Error::config(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

/// Batch scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Number of worker tasks in the pool
    pub max_workers: usize,
    /// Capacity of the bounded work queue (one slot per file)
    pub queue_size: usize,
    /// Retry failed files with exponential backoff
    pub retry_failed: bool,
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Backoff base in milliseconds; attempt `n` waits `base * 2^n`
    pub retry_backoff_ms: u64,
    /// Mark the job failed on the first file failure
    pub fail_fast: bool,
    /// Deadline for a single file, in seconds
    pub timeout_per_file_secs: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_workers: num_cpus::get().min(8),
            queue_size: 100,
            retry_failed: true,
            max_retries: 3,
            retry_backoff_ms: 500,
            fail_fast: false,
            timeout_per_file_secs: 300, // 5 minutes
        }
    }
}

impl BatchConfig {
    pub fn with_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    pub fn with_queue_size(mut self, queue_size: usize) -> Self {
        self.queue_size = queue_size;
        self
    }

    pub fn with_retries(mut self, max_retries: u32, backoff_ms: u64) -> Self {
        self.retry_failed = true;
        self.max_retries = max_retries;
        self.retry_backoff_ms = backoff_ms;
        self
    }

    pub fn without_retries(mut self) -> Self {
        self.retry_failed = false;
        self
    }

    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_per_file_secs = secs;
        self
    }

    /// Per-file deadline
    pub fn file_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_per_file_secs)
    }

    /// Delay before retry number `attempt` (0-based)
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        Duration::from_millis(self.retry_backoff_ms.saturating_mul(factor))
    }

    /// Total attempts allowed for one file
    pub fn max_attempts(&self) -> u32 {
        if self.retry_failed {
            self.max_retries.saturating_add(1)
        } else {
            1
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_workers == 0 {
            return Err(Error::config("max_workers must be greater than 0"));
        }
        if self.queue_size == 0 {
            return Err(Error::config("queue_size must be greater than 0"));
        }
        if self.timeout_per_file_secs == 0 {
            return Err(Error::config("timeout_per_file_secs must be greater than 0"));
        }
        Ok(())
    }
}
