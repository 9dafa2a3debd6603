//! chunkflow: structure-aware chunking and concurrent batch ingestion
//!
//! Documents are converted to structured text, split at headings, and
//! packed into size-bounded chunks that never cut through a code fence or
//! table. Chunks carry a copy of the previous chunk's tail so that context
//! survives the boundary.
//!
//! Batches of files run through the same pipeline on a fixed worker pool
//! fed by a bounded queue, with per-file retry, timeout, cancellation and
//! fail-fast handling.

pub mod config;
pub mod error;
pub mod ingestion;
pub mod processing;
pub mod providers;
pub mod types;

pub use config::{BatchConfig, ChunkConfig, IngestConfig};
pub use error::{Error, Result};
pub use ingestion::{chunk, BlockClassifier, ChunkedText, Chunker, IngestPipeline, MarkdownClassifier};
pub use processing::{BatchScheduler, JobId, JobSnapshot, JobStatus, QueueStats};
pub use providers::{ContentConverter, Enricher, TextConverter};
pub use types::{Chunk, ChunkMetadata, ContentType, ProcessedDocument};
