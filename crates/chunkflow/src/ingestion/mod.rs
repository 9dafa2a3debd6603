//! Document ingestion: block scanning, section splitting and chunking

pub mod blocks;
mod chunker;
mod processor;
mod sections;

pub use blocks::{Block, BlockClassifier, BlockKind, MarkdownClassifier};
pub use chunker::{chunk, ChunkedText, Chunker};
pub use processor::IngestPipeline;
pub use sections::split_front_matter;
