//! Core types shared by the chunker and the batch scheduler

pub mod chunk;
pub mod document;

pub use chunk::{Chunk, ChunkMetadata, ContentType, CHUNK_MARKER_PREFIX, OVERLAP_MARKER, OVERLAP_SEPARATOR};
pub use document::{Annotation, AnnotationKind, ProcessedDocument};
