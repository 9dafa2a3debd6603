//! Per-file processing output

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::chunk::Chunk;

/// What an annotation describes
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AnnotationKind {
    Table,
    Image,
}

/// Enrichment hook output for one table or image
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Annotation {
    pub kind: AnnotationKind,
    /// The block the description was generated for
    pub source: String,
    pub description: String,
}

/// A file that went through conversion, chunking and enrichment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedDocument {
    /// Unique document ID
    pub id: Uuid,
    /// Path as submitted
    pub source_path: String,
    /// File name component of the path
    pub filename: String,
    /// Body of a leading `---` metadata block, if one was stripped
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub front_matter: Option<String>,
    /// Converted structured text
    pub content: String,
    pub chunks: Vec<Chunk>,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
    /// Processing timestamp
    pub processed_at: chrono::DateTime<chrono::Utc>,
}

impl ProcessedDocument {
    pub fn new(source_path: impl Into<String>, content: String, chunks: Vec<Chunk>) -> Self {
        let source_path = source_path.into();
        let filename = std::path::Path::new(&source_path)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(&source_path)
            .to_string();

        Self {
            id: Uuid::new_v4(),
            source_path,
            filename,
            front_matter: None,
            content,
            chunks,
            annotations: Vec::new(),
            processed_at: chrono::Utc::now(),
        }
    }

    pub fn total_chunks(&self) -> usize {
        self.chunks.len()
    }
}
