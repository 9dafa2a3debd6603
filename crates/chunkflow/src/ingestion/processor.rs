//! Per-file ingestion pipeline: read, convert, chunk, enrich

use std::path::Path;
use std::sync::Arc;

use crate::error::Result;
use crate::providers::{ContentConverter, Enricher};
use crate::types::{Annotation, AnnotationKind, ProcessedDocument};

use super::blocks::{scan, BlockKind};
use super::chunker::Chunker;

/// Main ingestion pipeline
///
/// Holds no mutable state, so one instance is shared by every worker.
#[derive(Clone)]
pub struct IngestPipeline {
    chunker: Chunker,
    converter: Arc<dyn ContentConverter>,
    enricher: Option<Arc<dyn Enricher>>,
}

impl IngestPipeline {
    /// Create a pipeline without enrichment
    pub fn new(chunker: Chunker, converter: Arc<dyn ContentConverter>) -> Self {
        Self {
            chunker,
            converter,
            enricher: None,
        }
    }

    /// Attach an enrichment hook for tables and images
    pub fn with_enricher(mut self, enricher: Arc<dyn Enricher>) -> Self {
        self.enricher = Some(enricher);
        self
    }

    pub fn chunker(&self) -> &Chunker {
        &self.chunker
    }

    /// Read a file from disk and run it through the pipeline
    pub async fn process_file(&self, path: impl AsRef<Path>) -> Result<ProcessedDocument> {
        let path = path.as_ref();
        let data = tokio::fs::read(path).await?;
        self.process(&data, &path.to_string_lossy()).await
    }

    /// Run already-loaded bytes through conversion, chunking and enrichment
    pub async fn process(&self, data: &[u8], source_path: &str) -> Result<ProcessedDocument> {
        let filename = Path::new(source_path)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(source_path);

        tracing::debug!("[{}] Converting with {} ({} bytes)", filename, self.converter.name(), data.len());
        let content = self.converter.convert(data, filename).await?;

        let chunked = self.chunker.chunk_document(&content);
        tracing::debug!("[{}] Created {} chunks", filename, chunked.chunks.len());

        let mut doc = ProcessedDocument::new(source_path, content, chunked.chunks);
        doc.front_matter = chunked.front_matter;

        if let Some(enricher) = &self.enricher {
            doc.annotations = self.enrich(enricher.as_ref(), filename, &doc.content).await;
        }

        Ok(doc)
    }

    /// Describe every table and image reference; failures only skip the block
    async fn enrich(&self, enricher: &dyn Enricher, filename: &str, content: &str) -> Vec<Annotation> {
        let classifier = self.chunker.classifier();
        let mut annotations = Vec::new();

        for block in scan(content, classifier) {
            let text = &content[block.start..block.end];
            let kind = match block.kind {
                BlockKind::Table => AnnotationKind::Table,
                BlockKind::Prose if classifier.has_image(text) => AnnotationKind::Image,
                _ => continue,
            };

            match enricher.describe(text.trim_end()).await {
                Ok(description) => annotations.push(Annotation {
                    kind,
                    source: text.trim_end().to_string(),
                    description,
                }),
                Err(e) => {
                    tracing::warn!(
                        "[{}] {} could not describe {:?} block: {}",
                        filename,
                        enricher.name(),
                        kind,
                        e
                    );
                }
            }
        }

        annotations
    }
}

impl std::fmt::Debug for IngestPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestPipeline")
            .field("chunker", &self.chunker)
            .field("converter", &self.converter.name())
            .field("enricher", &self.enricher.as_ref().map(|e| e.name().to_string()))
            .finish()
    }
}
