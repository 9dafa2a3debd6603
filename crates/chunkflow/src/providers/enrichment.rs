//! Enrichment hook contract

use async_trait::async_trait;

use crate::error::Result;

/// Produces a short natural-language description of a table or image block
///
/// Typically backed by an LLM client. Failures are never fatal to a file;
/// the pipeline logs them and leaves the block without an annotation.
#[async_trait]
pub trait Enricher: Send + Sync {
    /// Describe one block of structured text
    async fn describe(&self, content: &str) -> Result<String>;

    /// Provider name for logging
    fn name(&self) -> &str;
}
