//! Content conversion contract: raw file bytes to structured text

use async_trait::async_trait;

use crate::error::{Error, Result};

/// Converts a file's bytes to structured (Markdown-flavoured) text
///
/// Format-specific converters (PDF, Office, spreadsheets) live outside this
/// crate and plug in through this trait. Implementations must be reentrant;
/// the scheduler calls them from several workers at once.
#[async_trait]
pub trait ContentConverter: Send + Sync {
    /// Convert `data` read from `filename`
    async fn convert(&self, data: &[u8], filename: &str) -> Result<String>;

    /// Whether this converter handles the file's format
    fn supports(&self, filename: &str) -> bool;

    /// Converter name for logging
    fn name(&self) -> &str;
}

/// Pass-through converter for files that already are structured text
#[derive(Debug, Clone, Default)]
pub struct TextConverter;

impl TextConverter {
    const EXTENSIONS: [&'static str; 4] = ["md", "markdown", "txt", "text"];

    fn extension(filename: &str) -> Option<String> {
        std::path::Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
    }
}

#[async_trait]
impl ContentConverter for TextConverter {
    async fn convert(&self, data: &[u8], filename: &str) -> Result<String> {
        if !self.supports(filename) {
            let ext = Self::extension(filename).unwrap_or_default();
            return Err(Error::conversion(
                filename,
                format!("no converter for '.{}' files", ext),
            ));
        }

        let text = std::str::from_utf8(data)
            .map_err(|e| Error::conversion(filename, format!("invalid UTF-8: {}", e)))?;
        // Normalise Windows line endings so offsets and fences line up
        Ok(text.replace("\r\n", "\n"))
    }

    fn supports(&self, filename: &str) -> bool {
        Self::extension(filename)
            .map(|ext| Self::EXTENSIONS.contains(&ext.as_str()))
            .unwrap_or(false)
    }

    fn name(&self) -> &str {
        "text"
    }
}
