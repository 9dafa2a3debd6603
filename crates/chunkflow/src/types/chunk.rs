//! Chunk and chunk metadata types

use serde::{Deserialize, Serialize};

/// Token placed in front of overlap carried over from the previous chunk
pub const OVERLAP_MARKER: &str = "[...] ";

/// Separates injected overlap from the chunk's own content
pub const OVERLAP_SEPARATOR: &str = "\n\n";

/// Start of the optional debug marker appended to a chunk
pub const CHUNK_MARKER_PREFIX: &str = "\n\n<!-- chunk_boundary: ";

/// Dominant kind of content in a chunk
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    #[default]
    Text,
    Table,
    Code,
    Image,
}

/// Structural metadata derived from a chunk's own content
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkMetadata {
    /// Title of the owning section, empty when the section has no heading
    pub section_title: String,
    /// Headings found inside the chunk, outermost first
    pub heading_path: Vec<String>,
    /// Chunk contains a pipe table
    pub has_table: bool,
    /// Chunk contains a fenced code block
    pub has_code: bool,
    /// Chunk contains an image reference
    pub has_image: bool,
    /// Table > code > image > text
    pub content_type: ContentType,
    /// Page in effect at the chunk's first byte, if the source carries page hints
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
}

/// A bounded segment of a document, ready for embedding
///
/// `content` holds, in order: the overlap prefix (if any), the chunk's own
/// text, and the debug marker (if enabled). The own text is exactly
/// `section[start_offset..end_offset]` of the owning section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chunk {
    index: usize,
    content: String,
    start_offset: usize,
    end_offset: usize,
    overlap_len: usize,
    metadata: ChunkMetadata,
}

impl Chunk {
    pub(crate) fn new(
        index: usize,
        content: String,
        start_offset: usize,
        end_offset: usize,
        overlap_len: usize,
        metadata: ChunkMetadata,
    ) -> Self {
        Self {
            index,
            content,
            start_offset,
            end_offset,
            overlap_len,
            metadata,
        }
    }

    /// Ordinal position, 0-based
    pub fn index(&self) -> usize {
        self.index
    }

    /// Full chunk text including overlap prefix and debug marker
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Byte offset of the own text inside its section
    pub fn start_offset(&self) -> usize {
        self.start_offset
    }

    /// Byte offset one past the own text inside its section
    pub fn end_offset(&self) -> usize {
        self.end_offset
    }

    pub fn metadata(&self) -> &ChunkMetadata {
        &self.metadata
    }

    /// Length of the injected overlap text, excluding marker and separator
    pub fn overlap_len(&self) -> usize {
        self.overlap_len
    }

    fn prefix_len(&self) -> usize {
        if self.overlap_len == 0 {
            0
        } else {
            OVERLAP_MARKER.len() + self.overlap_len + OVERLAP_SEPARATOR.len()
        }
    }

    /// Overlap carried over from the previous chunk, empty for none
    pub fn overlap_text(&self) -> &str {
        if self.overlap_len == 0 {
            return "";
        }
        let start = OVERLAP_MARKER.len();
        &self.content[start..start + self.overlap_len]
    }

    /// The chunk's own text with overlap and debug marker stripped
    pub fn own_content(&self) -> &str {
        let start = self.prefix_len();
        &self.content[start..start + (self.end_offset - self.start_offset)]
    }

    /// Own text length in bytes
    pub fn own_len(&self) -> usize {
        self.end_offset - self.start_offset
    }
}
