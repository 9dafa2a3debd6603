//! Structure-aware chunking with overlap and metadata
//!
//! Content is split into sections, each section is packed into size-bounded
//! spans without breaking code fences or tables, and overlap from the
//! previous chunk is prepended afterwards. Chunk sizes are measured in bytes
//! of UTF-8 text.

use std::sync::Arc;

use crate::config::ChunkConfig;
use crate::error::Result;
use crate::types::{
    Chunk, ChunkMetadata, ContentType, CHUNK_MARKER_PREFIX, OVERLAP_MARKER, OVERLAP_SEPARATOR,
};

use super::blocks::{scan, BlockClassifier, BlockKind, MarkdownClassifier};
use super::sections::{single_section, split_front_matter, split_sections, Section};

/// Clean starting points for injected overlap
const OVERLAP_BREAKS: [&str; 3] = ["\n\n", ". ", "\n"];

/// Chunking output for a whole document
#[derive(Debug, Clone)]
pub struct ChunkedText {
    /// Body of the stripped front matter block, if any
    pub front_matter: Option<String>,
    pub chunks: Vec<Chunk>,
}

/// Stateless chunking engine
///
/// Configuration is validated once in the constructor; chunking itself never
/// fails. Cheap to clone and safe to share between workers.
#[derive(Clone)]
pub struct Chunker {
    config: ChunkConfig,
    classifier: Arc<dyn BlockClassifier>,
}

impl std::fmt::Debug for Chunker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chunker").field("config", &self.config).finish()
    }
}

/// Own text of a chunk-to-be, as a span of its section
struct Span {
    start: usize,
    end: usize,
    section_title: String,
    heading_path: Vec<String>,
    has_table: bool,
    has_code: bool,
    page: Option<u32>,
}

/// Packed spans for one section, plus the section text they index
struct PackedSection<'a> {
    content: &'a str,
    spans: Vec<Span>,
}

impl Chunker {
    /// Create a chunker with the Markdown line classifier
    pub fn new(config: ChunkConfig) -> Result<Self> {
        Self::with_classifier(config, Arc::new(MarkdownClassifier::new()))
    }

    /// Create a chunker with a custom block classifier
    pub fn with_classifier(config: ChunkConfig, classifier: Arc<dyn BlockClassifier>) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, classifier })
    }

    pub fn config(&self) -> &ChunkConfig {
        &self.config
    }

    pub fn classifier(&self) -> &dyn BlockClassifier {
        self.classifier.as_ref()
    }

    /// Chunk structured text into ordered chunks
    pub fn chunk(&self, content: &str) -> Vec<Chunk> {
        self.chunk_document(content).chunks
    }

    /// Chunk structured text, keeping the stripped front matter
    pub fn chunk_document(&self, content: &str) -> ChunkedText {
        let (front_matter, body) = if self.config.strip_front_matter {
            split_front_matter(content)
        } else {
            (None, content)
        };

        let sections = if self.config.respect_headings {
            split_sections(body, self.classifier.as_ref())
        } else {
            single_section(body)
        };

        let mut page = None;
        let packed: Vec<PackedSection<'_>> = sections
            .into_iter()
            .map(|section| self.pack_section(section, &mut page))
            .collect();

        let chunks = self.assemble(&packed);
        tracing::debug!(
            sections = packed.len(),
            chunks = chunks.len(),
            "Chunked {} bytes",
            body.len()
        );

        ChunkedText {
            front_matter: front_matter.map(str::to_string),
            chunks,
        }
    }

    /// Pack one section's blocks into spans no larger than `chunk_size`,
    /// unless a single atomic block is larger on its own
    fn pack_section<'a>(&self, section: Section<'a>, page: &mut Option<u32>) -> PackedSection<'a> {
        let limit = self.config.chunk_size;
        let content = section.content;
        let mut spans: Vec<Span> = Vec::new();
        let mut current: Option<Span> = None;

        for block in scan(content, self.classifier.as_ref()) {
            if let BlockKind::PageBreak(n) = block.kind {
                *page = Some(n);
            }

            let units = if block.is_atomic() {
                vec![(block.start, block.end)]
            } else {
                split_long_unit(content, block.start, block.end, limit)
            };

            for (unit_start, unit_end) in units {
                let unit_len = unit_end - unit_start;
                if let Some(span) = current.as_ref() {
                    if span.end - span.start + unit_len > limit {
                        spans.extend(current.take());
                    }
                }

                let span = current.get_or_insert_with(|| Span {
                    start: unit_start,
                    end: unit_start,
                    section_title: section.title.clone(),
                    heading_path: Vec::new(),
                    has_table: false,
                    has_code: false,
                    page: *page,
                });
                span.end = unit_end;

                if unit_start != block.start {
                    continue;
                }
                match &block.kind {
                    BlockKind::Heading { text, .. } => span.heading_path.push(text.clone()),
                    BlockKind::Table => span.has_table = true,
                    BlockKind::Code => span.has_code = true,
                    BlockKind::Prose | BlockKind::PageBreak(_) => {}
                }
            }
        }

        spans.extend(current);
        PackedSection { content, spans }
    }

    /// Turn packed spans into chunks, adding overlap and markers
    fn assemble(&self, packed: &[PackedSection<'_>]) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        let mut previous: Option<&str> = None;

        for section in packed {
            for span in &section.spans {
                let own = &section.content[span.start..span.end];
                let index = chunks.len();

                let overlap = match previous {
                    Some(prev) if self.config.chunk_overlap > 0 => {
                        overlap_tail(prev, self.config.chunk_overlap)
                    }
                    _ => "",
                };

                let mut content = String::with_capacity(
                    own.len() + overlap.len() + OVERLAP_MARKER.len() + OVERLAP_SEPARATOR.len(),
                );
                if !overlap.is_empty() {
                    content.push_str(OVERLAP_MARKER);
                    content.push_str(overlap);
                    content.push_str(OVERLAP_SEPARATOR);
                }
                content.push_str(own);
                if self.config.add_chunk_markers {
                    content.push_str(&format!("{}{} -->", CHUNK_MARKER_PREFIX, index));
                }

                let metadata = self.metadata_for(span, own);
                chunks.push(Chunk::new(
                    index,
                    content,
                    span.start,
                    span.end,
                    overlap.len(),
                    metadata,
                ));
                previous = Some(own);
            }
        }

        chunks
    }

    fn metadata_for(&self, span: &Span, own: &str) -> ChunkMetadata {
        let has_image = self.classifier.has_image(own);
        let content_type = if span.has_table {
            ContentType::Table
        } else if span.has_code {
            ContentType::Code
        } else if has_image {
            ContentType::Image
        } else {
            ContentType::Text
        };

        ChunkMetadata {
            section_title: span.section_title.clone(),
            heading_path: span.heading_path.clone(),
            has_table: span.has_table,
            has_code: span.has_code,
            has_image,
            content_type,
            page: span.page,
        }
    }
}

/// Chunk `content` with a freshly validated configuration
///
/// Builds a new [`Chunker`] (and compiles its classifier patterns) on every
/// call. Callers chunking many documents should build one `Chunker` and
/// reuse it.
pub fn chunk(content: &str, config: ChunkConfig) -> Result<Vec<Chunk>> {
    Ok(Chunker::new(config)?.chunk(content))
}

/// Cut a packable unit longer than `limit` into pieces of at most `limit`
/// bytes, preferring to cut after whitespace
fn split_long_unit(text: &str, start: usize, end: usize, limit: usize) -> Vec<(usize, usize)> {
    let mut pieces = Vec::new();
    let mut pos = start;

    while end - pos > limit {
        let window = &text[pos..end];
        let mut cut = limit;
        while cut > 0 && !window.is_char_boundary(cut) {
            cut -= 1;
        }

        let cut = match window[..cut].rfind(char::is_whitespace) {
            Some(ws) if ws > 0 => {
                let ws_len = window[ws..].chars().next().map_or(1, char::len_utf8);
                ws + ws_len
            }
            _ if cut > 0 => cut,
            // A single character wider than the limit
            _ => window.chars().next().map_or(window.len(), char::len_utf8),
        };

        pieces.push((pos, pos + cut));
        pos += cut;
    }

    if pos < end {
        pieces.push((pos, end));
    }
    pieces
}

/// Trailing overlap of `prev`, at most `max` bytes, starting right after the
/// earliest clean break in the tail; empty when there is none
fn overlap_tail(prev: &str, max: usize) -> &str {
    let mut start = prev.len().saturating_sub(max);
    while !prev.is_char_boundary(start) {
        start += 1;
    }
    let tail = &prev[start..];

    let best = OVERLAP_BREAKS
        .iter()
        .filter_map(|sep| tail.find(sep).map(|pos| (pos, sep.len())))
        .min_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)));

    match best {
        Some((pos, len)) => {
            let overlap = tail[pos + len..].trim_end();
            if overlap.trim().is_empty() {
                ""
            } else {
                overlap
            }
        }
        None => "",
    }
}
