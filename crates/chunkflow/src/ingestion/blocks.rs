//! Line classification for structured text
//!
//! The scanner walks content line by line and groups it into blocks. Code
//! fences and pipe tables are atomic; every other line is a packable unit.
//! Classification goes through [`BlockClassifier`] so a real structured-text
//! parser can replace the line patterns without touching packing or overlap.

use regex::Regex;

/// Decides what a single physical line is
pub trait BlockClassifier: Send + Sync {
    /// Heading level and text, if the line is a heading
    fn heading(&self, line: &str) -> Option<(u8, String)>;

    /// Fence character if the line opens or closes a code fence
    fn fence(&self, line: &str) -> Option<char>;

    /// Whether the line is a pipe table row
    fn is_table_row(&self, line: &str) -> bool;

    /// Page number carried by a page marker line
    fn page_hint(&self, line: &str) -> Option<u32>;

    /// Whether the text contains an image reference
    fn has_image(&self, text: &str) -> bool;
}

/// Line-pattern classifier for Markdown-flavoured structured text
pub struct MarkdownClassifier {
    heading: Regex,
    page: Regex,
    image: Regex,
}

impl MarkdownClassifier {
    pub fn new() -> Self {
        Self {
            heading: Regex::new(r"^(#{1,6})\s+(.+)$").expect("valid heading pattern"),
            page: Regex::new(r"(?i)^<!--\s*page:?\s*(\d+)\s*-->$").expect("valid page pattern"),
            image: Regex::new(r"!\[[^\]]*\]\([^)]*\)").expect("valid image pattern"),
        }
    }
}

impl Default for MarkdownClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockClassifier for MarkdownClassifier {
    fn heading(&self, line: &str) -> Option<(u8, String)> {
        let caps = self.heading.captures(line.trim_end())?;
        let level = caps.get(1)?.as_str().len() as u8;
        let text = caps.get(2)?.as_str().trim().trim_end_matches('#').trim();
        if text.is_empty() {
            return None;
        }
        Some((level, text.to_string()))
    }

    fn fence(&self, line: &str) -> Option<char> {
        let trimmed = line.trim_start();
        if trimmed.starts_with("```") {
            Some('`')
        } else if trimmed.starts_with("~~~") {
            Some('~')
        } else {
            None
        }
    }

    fn is_table_row(&self, line: &str) -> bool {
        let trimmed = line.trim();
        trimmed.len() >= 2 && trimmed.starts_with('|') && trimmed.ends_with('|')
    }

    fn page_hint(&self, line: &str) -> Option<u32> {
        self.page.captures(line.trim())?.get(1)?.as_str().parse().ok()
    }

    fn has_image(&self, text: &str) -> bool {
        self.image.is_match(text)
    }
}

/// Block classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockKind {
    Prose,
    Heading { level: u8, text: String },
    Code,
    Table,
    PageBreak(u32),
}

/// A run of whole lines; `start..end` indexes the scanned text and includes
/// the trailing newline of the last line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub kind: BlockKind,
    pub start: usize,
    pub end: usize,
}

impl Block {
    /// Code fences and tables are never split
    pub fn is_atomic(&self) -> bool {
        matches!(self.kind, BlockKind::Code | BlockKind::Table)
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Strip the line terminator
fn line_body(line: &str) -> &str {
    line.trim_end_matches(['\n', '\r'])
}

/// Scan `text` into contiguous blocks covering it completely
///
/// An unterminated fence runs to the end of the text.
pub fn scan(text: &str, classifier: &dyn BlockClassifier) -> Vec<Block> {
    let lines: Vec<(usize, &str)> = text
        .split_inclusive('\n')
        .scan(0usize, |offset, line| {
            let start = *offset;
            *offset += line.len();
            Some((start, line))
        })
        .collect();

    let mut blocks = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let (start, line) = lines[i];
        let body = line_body(line);

        if let Some(marker) = classifier.fence(body) {
            let mut j = i + 1;
            while j < lines.len() && classifier.fence(line_body(lines[j].1)) != Some(marker) {
                j += 1;
            }
            // Include the closing fence when there is one
            let last = j.min(lines.len() - 1);
            let end = lines[last].0 + lines[last].1.len();
            blocks.push(Block { kind: BlockKind::Code, start, end });
            i = last + 1;
            continue;
        }

        if classifier.is_table_row(body) {
            let mut j = i + 1;
            while j < lines.len() && classifier.is_table_row(line_body(lines[j].1)) {
                j += 1;
            }
            let end = lines[j - 1].0 + lines[j - 1].1.len();
            blocks.push(Block { kind: BlockKind::Table, start, end });
            i = j;
            continue;
        }

        let kind = if let Some((level, text)) = classifier.heading(body) {
            BlockKind::Heading { level, text }
        } else if let Some(page) = classifier.page_hint(body) {
            BlockKind::PageBreak(page)
        } else {
            BlockKind::Prose
        };
        blocks.push(Block { kind, start, end: start + line.len() });
        i += 1;
    }

    blocks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(text: &str) -> Vec<BlockKind> {
        scan(text, &MarkdownClassifier::new()).into_iter().map(|b| b.kind).collect()
    }

    #[test]
    fn test_heading_detection() {
        let c = MarkdownClassifier::new();
        assert_eq!(c.heading("## Setup"), Some((2, "Setup".to_string())));
        assert_eq!(c.heading("###### Deep ##"), Some((6, "Deep".to_string())));
        assert_eq!(c.heading("####### Too deep"), None);
        assert_eq!(c.heading("#hashtag"), None);
        assert_eq!(c.heading("Plain text"), None);
    }

    #[test]
    fn test_blocks_cover_text() {
        let text = "# Title\nIntro line\n```rust\nfn main() {}\n```\n| a | b |\n|---|---|\n| 1 | 2 |\nAfter";
        let blocks = scan(text, &MarkdownClassifier::new());

        let mut pos = 0;
        for block in &blocks {
            assert_eq!(block.start, pos);
            pos = block.end;
        }
        assert_eq!(pos, text.len());

        assert_eq!(
            kinds(text),
            vec![
                BlockKind::Heading { level: 1, text: "Title".to_string() },
                BlockKind::Prose,
                BlockKind::Code,
                BlockKind::Table,
                BlockKind::Prose,
            ]
        );
    }

    #[test]
    fn test_heading_inside_fence_is_code() {
        let text = "```bash\n# not a heading\necho hi\n```\n";
        assert_eq!(kinds(text), vec![BlockKind::Code]);
    }

    #[test]
    fn test_unterminated_fence_runs_to_end() {
        let text = "before\n```\ncode\nmore code\n";
        let blocks = scan(text, &MarkdownClassifier::new());
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[1].kind, BlockKind::Code);
        assert_eq!(blocks[1].end, text.len());
    }

    #[test]
    fn test_tilde_fence_not_closed_by_backticks() {
        let text = "~~~\n```\nstill code\n~~~\ntail\n";
        assert_eq!(kinds(text), vec![BlockKind::Code, BlockKind::Prose]);
    }

    #[test]
    fn test_page_hint() {
        let c = MarkdownClassifier::new();
        assert_eq!(c.page_hint("<!-- page: 3 -->"), Some(3));
        assert_eq!(c.page_hint("<!-- Page 12 -->"), Some(12));
        assert_eq!(c.page_hint("<!-- chunk_boundary: 1 -->"), None);
        assert_eq!(kinds("<!-- page: 2 -->\ntext\n")[0], BlockKind::PageBreak(2));
    }

    #[test]
    fn test_image_reference() {
        let c = MarkdownClassifier::new();
        assert!(c.has_image("See ![diagram](img/arch.png) below"));
        assert!(!c.has_image("[link](https://example.com)"));
    }
}
