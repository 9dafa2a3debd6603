//! Front matter stripping and heading-based section splitting

use super::blocks::{scan, BlockClassifier, BlockKind};

/// A contiguous slice of the document body owned by one heading
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Section<'a> {
    /// Heading text, empty for content before the first heading
    pub title: String,
    pub content: &'a str,
}

/// Split a leading `---` delimited metadata block off the content
///
/// Returns the block body (without delimiters) and the remaining text. The
/// closing delimiter line and its newline belong to neither part. Content
/// without a closed block is returned untouched.
pub fn split_front_matter(content: &str) -> (Option<&str>, &str) {
    let mut lines = content.split_inclusive('\n');
    match lines.next() {
        Some(first) if first.trim_end() == "---" => {}
        _ => return (None, content),
    }

    let body_start = content.find('\n').map(|i| i + 1).unwrap_or(content.len());
    let mut offset = body_start;
    for line in lines {
        if line.trim_end() == "---" {
            let front = &content[body_start..offset];
            let rest = &content[offset + line.len()..];
            return (Some(front.trim_end_matches(['\n', '\r'])), rest);
        }
        offset += line.len();
    }

    (None, content)
}

/// Partition `content` into sections at heading lines
///
/// Sections are contiguous and cover the content exactly. A section with no
/// text below its heading (or a blank preamble) is folded into the section
/// that follows, so a bare heading never becomes a chunk on its own.
/// Whitespace-only content yields no sections.
pub(crate) fn split_sections<'a>(
    content: &'a str,
    classifier: &dyn BlockClassifier,
) -> Vec<Section<'a>> {
    if content.trim().is_empty() {
        return Vec::new();
    }

    // (start, title, heading line end)
    let mut bounds: Vec<(usize, String, usize)> = Vec::new();
    for block in scan(content, classifier) {
        if let BlockKind::Heading { text, .. } = block.kind {
            bounds.push((block.start, text, block.end));
        }
    }

    if bounds.first().map(|b| b.0) != Some(0) {
        bounds.insert(0, (0, String::new(), 0));
    }

    let mut sections: Vec<Section<'a>> = Vec::with_capacity(bounds.len());
    let mut pending_start: Option<usize> = None;

    for (i, (start, title, heading_end)) in bounds.iter().enumerate() {
        let end = bounds.get(i + 1).map(|b| b.0).unwrap_or(content.len());
        let is_last = i + 1 == bounds.len();
        let body_is_blank = content[*heading_end..end].trim().is_empty();

        let section_start = pending_start.take().unwrap_or(*start);
        if body_is_blank && !is_last {
            pending_start = Some(section_start);
            continue;
        }

        sections.push(Section {
            title: title.clone(),
            content: &content[section_start..end],
        });
    }

    sections
}

/// Whole content as a single untitled section
pub(crate) fn single_section(content: &str) -> Vec<Section<'_>> {
    if content.trim().is_empty() {
        Vec::new()
    } else {
        vec![Section { title: String::new(), content }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingestion::blocks::MarkdownClassifier;

    fn titles(content: &str) -> Vec<(String, String)> {
        split_sections(content, &MarkdownClassifier::new())
            .into_iter()
            .map(|s| (s.title, s.content.to_string()))
            .collect()
    }

    #[test]
    fn test_front_matter_stripped() {
        let (front, rest) = split_front_matter("---\ntitle: Doc\nauthor: A\n---\n# Body\n");
        assert_eq!(front, Some("title: Doc\nauthor: A"));
        assert_eq!(rest, "# Body\n");
    }

    #[test]
    fn test_front_matter_absent_or_unclosed() {
        assert_eq!(split_front_matter("# Body\n"), (None, "# Body\n"));
        assert_eq!(split_front_matter("---\nno close\n"), (None, "---\nno close\n"));
        assert_eq!(split_front_matter("----\nx\n---\n").0, None);
    }

    #[test]
    fn test_sections_partition_content() {
        let content = "preamble\n# A\ntext a\n## B\ntext b\n";
        let sections = split_sections(content, &MarkdownClassifier::new());
        let joined: String = sections.iter().map(|s| s.content).collect();
        assert_eq!(joined, content);
        assert_eq!(
            titles(content),
            vec![
                (String::new(), "preamble\n".to_string()),
                ("A".to_string(), "# A\ntext a\n".to_string()),
                ("B".to_string(), "## B\ntext b\n".to_string()),
            ]
        );
    }

    #[test]
    fn test_heading_only_section_folds_forward() {
        let content = "# T\n## A\nShort a\n## B\nShort b";
        assert_eq!(
            titles(content),
            vec![
                ("A".to_string(), "# T\n## A\nShort a\n".to_string()),
                ("B".to_string(), "## B\nShort b".to_string()),
            ]
        );
    }

    #[test]
    fn test_trailing_heading_kept() {
        let content = "# A\nbody\n# End\n";
        let sections = titles(content);
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[1], ("End".to_string(), "# End\n".to_string()));
    }

    #[test]
    fn test_blank_content_has_no_sections() {
        assert!(split_sections("  \n\n", &MarkdownClassifier::new()).is_empty());
        assert!(single_section("\n").is_empty());
    }
}
