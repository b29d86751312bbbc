//! Document parsing boundary and a plain-text reference parser.

use std::sync::Arc;

use async_trait::async_trait;
use clinote_types::{DocumentSection, ParsedDocument};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("document is {size} bytes, larger than the {max} byte limit")]
    TooLarge { size: usize, max: usize },

    #[error("document has {pages} pages, more than the {max} page limit")]
    TooManyPages { pages: u32, max: u32 },

    #[error("unsupported document type: {0}")]
    Unsupported(String),

    #[error("parser error: {0}")]
    Backend(String),
}

/// Extracts text and layout from an uploaded note.
#[async_trait]
pub trait DocumentParser: Send + Sync {
    async fn parse(&self, bytes: &[u8], filename: &str) -> Result<ParsedDocument, ParseError>;
}

pub type SharedParser = Arc<dyn DocumentParser>;

// ─────────────────────────────────────────────────────────────────────────────
// Plain Text Parser
// ─────────────────────────────────────────────────────────────────────────────

const TEXT_EXTENSIONS: &[&str] = &["txt", "md", "markdown", "text"];

/// Parses UTF-8 text and markdown notes.
///
/// Form feeds separate pages. Markdown `#` headings start sections. Invalid
/// UTF-8 is decoded lossily and lowers the reported confidence.
#[derive(Debug, Clone)]
pub struct PlainTextParser {
    max_bytes: usize,
    max_pages: u32,
}

impl PlainTextParser {
    pub fn new(max_bytes: usize, max_pages: u32) -> Self {
        Self {
            max_bytes,
            max_pages,
        }
    }
}

impl Default for PlainTextParser {
    fn default() -> Self {
        Self::new(10 * 1024 * 1024, 50)
    }
}

#[async_trait]
impl DocumentParser for PlainTextParser {
    async fn parse(&self, bytes: &[u8], filename: &str) -> Result<ParsedDocument, ParseError> {
        if bytes.len() > self.max_bytes {
            return Err(ParseError::TooLarge {
                size: bytes.len(),
                max: self.max_bytes,
            });
        }

        let extension = filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase());
        if let Some(ref ext) = extension
            && !TEXT_EXTENSIONS.contains(&ext.as_str())
        {
            return Err(ParseError::Unsupported(format!(".{} files", ext)));
        }
        let is_markdown = matches!(extension.as_deref(), Some("md" | "markdown"));

        let decoded = String::from_utf8_lossy(bytes);
        let confidence = decode_confidence(&decoded);
        let raw = decoded.replace("\r\n", "\n");

        let pages = raw.matches('\x0c').count() as u32 + 1;
        if pages > self.max_pages {
            return Err(ParseError::TooManyPages {
                pages,
                max: self.max_pages,
            });
        }

        let content = raw.replace('\x0c', "\n");
        let sections = split_sections(&content);

        Ok(ParsedDocument {
            markdown_content: is_markdown.then(|| content.clone()),
            content,
            sections,
            page_count: pages,
            confidence,
        })
    }
}

/// Share of characters that decoded cleanly.
fn decode_confidence(text: &str) -> f64 {
    let total = text.chars().count();
    if total == 0 {
        return 1.0;
    }
    let replaced = text.chars().filter(|&c| c == char::REPLACEMENT_CHARACTER).count();
    1.0 - replaced as f64 / total as f64
}

fn split_sections(content: &str) -> Vec<DocumentSection> {
    let mut sections = Vec::new();
    let mut current = DocumentSection::default();

    for line in content.lines() {
        if let Some(heading) = line.trim_start().strip_prefix('#') {
            if !current.heading.is_empty() || !current.content.trim().is_empty() {
                sections.push(finish(current));
            }
            current = DocumentSection {
                heading: heading.trim_start_matches('#').trim().to_string(),
                content: String::new(),
            };
        } else {
            current.content.push_str(line);
            current.content.push('\n');
        }
    }
    if !current.heading.is_empty() || !current.content.trim().is_empty() {
        sections.push(finish(current));
    }
    sections
}

fn finish(mut section: DocumentSection) -> DocumentSection {
    section.content = section.content.trim().to_string();
    section
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_parse_markdown_sections() {
        let note = "Client seen for follow-up.\n# Mood\nLow, tearful.\n## Risk\nDenies SI.\n";
        let parsed = PlainTextParser::default()
            .parse(note.as_bytes(), "session.md")
            .await
            .unwrap();

        assert_eq!(parsed.page_count, 1);
        assert_eq!(parsed.confidence, 1.0);
        assert!(parsed.markdown_content.is_some());
        let headings: Vec<_> = parsed.sections.iter().map(|s| s.heading.as_str()).collect();
        assert_eq!(headings, vec!["", "Mood", "Risk"]);
        assert_eq!(parsed.sections[2].content, "Denies SI.");
    }

    #[tokio::test]
    async fn test_form_feeds_count_pages() {
        let note = "page one\x0cpage two\x0cpage three";
        let parsed = PlainTextParser::default()
            .parse(note.as_bytes(), "note.txt")
            .await
            .unwrap();
        assert_eq!(parsed.page_count, 3);
        assert!(!parsed.content.contains('\x0c'));
        assert!(parsed.markdown_content.is_none());
    }

    #[tokio::test]
    async fn test_limits() {
        let parser = PlainTextParser::new(16, 2);
        let err = parser.parse(&[b'a'; 17], "note.txt").await.unwrap_err();
        assert!(matches!(err, ParseError::TooLarge { size: 17, max: 16 }));

        let err = parser.parse(b"a\x0cb\x0cc", "note.txt").await.unwrap_err();
        assert!(matches!(err, ParseError::TooManyPages { pages: 3, max: 2 }));
    }

    #[tokio::test]
    async fn test_rejects_binary_formats() {
        let err = PlainTextParser::default()
            .parse(b"%PDF-1.7", "note.pdf")
            .await
            .unwrap_err();
        assert!(matches!(err, ParseError::Unsupported(_)));
    }

    #[tokio::test]
    async fn test_invalid_utf8_lowers_confidence() {
        let parsed = PlainTextParser::default()
            .parse(&[b'o', b'k', 0xff, 0xfe], "note")
            .await
            .unwrap();
        assert!(parsed.confidence < 1.0);
        assert!(parsed.confidence > 0.0);
    }
}
