//! Checks a parsed document must pass before any model sees it.

use clinote_types::ParsedDocument;

use crate::error::{PipelineError, Result};
use crate::settings::ValidationRules;

pub fn validate(document: &ParsedDocument, rules: &ValidationRules) -> Result<()> {
    let content = document.content.trim();
    if content.is_empty() {
        return Err(PipelineError::Validation(
            "document has no text content".to_string(),
        ));
    }

    let chars = content.chars().count();
    if chars < rules.min_content_chars {
        return Err(PipelineError::Validation(format!(
            "document content too short: {} characters (minimum {})",
            chars, rules.min_content_chars
        )));
    }

    if document.page_count > rules.max_pages {
        return Err(PipelineError::Validation(format!(
            "document has too many pages: {} (maximum {})",
            document.page_count, rules.max_pages
        )));
    }

    if document.confidence < rules.min_parse_confidence {
        return Err(PipelineError::Validation(format!(
            "parser confidence {:.2} below minimum {:.2}",
            document.confidence, rules.min_parse_confidence
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document(content: &str) -> ParsedDocument {
        ParsedDocument {
            content: content.to_string(),
            page_count: 1,
            confidence: 0.95,
            ..Default::default()
        }
    }

    fn message(result: Result<()>) -> String {
        match result {
            Err(PipelineError::Validation(message)) => message,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_accepts_normal_note() {
        let doc = document(&"Client reports improved sleep and mood. ".repeat(3));
        assert!(validate(&doc, &ValidationRules::default()).is_ok());
    }

    #[test]
    fn test_rejects_blank_and_short() {
        let rules = ValidationRules::default();
        assert!(message(validate(&document("  \n\t "), &rules)).contains("no text content"));
        assert!(message(validate(&document("Brief note."), &rules)).contains("too short"));
    }

    #[test]
    fn test_rejects_page_count_and_low_confidence() {
        let rules = ValidationRules::default();
        let text = "x".repeat(60);

        let mut doc = document(&text);
        doc.page_count = 51;
        assert!(message(validate(&doc, &rules)).contains("too many pages: 51"));

        let mut doc = document(&text);
        doc.confidence = 0.2;
        assert_eq!(
            message(validate(&doc, &rules)),
            "parser confidence 0.20 below minimum 0.30"
        );
    }

    #[test]
    fn test_boundaries_are_inclusive() {
        let rules = ValidationRules::default();
        let mut doc = document(&"x".repeat(50));
        doc.page_count = 50;
        doc.confidence = 0.3;
        assert!(validate(&doc, &rules).is_ok());
    }
}
