//! Single extracted values with confidence and provenance.

use serde::{Deserialize, Deserializer, Serialize};

/// Where in the note an extracted value came from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceSpan {
    /// The quoted note text supporting the value.
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<usize>,
}

impl SourceSpan {
    pub fn quote(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            start: None,
            end: None,
        }
    }
}

/// One extracted value.
///
/// A field whose `value` equals its type's default counts as "not
/// extracted", whatever its confidence says. See [`FieldValue::has_value`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de> + Default"))]
pub struct ExtractedField<T> {
    #[serde(default)]
    pub value: T,
    #[serde(default, deserialize_with = "clamped_confidence")]
    pub confidence: f64,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_source"
    )]
    pub source: Option<SourceSpan>,
}

impl<T> ExtractedField<T> {
    pub fn new(value: T, confidence: f64) -> Self {
        Self {
            value,
            confidence: confidence.clamp(0.0, 1.0),
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(SourceSpan::quote(source));
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// FieldValue
// ─────────────────────────────────────────────────────────────────────────────

/// Whether a value is its type's "nothing extracted" default.
pub trait Unset {
    fn is_unset(&self) -> bool;
}

impl Unset for String {
    fn is_unset(&self) -> bool {
        self.trim().is_empty()
    }
}

impl<T> Unset for Vec<T> {
    fn is_unset(&self) -> bool {
        self.is_empty()
    }
}

impl<T> Unset for Option<T> {
    fn is_unset(&self) -> bool {
        self.is_none()
    }
}

impl Unset for i64 {
    fn is_unset(&self) -> bool {
        *self == 0
    }
}

impl Unset for bool {
    fn is_unset(&self) -> bool {
        !*self
    }
}

/// Type-erased view of an [`ExtractedField`] used when walking sections.
pub trait FieldValue {
    fn has_value(&self) -> bool;
    fn confidence(&self) -> f64;
}

impl<T: Unset> FieldValue for ExtractedField<T> {
    fn has_value(&self) -> bool {
        !self.value.is_unset()
    }

    fn confidence(&self) -> f64 {
        self.confidence
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Lenient deserializers for model output
// ─────────────────────────────────────────────────────────────────────────────

fn clamped_confidence<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let raw = Option::<f64>::deserialize(deserializer)?.unwrap_or(0.0);
    if raw.is_nan() {
        return Ok(0.0);
    }
    Ok(raw.clamp(0.0, 1.0))
}

/// Models write provenance either as a bare quote or as a span object.
fn lenient_source<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<SourceSpan>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Quote(String),
        Span(SourceSpan),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Quote(text)) if !text.trim().is_empty() => Some(SourceSpan::quote(text)),
        Some(Raw::Span(span)) if !span.text.trim().is_empty() => Some(span),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_values_are_unset() {
        assert!(!ExtractedField::new(String::new(), 0.9).has_value());
        assert!(!ExtractedField::new("  ".to_string(), 0.9).has_value());
        assert!(!ExtractedField::new(Vec::<String>::new(), 0.9).has_value());
        assert!(!ExtractedField::new(0i64, 0.9).has_value());
        assert!(!ExtractedField::new(false, 0.9).has_value());

        assert!(ExtractedField::new("anxious".to_string(), 0.9).has_value());
        assert!(ExtractedField::new(vec!["CBT".to_string()], 0.9).has_value());
        assert!(ExtractedField::new(7i64, 0.9).has_value());
        assert!(ExtractedField::new(true, 0.9).has_value());
    }

    #[test]
    fn test_confidence_clamped() {
        let field: ExtractedField<String> =
            serde_json::from_value(json!({"value": "x", "confidence": 1.7})).unwrap();
        assert_eq!(field.confidence, 1.0);

        let field: ExtractedField<String> =
            serde_json::from_value(json!({"value": "x", "confidence": -0.2})).unwrap();
        assert_eq!(field.confidence, 0.0);

        assert_eq!(ExtractedField::new(1i64, 3.0).confidence, 1.0);
    }

    #[test]
    fn test_missing_parts_default() {
        let field: ExtractedField<Vec<String>> = serde_json::from_value(json!({})).unwrap();
        assert!(field.value.is_empty());
        assert_eq!(field.confidence, 0.0);
        assert!(field.source.is_none());

        let field: ExtractedField<String> =
            serde_json::from_value(json!({"value": "x", "confidence": null})).unwrap();
        assert_eq!(field.confidence, 0.0);
    }

    #[test]
    fn test_source_as_quote_or_span() {
        let field: ExtractedField<String> = serde_json::from_value(json!({
            "value": "low", "confidence": 0.8, "source": "I feel flat"
        }))
        .unwrap();
        assert_eq!(field.source, Some(SourceSpan::quote("I feel flat")));

        let field: ExtractedField<String> = serde_json::from_value(json!({
            "value": "low", "confidence": 0.8,
            "source": {"text": "I feel flat", "start": 10, "end": 21}
        }))
        .unwrap();
        assert_eq!(field.source.unwrap().start, Some(10));

        let field: ExtractedField<String> = serde_json::from_value(json!({
            "value": "low", "source": ""
        }))
        .unwrap();
        assert!(field.source.is_none());
    }

    #[test]
    fn test_wrong_value_type_is_an_error() {
        let result: Result<ExtractedField<i64>, _> =
            serde_json::from_value(json!({"value": "seven", "confidence": 0.5}));
        assert!(result.is_err());
    }
}
