//! Turning model answers into typed values.
//!
//! Models wrap JSON in code fences or chatter around it. We strip fences,
//! fall back to the outermost `{...}`, and otherwise fail. A missing or
//! malformed answer is never replaced by a default, and neither is a missing
//! risk rating: an absent value would read as none.

use clinote_types::RiskField;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{PipelineError, Result};

/// Parse `raw` into `T`, naming `context` in the error.
pub fn parse_json<T: DeserializeOwned>(raw: &str, context: &str) -> Result<T> {
    let value = parse_object(raw, context)?;
    serde_json::from_value(value).map_err(|e| PipelineError::json_parse(context, e.to_string()))
}

/// Find and parse the JSON object in `raw`.
pub fn parse_object(raw: &str, context: &str) -> Result<Value> {
    let cleaned = strip_code_fences(raw);
    if cleaned.is_empty() {
        return Err(PipelineError::json_parse(context, "empty response"));
    }

    let first_error = match serde_json::from_str::<Value>(cleaned) {
        Ok(value @ Value::Object(_)) => return Ok(value),
        Ok(_) => "response is not a JSON object".to_string(),
        Err(e) => e.to_string(),
    };

    match extract_json_object(cleaned) {
        Some(candidate) => match serde_json::from_str::<Value>(candidate) {
            Ok(value @ Value::Object(_)) => Ok(value),
            _ => Err(PipelineError::json_parse(context, first_error)),
        },
        None => Err(PipelineError::json_parse(context, "no JSON object found")),
    }
}

/// Require a rated risk section: an object carrying a non-null `value` for
/// every ordered risk field.
pub fn require_risk_values(risk: Option<&Value>, context: &str) -> Result<()> {
    let Some(risk) = risk.filter(|r| r.is_object()) else {
        return Err(PipelineError::json_parse(context, "no risk section"));
    };
    let missing = missing_risk_values(risk);
    if missing.is_empty() {
        Ok(())
    } else {
        Err(PipelineError::json_parse(
            context,
            format!("no risk value for {}", missing.join(", ")),
        ))
    }
}

/// Keys of the ordered risk fields with no `value` in `risk`.
pub fn missing_risk_values(risk: &Value) -> Vec<&'static str> {
    RiskField::ALL
        .iter()
        .map(|field| field.key())
        .filter(|key| {
            risk.get(key)
                .and_then(|entry| entry.get("value"))
                .is_none_or(Value::is_null)
        })
        .collect()
}

/// Strip a surrounding markdown code fence, with or without a language tag.
pub fn strip_code_fences(s: &str) -> &str {
    let s = s.trim();
    let Some(rest) = s.strip_prefix("```") else {
        return s;
    };
    let Some(inner) = rest.strip_suffix("```") else {
        return s;
    };
    // Drop the info string ("json", "JSON", ...) on the opening line.
    match inner.find('\n') {
        Some(newline) if !inner[..newline].contains('{') => inner[newline + 1..].trim(),
        _ => inner.trim(),
    }
}

/// The span from the first `{` to the last `}`.
fn extract_json_object(s: &str) -> Option<&str> {
    let start = s.find('{')?;
    let end = s.rfind('}')?;
    (end > start).then(|| &s[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use clinote_types::{ClinicalExtraction, SuicidalIdeation};

    #[test]
    fn test_plain_object() {
        let value = parse_object(r#"{"a": 1}"#, "test").unwrap();
        assert_eq!(value["a"], 1);
    }

    #[test]
    fn test_fenced_object() {
        let raw = "```json\n{\"risk\": {\"suicidal_ideation\": {\"value\": \"passive\", \"confidence\": 0.8}}}\n```";
        let extraction: ClinicalExtraction = parse_json(raw, "clinical extraction").unwrap();
        assert_eq!(extraction.risk.suicidal_ideation.value, SuicidalIdeation::Passive);
    }

    #[test]
    fn test_fence_without_language_tag() {
        assert_eq!(strip_code_fences("```\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```{\"a\":1}```"), "{\"a\":1}");
    }

    #[test]
    fn test_object_inside_chatter() {
        let raw = "Here is the extraction:\n{\"a\": {\"b\": 2}}\nLet me know!";
        let value = parse_object(raw, "test").unwrap();
        assert_eq!(value["a"]["b"], 2);
    }

    #[test]
    fn test_failures_are_errors_not_defaults() {
        for raw in ["", "   ", "no json here", "[1, 2, 3]", "{\"a\": ", "```json\n```"] {
            let err = parse_object(raw, "clinical extraction").unwrap_err();
            assert!(
                matches!(err, PipelineError::JsonParse { ref context, .. } if context == "clinical extraction"),
                "{raw:?} gave {err:?}"
            );
        }
    }

    #[test]
    fn test_risk_section_required() {
        let err = require_risk_values(None, "clinical extraction").unwrap_err();
        assert!(err.to_string().contains("no risk section"));

        let not_object = serde_json::json!("none");
        assert!(require_risk_values(Some(&not_object), "clinical extraction").is_err());
    }

    #[test]
    fn test_unrated_risk_fields_named() {
        let risk = serde_json::json!({
            "suicidal_ideation": {"value": "none", "confidence": 0.9},
            "self_harm": {"value": null, "confidence": 0.9},
            "homicidal_ideation": {"confidence": 0.9}
        });
        assert_eq!(
            missing_risk_values(&risk),
            vec!["self_harm", "homicidal_ideation", "risk_level_overall"]
        );
        let err = require_risk_values(Some(&risk), "risk re-extraction").unwrap_err();
        assert!(matches!(err, PipelineError::JsonParse { ref context, .. } if context == "risk re-extraction"));
    }

    #[test]
    fn test_fully_rated_risk_accepted() {
        let risk = serde_json::json!({
            "suicidal_ideation": {"value": "none", "confidence": 0.9},
            "self_harm": {"value": "none", "confidence": 0.9},
            "homicidal_ideation": {"value": "none", "confidence": 0.9},
            "risk_level_overall": {"value": "low", "confidence": 0.9}
        });
        assert!(missing_risk_values(&risk).is_empty());
        assert!(require_risk_values(Some(&risk), "clinical extraction").is_ok());
    }

    #[test]
    fn test_type_mismatch_is_error() {
        let raw = r#"{"session_info": {"session_number": {"value": "three", "confidence": 0.9}}}"#;
        let err = parse_json::<ClinicalExtraction>(raw, "clinical extraction").unwrap_err();
        assert!(matches!(err, PipelineError::JsonParse { .. }));
    }
}
