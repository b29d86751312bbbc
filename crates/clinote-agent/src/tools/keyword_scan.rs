//! Keyword safety net exposed as a tool.

use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;

use clinote_risk::{KeywordCategory, safety_net};

use crate::error::Result;
use crate::tool::{KeywordScanParams, Tool, ToolContext, ToolResult};

/// Lets a model check the note (or a quoted excerpt) for danger phrases.
#[derive(Debug, Clone)]
pub struct KeywordScanTool {
    note: Arc<str>,
}

impl KeywordScanTool {
    pub fn new(note: Arc<str>) -> Self {
        Self { note }
    }
}

#[async_trait]
impl Tool for KeywordScanTool {
    fn name(&self) -> &str {
        "keyword_scan"
    }

    fn description(&self) -> &str {
        "Scan the session note (or a supplied excerpt) for suicidal, self-harm and homicidal danger phrases. Returns the matched phrases by category. A match is evidence to examine, not a conclusion."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "text": {
                    "type": "string",
                    "description": "Excerpt to scan. Omit to scan the whole note."
                },
                "category": {
                    "type": "string",
                    "enum": ["suicidal", "self-harm", "homicidal"],
                    "description": "Only report this category"
                }
            }
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<ToolResult> {
        if ctx.is_cancelled() {
            return Ok(ToolResult::error("Operation cancelled"));
        }

        let params = match KeywordScanParams::try_from(params) {
            Ok(p) => p,
            Err(e) => return Ok(ToolResult::error(e.to_string())),
        };
        let text = params.text.as_deref().unwrap_or(&self.note);

        let category = match params.category.as_deref() {
            Some("suicidal") => Some(KeywordCategory::Suicidal),
            Some("self-harm") => Some(KeywordCategory::SelfHarm),
            Some("homicidal") => Some(KeywordCategory::Homicidal),
            _ => None,
        };

        let result = match category {
            Some(category) => {
                let mut map = serde_json::Map::new();
                map.insert(
                    category.as_str().to_string(),
                    json!(safety_net::scan_category(text, category)),
                );
                Value::Object(map)
            }
            None => {
                let scan = safety_net::scan(text);
                json!({
                    "suicidal": scan.suicidal_matches,
                    "self-harm": scan.self_harm_matches,
                    "homicidal": scan.homicidal_matches,
                })
            }
        };
        Ok(ToolResult::json(result))
    }
}
