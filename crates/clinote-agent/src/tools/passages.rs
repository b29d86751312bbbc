//! Line-numbered passage lookup over the note.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Value, json};
use std::sync::Arc;

use crate::error::Result;
use crate::tool::{FindPassagesParams, Tool, ToolContext, ToolResult};

#[derive(Debug, Clone, PartialEq, Serialize)]
struct Passage {
    /// 1-based line of the hit.
    line: usize,
    text: String,
}

/// Case-insensitive search that returns quotable passages with line numbers.
#[derive(Debug, Clone)]
pub struct FindPassagesTool {
    note: Arc<str>,
}

impl FindPassagesTool {
    pub fn new(note: Arc<str>) -> Self {
        Self { note }
    }

    fn find(&self, params: &FindPassagesParams) -> (Vec<Passage>, usize) {
        let needle = params.query.to_lowercase();
        let lines: Vec<&str> = self.note.lines().collect();
        let context = params.context_lines as usize;

        let hits: Vec<usize> = lines
            .iter()
            .enumerate()
            .filter(|(_, line)| line.to_lowercase().contains(&needle))
            .map(|(i, _)| i)
            .collect();

        let passages = hits
            .iter()
            .take(params.max_results as usize)
            .map(|&i| {
                let start = i.saturating_sub(context);
                let end = (i + context + 1).min(lines.len());
                Passage {
                    line: i + 1,
                    text: lines[start..end].join("\n"),
                }
            })
            .collect();
        (passages, hits.len())
    }
}

#[async_trait]
impl Tool for FindPassagesTool {
    fn name(&self) -> &str {
        "find_passages"
    }

    fn description(&self) -> &str {
        "Find passages in the session note containing a word or phrase (case-insensitive). Returns line numbers and surrounding text so extracted values can quote their source exactly."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Word or phrase to look for"
                },
                "max_results": {
                    "type": "integer",
                    "description": "Maximum passages to return (1-20, default 5)"
                },
                "context_lines": {
                    "type": "integer",
                    "description": "Lines of context either side of a hit (0-5, default 1)"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<ToolResult> {
        if ctx.is_cancelled() {
            return Ok(ToolResult::error("Operation cancelled"));
        }

        let params = match FindPassagesParams::try_from(params) {
            Ok(p) => p,
            Err(e) => return Ok(ToolResult::error(e.to_string())),
        };

        let (passages, total) = self.find(&params);
        if passages.is_empty() {
            return Ok(ToolResult::text(format!(
                "No passages contain '{}'.",
                params.query
            )));
        }

        Ok(ToolResult::json(json!({
            "query": params.query,
            "total_matches": total,
            "passages": passages,
        })))
    }
}
