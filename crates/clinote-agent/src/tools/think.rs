//! Think tool for recording reasoning during an extraction.
//!
//! Thoughts land in a scratchpad the calling stage can read back after the
//! loop finishes. They are never shown in the extraction itself.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::sync::Arc;

use crate::error::Result;
use crate::tool::{ThinkParams, Tool, ToolContext, ToolResult};

/// Shared list of recorded thoughts.
pub type Scratchpad = Arc<Mutex<Vec<String>>>;

pub fn new_scratchpad() -> Scratchpad {
    Arc::new(Mutex::new(Vec::new()))
}

#[derive(Debug, Clone)]
pub struct ThinkTool {
    scratchpad: Scratchpad,
}

impl ThinkTool {
    pub fn new(scratchpad: Scratchpad) -> Self {
        Self { scratchpad }
    }
}

#[async_trait]
impl Tool for ThinkTool {
    fn name(&self) -> &str {
        "think"
    }

    fn description(&self) -> &str {
        "Record your reasoning before committing to a value, especially for risk fields. Thoughts are kept for review but are not part of the extraction."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "thought": {
                    "type": "string",
                    "description": "Your reasoning or observation to record"
                }
            },
            "required": ["thought"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<ToolResult> {
        if ctx.is_cancelled() {
            return Ok(ToolResult::error("Operation cancelled"));
        }

        let think_params = match ThinkParams::try_from(params) {
            Ok(p) => p,
            Err(e) => return Ok(ToolResult::error(e.to_string())),
        };

        tracing::debug!(run_id = %ctx.run_id, len = think_params.thought.len(), "Thought recorded");
        self.scratchpad.lock().push(think_params.thought);
        Ok(ToolResult::text("Thought recorded."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_think_tool_metadata() {
        let tool = ThinkTool::new(new_scratchpad());
        assert_eq!(tool.name(), "think");
        assert_eq!(tool.parameters()["required"][0], "thought");
    }

    #[tokio::test]
    async fn test_think_records_thought() {
        let pad = new_scratchpad();
        let tool = ThinkTool::new(pad.clone());

        let result = tool
            .execute(
                json!({"thought": "Passive SI: wish to not wake up, no plan"}),
                &ToolContext::default(),
            )
            .await
            .unwrap();

        assert!(result.to_llm_content().contains("Thought recorded"));
        assert_eq!(*pad.lock(), vec!["Passive SI: wish to not wake up, no plan"]);
    }

    #[tokio::test]
    async fn test_think_empty_thought() {
        let tool = ThinkTool::new(new_scratchpad());
        let result = tool
            .execute(json!({"thought": "  "}), &ToolContext::default())
            .await
            .unwrap();
        assert!(result.is_error());
        assert!(result.to_llm_content().contains("cannot be empty"));
    }

    #[tokio::test]
    async fn test_think_cancelled() {
        let ctx = ToolContext::default();
        ctx.cancellation.cancel();
        let result = ThinkTool::new(new_scratchpad())
            .execute(json!({"thought": "x"}), &ctx)
            .await
            .unwrap();
        assert!(result.is_error());
    }
}
