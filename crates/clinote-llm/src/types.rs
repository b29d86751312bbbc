//! Provider-agnostic request and response types.
//!
//! The shapes follow the block-structured messages most tool-calling APIs
//! use: an assistant turn is a list of text and `tool_use` blocks, and the
//! answering user turn carries one `tool_result` block per call.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::ResponseValidationError;

// ─────────────────────────────────────────────────────────────────────────────
// Completion Request
// ─────────────────────────────────────────────────────────────────────────────

/// A completion request to a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub model: String,

    pub messages: Vec<Message>,

    pub max_tokens: u32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    /// Tools the model may call.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,

    /// Requested output shape (plain text or a JSON object).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl CompletionRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>, max_tokens: u32) -> Self {
        Self {
            model: model.into(),
            messages,
            max_tokens,
            system: None,
            tools: Vec::new(),
            tool_choice: None,
            response_format: None,
            temperature: None,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_tool_choice(mut self, choice: ToolChoice) -> Self {
        self.tool_choice = Some(choice);
        self
    }

    pub fn with_response_format(mut self, format: ResponseFormat) -> Self {
        self.response_format = Some(format);
        self
    }

    /// Set the sampling temperature, clamped to 0.0..=2.0.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature.clamp(0.0, 2.0));
        self
    }
}

/// Output shape requested from the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFormat {
    #[default]
    Text,
    /// The final answer must be a single JSON object.
    JsonObject,
}

// ─────────────────────────────────────────────────────────────────────────────
// Messages
// ─────────────────────────────────────────────────────────────────────────────

/// A message in the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: Content,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: Content::Text(text.into()),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: Content::Text(text.into()),
        }
    }

    /// An assistant turn replayed verbatim, tool_use blocks included.
    pub fn assistant_blocks(blocks: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::Assistant,
            content: Content::Blocks(blocks),
        }
    }

    /// A user turn answering tool calls. Order must match the calls.
    pub fn tool_results(results: Vec<ToolResultBlock>) -> Self {
        Self {
            role: Role::User,
            content: Content::Blocks(results.into_iter().map(Into::into).collect()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Message content: a plain string or structured blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Content {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

impl Content {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Content::Text(s) => Some(s),
            Content::Blocks(_) => None,
        }
    }

    pub fn blocks(&self) -> Vec<ContentBlock> {
        match self {
            Content::Text(s) => vec![ContentBlock::text(s.clone())],
            Content::Blocks(blocks) => blocks.clone(),
        }
    }

    /// Concatenated text of all text blocks.
    pub fn to_text(&self) -> String {
        match self {
            Content::Text(s) => s.clone(),
            Content::Blocks(blocks) => blocks
                .iter()
                .filter_map(|b| match b {
                    ContentBlock::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join(""),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Content Blocks
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    /// A tool call requested by the assistant.
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    /// The answer to a tool call, sent back in a user turn.
    ToolResult {
        tool_use_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        content: Option<String>,
        #[serde(default)]
        is_error: bool,
    },
}

impl ContentBlock {
    pub fn text(content: impl Into<String>) -> Self {
        ContentBlock::Text {
            text: content.into(),
        }
    }

    pub fn tool_use(
        id: impl Into<String>,
        name: impl Into<String>,
        input: serde_json::Value,
    ) -> Self {
        ContentBlock::ToolUse {
            id: id.into(),
            name: name.into(),
            input,
        }
    }
}

/// A tool call pulled out of a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolUseBlock {
    pub id: String,
    pub name: String,
    pub input: serde_json::Value,
}

impl From<ToolUseBlock> for ContentBlock {
    fn from(block: ToolUseBlock) -> Self {
        ContentBlock::ToolUse {
            id: block.id,
            name: block.name,
            input: block.input,
        }
    }
}

/// A tool result keyed to the call it answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResultBlock {
    pub tool_use_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default)]
    pub is_error: bool,
}

impl ToolResultBlock {
    pub fn success(tool_use_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_use_id: tool_use_id.into(),
            content: Some(content.into()),
            is_error: false,
        }
    }

    pub fn error(tool_use_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            tool_use_id: tool_use_id.into(),
            content: Some(error.into()),
            is_error: true,
        }
    }
}

impl From<ToolResultBlock> for ContentBlock {
    fn from(block: ToolResultBlock) -> Self {
        ContentBlock::ToolResult {
            tool_use_id: block.tool_use_id,
            content: block.content,
            is_error: block.is_error,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tools
// ─────────────────────────────────────────────────────────────────────────────

/// A tool offered to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema for the tool's arguments.
    pub input_schema: serde_json::Value,
}

impl ToolDefinition {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolChoice {
    Auto,
    /// Model must call some tool.
    Any,
    Tool { name: String },
    None,
}

// ─────────────────────────────────────────────────────────────────────────────
// Completion Response
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub id: String,
    pub content: Vec<ContentBlock>,
    /// The model that actually answered, which may differ from the requested alias.
    pub model: String,
    pub stop_reason: Option<StopReason>,
    pub usage: Usage,
}

impl CompletionResponse {
    pub fn new(
        id: impl Into<String>,
        model: impl Into<String>,
        content: Vec<ContentBlock>,
        stop_reason: StopReason,
        usage: Usage,
    ) -> Self {
        Self {
            id: id.into(),
            content,
            model: model.into(),
            stop_reason: Some(stop_reason),
            usage,
        }
    }

    /// Tool calls in the order the model issued them.
    pub fn tool_uses(&self) -> Vec<ToolUseBlock> {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::ToolUse { id, name, input } => Some(ToolUseBlock {
                    id: id.clone(),
                    name: name.clone(),
                    input: input.clone(),
                }),
                _ => None,
            })
            .collect()
    }

    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    pub fn has_tool_use(&self) -> bool {
        self.content
            .iter()
            .any(|block| matches!(block, ContentBlock::ToolUse { .. }))
    }

    /// Check tool_use blocks have ids, sane names, unique ids and object inputs.
    pub fn validate(&self) -> Result<(), ResponseValidationError> {
        let mut errors = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();

        if self.model.trim().is_empty() {
            errors.push(ResponseValidationError::MissingField { field: "model" });
        }

        for block in &self.content {
            let ContentBlock::ToolUse { id, name, input } = block else {
                continue;
            };
            if id.trim().is_empty() {
                errors.push(ResponseValidationError::invalid_tool_use(id, "id cannot be empty"));
            } else if !seen.insert(id.as_str()) {
                errors.push(ResponseValidationError::invalid_tool_use(id, "duplicate tool_use id"));
            }
            if name.trim().is_empty()
                || !name.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-')
            {
                errors.push(ResponseValidationError::invalid_tool_use(
                    id,
                    format!("invalid tool name '{}'", name),
                ));
            }
            if !input.is_object() {
                errors.push(ResponseValidationError::invalid_tool_use(
                    id,
                    "input must be an object",
                ));
            }
        }

        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(ResponseValidationError::Multiple(errors)),
        }
    }
}

/// Why the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EndTurn,
    ToolUse,
    MaxTokens,
    StopSequence,
    /// Output withheld by the provider's content filter.
    ContentFilter,
    /// The model declined to answer.
    Refusal,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopReason::EndTurn => "end_turn",
            StopReason::ToolUse => "tool_use",
            StopReason::MaxTokens => "max_tokens",
            StopReason::StopSequence => "stop_sequence",
            StopReason::ContentFilter => "content_filter",
            StopReason::Refusal => "refusal",
        }
    }
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Token usage statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl Usage {
    pub fn new(input_tokens: u32, output_tokens: u32) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }

    pub fn total(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }

    /// Fold another response's usage into this running total.
    pub fn add(&mut self, other: &Usage) {
        self.input_tokens = self.input_tokens.saturating_add(other.input_tokens);
        self.output_tokens = self.output_tokens.saturating_add(other.output_tokens);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_builder() {
        let request = CompletionRequest::new("gpt-4o-mini", vec![Message::user("note")], 1024)
            .with_system("You extract clinical fields.")
            .with_response_format(ResponseFormat::JsonObject)
            .with_temperature(3.5);

        assert_eq!(request.system.as_deref(), Some("You extract clinical fields."));
        assert_eq!(request.response_format, Some(ResponseFormat::JsonObject));
        assert_eq!(request.temperature, Some(2.0));
        assert!(request.tools.is_empty());
    }

    #[test]
    fn test_tool_results_message_keeps_order() {
        let msg = Message::tool_results(vec![
            ToolResultBlock::success("call_a", "first"),
            ToolResultBlock::error("call_b", "second"),
        ]);
        assert_eq!(msg.role, Role::User);
        let blocks = msg.content.blocks();
        let ids: Vec<_> = blocks
            .iter()
            .filter_map(|b| match b {
                ContentBlock::ToolResult { tool_use_id, .. } => Some(tool_use_id.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(ids, vec!["call_a", "call_b"]);
    }

    #[test]
    fn test_response_accessors() {
        let response = CompletionResponse::new(
            "msg_1",
            "test-model",
            vec![
                ContentBlock::text("Scanning "),
                ContentBlock::tool_use("t1", "keyword_scan", json!({})),
                ContentBlock::text("now"),
                ContentBlock::tool_use("t2", "find_passages", json!({"query": "plan"})),
            ],
            StopReason::ToolUse,
            Usage::new(5, 7),
        );

        assert!(response.has_tool_use());
        assert_eq!(response.text(), "Scanning now");
        let names: Vec<_> = response.tool_uses().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["keyword_scan", "find_passages"]);
        assert_eq!(response.usage.total(), 12);
    }

    #[test]
    fn test_validate_rejects_duplicate_and_bad_tool_use() {
        let response = CompletionResponse::new(
            "msg_1",
            "test-model",
            vec![
                ContentBlock::tool_use("t1", "keyword_scan", json!({})),
                ContentBlock::tool_use("t1", "bad name!", json!("not an object")),
            ],
            StopReason::ToolUse,
            Usage::default(),
        );
        let err = response.validate().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("duplicate"));
        assert!(msg.contains("bad name!"));
        assert!(msg.contains("must be an object"));
    }

    #[test]
    fn test_validate_accepts_plain_text() {
        let response = CompletionResponse::new(
            "msg_1",
            "test-model",
            vec![ContentBlock::text("{}")],
            StopReason::EndTurn,
            Usage::default(),
        );
        assert!(response.validate().is_ok());
    }

    #[test]
    fn test_usage_add() {
        let mut total = Usage::default();
        total.add(&Usage::new(10, 20));
        total.add(&Usage::new(1, 2));
        assert_eq!(total, Usage::new(11, 22));
    }

    #[test]
    fn test_content_block_serde_tagging() {
        let block = ContentBlock::tool_use("t1", "think", json!({"thought": "x"}));
        let value = serde_json::to_value(&block).unwrap();
        assert_eq!(value["type"], "tool_use");
        assert_eq!(value["name"], "think");

        let result: ContentBlock = ToolResultBlock::error("t1", "boom").into();
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["type"], "tool_result");
        assert_eq!(value["is_error"], true);
    }

    #[test]
    fn test_stop_reason_display() {
        assert_eq!(StopReason::ContentFilter.to_string(), "content_filter");
        assert_eq!(StopReason::MaxTokens.to_string(), "max_tokens");
    }
}
