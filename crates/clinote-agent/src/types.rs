//! Core types for the agent loop.
//!
//! - [`Transcript`]: the conversation threaded through each provider turn
//! - [`AgentLoopConfig`]: model settings and loop bounds
//! - [`AgentLoopResult`]: what a loop run produced, complete or partial

use std::fmt;
use std::time::Duration;

use clinote_llm::{ContentBlock, Message, ResponseFormat, ToolResultBlock, Usage};
use serde::{Deserialize, Serialize};

/// Tool calls allowed across one loop run.
pub const DEFAULT_MAX_TOOL_CALLS: usize = 15;

/// Wall-clock budget for one loop run.
pub const DEFAULT_LOOP_TIMEOUT: Duration = Duration::from_secs(300);

/// Provider round-trips allowed across one loop run.
pub const DEFAULT_MAX_ITERATIONS: u32 = 25;

// ─────────────────────────────────────────────────────────────────────────────
// Transcript
// ─────────────────────────────────────────────────────────────────────────────

/// System prompt plus the message history of one loop run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    pub system: Option<String>,
    pub messages: Vec<Message>,
}

impl Transcript {
    pub fn new(system: impl Into<String>) -> Self {
        Self {
            system: Some(system.into()),
            messages: Vec::new(),
        }
    }

    pub fn with_user(mut self, text: impl Into<String>) -> Self {
        self.push_user(text);
        self
    }

    pub fn push_user(&mut self, text: impl Into<String>) {
        self.messages.push(Message::user(text));
    }

    pub fn push_assistant(&mut self, blocks: Vec<ContentBlock>) {
        self.messages.push(Message::assistant_blocks(blocks));
    }

    pub fn push_tool_results(&mut self, results: Vec<ToolResultBlock>) {
        self.messages.push(Message::tool_results(results));
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Settings for one agent loop.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentLoopConfig {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: Option<f32>,
    pub response_format: Option<ResponseFormat>,
    pub max_tool_calls: usize,
    pub timeout: Duration,
    pub max_iterations: u32,
}

impl AgentLoopConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Ask the provider for a bare JSON object.
    pub fn with_json_output(mut self) -> Self {
        self.response_format = Some(ResponseFormat::JsonObject);
        self
    }

    pub fn with_max_tool_calls(mut self, max_tool_calls: usize) -> Self {
        self.max_tool_calls = max_tool_calls;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }
}

impl Default for AgentLoopConfig {
    fn default() -> Self {
        Self {
            model: String::new(),
            max_tokens: 4096,
            temperature: None,
            response_format: None,
            max_tool_calls: DEFAULT_MAX_TOOL_CALLS,
            timeout: DEFAULT_LOOP_TIMEOUT,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Results
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopStatus {
    Complete,
    Partial,
}

/// Why a loop stopped without a final answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum PartialReason {
    ToolLimitExceeded,
    /// The loop's own deadline passed.
    TimedOut,
    /// The caller cancelled.
    Cancelled,
    UnexpectedStop(String),
}

impl fmt::Display for PartialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ToolLimitExceeded => f.write_str("tool limit exceeded"),
            Self::TimedOut => f.write_str("timed out"),
            Self::Cancelled => f.write_str("cancelled"),
            Self::UnexpectedStop(detail) => write!(f, "unexpected stop: {}", detail),
        }
    }
}

/// One tool call the model requested, and what came of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
    pub success: bool,
    pub content: String,
    /// False when the call was refused because the tool budget ran out.
    pub executed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AgentLoopResult {
    pub status: LoopStatus,
    /// Final answer text; present only when complete.
    pub content: Option<String>,
    pub partial_reason: Option<PartialReason>,
    /// Tool calls actually dispatched.
    pub tool_call_count: usize,
    pub iterations: u32,
    /// Model that served the last response, or the configured one.
    pub model: String,
    pub usage: Usage,
    pub tool_calls: Vec<ToolCallRecord>,
    pub transcript: Transcript,
}

impl AgentLoopResult {
    pub fn is_complete(&self) -> bool {
        self.status == LoopStatus::Complete
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_reason_display() {
        assert_eq!(PartialReason::ToolLimitExceeded.to_string(), "tool limit exceeded");
        assert_eq!(PartialReason::TimedOut.to_string(), "timed out");
        assert_eq!(PartialReason::Cancelled.to_string(), "cancelled");
        assert_eq!(
            PartialReason::UnexpectedStop("max_tokens".into()).to_string(),
            "unexpected stop: max_tokens"
        );
    }

    #[test]
    fn test_config_defaults() {
        let config = AgentLoopConfig::new("gpt-4o-mini");
        assert_eq!(config.max_tool_calls, 15);
        assert_eq!(config.timeout, Duration::from_secs(300));
        assert_eq!(config.max_iterations, 25);
        assert!(config.response_format.is_none());

        let config = config.with_json_output().with_temperature(0.1);
        assert_eq!(config.response_format, Some(ResponseFormat::JsonObject));
        assert_eq!(config.temperature, Some(0.1));
    }

    #[test]
    fn test_transcript_building() {
        let mut transcript = Transcript::new("You extract notes.").with_user("Note text");
        transcript.push_tool_results(vec![ToolResultBlock::success("t1", "ok")]);
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript.system.as_deref(), Some("You extract notes."));
    }
}
