//! Tool framework for extraction agents.
//!
//! Defines the [`Tool`] trait that every agent tool implements, the
//! [`ToolRegistry`] that holds them, and the [`ToolExecutor`] seam the agent
//! loop dispatches through.
//!
//! # Example
//!
//! ```rust,ignore
//! use clinote_agent::{Tool, ToolContext, ToolResult, ToolRegistry};
//!
//! struct WordCount;
//!
//! #[async_trait]
//! impl Tool for WordCount {
//!     fn name(&self) -> &str { "word_count" }
//!     fn description(&self) -> &str { "Counts words in the note" }
//!     fn parameters(&self) -> Value { json!({"type": "object"}) }
//!
//!     async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<ToolResult> {
//!         Ok(ToolResult::text("42"))
//!     }
//! }
//!
//! let mut registry = ToolRegistry::new();
//! registry.register(WordCount);
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use clinote_llm::ToolDefinition;
use clinote_types::Id;

use crate::error::{AgentError, Result};

// ─────────────────────────────────────────────────────────────────────────────
// Parameter Validation
// ─────────────────────────────────────────────────────────────────────────────

/// Error type for tool parameter validation failures.
///
/// Messages are written for the model: they say what was wrong and how to
/// fix it so the next call can succeed.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ParameterValidationError {
    #[error("missing required parameter '{name}': {hint}")]
    MissingRequired {
        name: &'static str,
        hint: &'static str,
    },

    #[error("invalid type for '{name}': expected {expected}, got {actual}")]
    InvalidType {
        name: &'static str,
        expected: &'static str,
        actual: String,
    },

    #[error("'{name}' value {value} is out of range: {constraint}")]
    OutOfRange {
        name: &'static str,
        value: String,
        constraint: String,
    },

    #[error("'{name}' has invalid value '{value}': {message}")]
    InvalidValue {
        name: &'static str,
        value: String,
        message: String,
    },
}

impl ParameterValidationError {
    pub fn missing(name: &'static str, hint: &'static str) -> Self {
        Self::MissingRequired { name, hint }
    }

    pub fn invalid_type(
        name: &'static str,
        expected: &'static str,
        actual: impl Into<String>,
    ) -> Self {
        Self::InvalidType {
            name,
            expected,
            actual: actual.into(),
        }
    }

    pub fn out_of_range(
        name: &'static str,
        value: impl ToString,
        constraint: impl Into<String>,
    ) -> Self {
        Self::OutOfRange {
            name,
            value: value.to_string(),
            constraint: constraint.into(),
        }
    }

    pub fn invalid_value(
        name: &'static str,
        value: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            name,
            value: value.into(),
            message: message.into(),
        }
    }

    /// The parameter this error is about.
    pub fn parameter_name(&self) -> &str {
        match self {
            Self::MissingRequired { name, .. }
            | Self::InvalidType { name, .. }
            | Self::OutOfRange { name, .. }
            | Self::InvalidValue { name, .. } => name,
        }
    }
}

impl From<ParameterValidationError> for AgentError {
    fn from(err: ParameterValidationError) -> Self {
        AgentError::InvalidToolParams(err.to_string())
    }
}

pub type ParamResult<T> = std::result::Result<T, ParameterValidationError>;

/// Helper trait for extracting and validating parameters from JSON.
pub trait ParamExt {
    fn required_str(&self, name: &'static str, hint: &'static str) -> ParamResult<&str>;

    fn optional_str(&self, name: &str) -> Option<&str>;

    fn optional_u64(&self, name: &str, default: u64) -> u64;

    fn optional_bool(&self, name: &str, default: bool) -> bool;
}

impl ParamExt for serde_json::Value {
    fn required_str(&self, name: &'static str, hint: &'static str) -> ParamResult<&str> {
        match self.get(name) {
            None | Some(serde_json::Value::Null) => {
                Err(ParameterValidationError::missing(name, hint))
            }
            Some(v) => v
                .as_str()
                .ok_or_else(|| ParameterValidationError::invalid_type(name, "string", json_type(v))),
        }
    }

    fn optional_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(|v| v.as_str())
    }

    fn optional_u64(&self, name: &str, default: u64) -> u64 {
        self.get(name).and_then(|v| v.as_u64()).unwrap_or(default)
    }

    fn optional_bool(&self, name: &str, default: bool) -> bool {
        self.get(name).and_then(|v| v.as_bool()).unwrap_or(default)
    }
}

fn json_type(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Typed Parameter Structs
// ─────────────────────────────────────────────────────────────────────────────

/// Validated parameters for the keyword scan tool.
#[derive(Debug, Clone)]
pub struct KeywordScanParams {
    /// Text to scan; the whole note when absent.
    pub text: Option<String>,
    /// Restrict to one category: "suicidal", "self-harm" or "homicidal".
    pub category: Option<String>,
}

impl TryFrom<serde_json::Value> for KeywordScanParams {
    type Error = ParameterValidationError;

    fn try_from(params: serde_json::Value) -> std::result::Result<Self, Self::Error> {
        let category = params.optional_str("category").map(str::to_lowercase);
        if let Some(ref c) = category
            && !matches!(c.as_str(), "suicidal" | "self-harm" | "homicidal")
        {
            return Err(ParameterValidationError::invalid_value(
                "category",
                c.clone(),
                "must be one of: suicidal, self-harm, homicidal",
            ));
        }

        Ok(Self {
            text: params
                .optional_str("text")
                .filter(|t| !t.trim().is_empty())
                .map(String::from),
            category,
        })
    }
}

/// Validated parameters for the passage search tool.
#[derive(Debug, Clone)]
pub struct FindPassagesParams {
    pub query: String,
    pub max_results: u64,
    /// Lines of surrounding context on each side of a hit.
    pub context_lines: u64,
}

impl TryFrom<serde_json::Value> for FindPassagesParams {
    type Error = ParameterValidationError;

    fn try_from(params: serde_json::Value) -> std::result::Result<Self, Self::Error> {
        let query = params.required_str("query", "provide the words or phrase to look for")?;
        if query.trim().is_empty() {
            return Err(ParameterValidationError::invalid_value(
                "query",
                query,
                "query cannot be empty",
            ));
        }

        let max_results = params.optional_u64("max_results", 5);
        if max_results == 0 || max_results > 20 {
            return Err(ParameterValidationError::out_of_range(
                "max_results",
                max_results,
                "must be between 1 and 20",
            ));
        }

        let context_lines = params.optional_u64("context_lines", 1);
        if context_lines > 5 {
            return Err(ParameterValidationError::out_of_range(
                "context_lines",
                context_lines,
                "must be at most 5",
            ));
        }

        Ok(Self {
            query: query.trim().to_string(),
            max_results,
            context_lines,
        })
    }
}

/// Validated parameters for the think tool.
#[derive(Debug, Clone)]
pub struct ThinkParams {
    pub thought: String,
}

impl TryFrom<serde_json::Value> for ThinkParams {
    type Error = ParameterValidationError;

    fn try_from(params: serde_json::Value) -> std::result::Result<Self, Self::Error> {
        let thought = params.required_str("thought", "provide the reasoning to record")?;
        if thought.trim().is_empty() {
            return Err(ParameterValidationError::invalid_value(
                "thought",
                thought,
                "thought cannot be empty",
            ));
        }
        Ok(Self {
            thought: thought.to_string(),
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Output Sanitization
// ─────────────────────────────────────────────────────────────────────────────

/// Default maximum output size in bytes (32KB).
pub const DEFAULT_MAX_OUTPUT_SIZE: usize = 32 * 1024;

/// Size limit and cleanup applied to tool output before the model sees it.
#[derive(Debug, Clone)]
pub struct OutputConfig {
    pub max_size_bytes: usize,
    pub truncation_message: String,
    /// Strip control characters other than newline, tab and carriage return.
    pub strip_control_chars: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            max_size_bytes: DEFAULT_MAX_OUTPUT_SIZE,
            truncation_message: "\n\n[Output truncated - exceeded size limit]".to_string(),
            strip_control_chars: true,
        }
    }
}

impl OutputConfig {
    pub fn with_max_size(max_size_bytes: usize) -> Self {
        Self {
            max_size_bytes,
            ..Default::default()
        }
    }
}

/// Clean and truncate tool output. Returns the text and whether it was cut.
pub fn sanitize_output(input: &str, config: &OutputConfig) -> (String, bool) {
    let mut output: String = input
        .chars()
        .filter(|&c| c != '\0')
        .filter(|&c| {
            !config.strip_control_chars || !c.is_control() || matches!(c, '\n' | '\t' | '\r')
        })
        .collect();

    if output.len() <= config.max_size_bytes {
        return (output, false);
    }

    let mut truncate_at = config
        .max_size_bytes
        .saturating_sub(config.truncation_message.len());
    while truncate_at > 0 && !output.is_char_boundary(truncate_at) {
        truncate_at -= 1;
    }
    output.truncate(truncate_at);
    output.push_str(&config.truncation_message);
    (output, true)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tool Trait
// ─────────────────────────────────────────────────────────────────────────────

/// A capability an extraction agent can invoke.
///
/// Each tool describes its parameters as a JSON Schema and executes
/// asynchronously. Bad input should come back as [`ToolResult::error`] so the
/// model can correct itself; `Err` is reserved for failures of the tool itself.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON Schema for the tool's input object.
    fn parameters(&self) -> serde_json::Value;

    async fn execute(&self, params: serde_json::Value, ctx: &ToolContext) -> Result<ToolResult>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Tool Context
// ─────────────────────────────────────────────────────────────────────────────

/// Context provided to tools during execution.
#[derive(Debug, Clone)]
pub struct ToolContext {
    /// Pipeline run this call belongs to.
    pub run_id: Id,
    pub cancellation: CancellationToken,
}

impl ToolContext {
    pub fn new(run_id: Id) -> Self {
        Self {
            run_id,
            cancellation: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(run_id: Id, cancellation: CancellationToken) -> Self {
        Self {
            run_id,
            cancellation,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

impl Default for ToolContext {
    fn default() -> Self {
        Self::new(clinote_types::new_id())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tool Result
// ─────────────────────────────────────────────────────────────────────────────

/// Result of a tool execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolResult {
    Text { content: String },
    Json { content: serde_json::Value },
    Error { message: String },
}

impl ToolResult {
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text {
            content: content.into(),
        }
    }

    pub fn json(content: serde_json::Value) -> Self {
        Self::Json { content }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    pub fn is_success(&self) -> bool {
        !self.is_error()
    }

    /// The content as the model will read it.
    pub fn to_llm_content(&self) -> String {
        match self {
            Self::Text { content } => content.clone(),
            Self::Json { content } => {
                serde_json::to_string_pretty(content).unwrap_or_else(|_| content.to_string())
            }
            Self::Error { message } => format!("Error: {}", message),
        }
    }
}

/// Outcome of one dispatched tool call, as the agent loop records it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolExecution {
    pub success: bool,
    /// Content returned to the model (the error text on failure).
    pub content: String,
    pub error: Option<String>,
}

impl ToolExecution {
    pub fn ok(content: impl Into<String>) -> Self {
        Self {
            success: true,
            content: content.into(),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            success: false,
            content: format!("Error: {}", error),
            error: Some(error),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tool Executor
// ─────────────────────────────────────────────────────────────────────────────

/// What the agent loop dispatches tool calls through.
///
/// Implementations never fail a call outright: unknown names, malformed
/// arguments and tool errors all come back as unsuccessful executions.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Definitions advertised to the model.
    fn definitions(&self) -> Vec<ToolDefinition>;

    async fn execute_call(
        &self,
        name: &str,
        args: serde_json::Value,
        ctx: &ToolContext,
    ) -> ToolExecution;
}

pub type SharedToolExecutor = Arc<dyn ToolExecutor>;

// ─────────────────────────────────────────────────────────────────────────────
// Tool Registry
// ─────────────────────────────────────────────────────────────────────────────

/// Registry of the tools available to one agent.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    output_config: OutputConfig,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_output_config(mut self, config: OutputConfig) -> Self {
        self.output_config = config;
        self
    }

    /// Register a tool, replacing any tool with the same name.
    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        let name = tool.name().to_string();
        self.tools.insert(name, Arc::new(tool));
    }

    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.insert(name, tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Tool names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Execute a tool by name and sanitize its output.
    pub async fn execute(
        &self,
        name: &str,
        params: serde_json::Value,
        ctx: &ToolContext,
    ) -> Result<ToolResult> {
        let tool = self
            .get(name)
            .ok_or_else(|| AgentError::ToolNotFound(name.to_string()))?;

        let result = tool.execute(params, ctx).await?;
        Ok(self.sanitize(result))
    }

    fn sanitize(&self, result: ToolResult) -> ToolResult {
        match result {
            ToolResult::Text { content } => {
                ToolResult::text(sanitize_output(&content, &self.output_config).0)
            }
            ToolResult::Json { content } => {
                let rendered = serde_json::to_string_pretty(&content)
                    .unwrap_or_else(|_| content.to_string());
                match sanitize_output(&rendered, &self.output_config) {
                    // Truncated JSON is no longer valid JSON.
                    (text, true) => ToolResult::text(text),
                    (_, false) => ToolResult::Json { content },
                }
            }
            ToolResult::Error { message } => {
                ToolResult::error(sanitize_output(&message, &self.output_config).0)
            }
        }
    }
}

#[async_trait]
impl ToolExecutor for ToolRegistry {
    fn definitions(&self) -> Vec<ToolDefinition> {
        self.names()
            .into_iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| ToolDefinition::new(tool.name(), tool.description(), tool.parameters()))
            .collect()
    }

    async fn execute_call(
        &self,
        name: &str,
        args: serde_json::Value,
        ctx: &ToolContext,
    ) -> ToolExecution {
        if !args.is_object() {
            tracing::debug!(tool = %name, "Tool arguments are not a JSON object");
            return ToolExecution::failed(format!(
                "arguments for '{}' must be a JSON object, got {}",
                name,
                json_type(&args)
            ));
        }

        match self.execute(name, args, ctx).await {
            Ok(ToolResult::Error { message }) => ToolExecution::failed(message),
            Ok(result) => ToolExecution::ok(result.to_llm_content()),
            Err(AgentError::ToolNotFound(name)) => ToolExecution::failed(format!(
                "tool '{}' does not exist; available tools: {}",
                name,
                self.names().join(", ")
            )),
            Err(e) => {
                tracing::warn!(tool = %name, error = %e, "Tool execution failed");
                ToolExecution::failed(e.to_string())
            }
        }
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Mock Tool (for testing)
// ─────────────────────────────────────────────────────────────────────────────

/// Tool with a configurable response that records its calls.
#[cfg(test)]
#[derive(Debug)]
pub struct MockTool {
    name: String,
    response: parking_lot::Mutex<Option<ToolResult>>,
    calls: parking_lot::Mutex<Vec<serde_json::Value>>,
}

#[cfg(test)]
impl MockTool {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            response: parking_lot::Mutex::new(None),
            calls: parking_lot::Mutex::new(Vec::new()),
        }
    }

    pub fn with_response(self, response: ToolResult) -> Self {
        *self.response.lock() = Some(response);
        self
    }

    pub fn calls(&self) -> Vec<serde_json::Value> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[cfg(test)]
#[async_trait]
impl Tool for MockTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "A mock tool for testing"
    }

    fn parameters(&self) -> serde_json::Value {
        serde_json::json!({"type": "object", "properties": {}})
    }

    async fn execute(&self, params: serde_json::Value, _ctx: &ToolContext) -> Result<ToolResult> {
        self.calls.lock().push(params);
        Ok(self
            .response
            .lock()
            .clone()
            .unwrap_or_else(|| ToolResult::text("mock response")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct FailingTool;

    #[async_trait]
    impl Tool for FailingTool {
        fn name(&self) -> &str {
            "failing"
        }
        fn description(&self) -> &str {
            "always fails"
        }
        fn parameters(&self) -> serde_json::Value {
            json!({"type": "object"})
        }
        async fn execute(&self, _: serde_json::Value, _: &ToolContext) -> Result<ToolResult> {
            Err(AgentError::tool("backing store unavailable"))
        }
    }

    #[test]
    fn test_param_ext_required_str() {
        let params = json!({"query": "sleep", "n": 3});
        assert_eq!(params.required_str("query", "hint").unwrap(), "sleep");

        let err = params.required_str("missing", "give it").unwrap_err();
        assert_eq!(err.parameter_name(), "missing");
        assert!(err.to_string().contains("missing required parameter"));

        let err = params.required_str("n", "hint").unwrap_err();
        assert!(err.to_string().contains("expected string, got number"));
    }

    #[test]
    fn test_find_passages_params_validation() {
        let params = FindPassagesParams::try_from(json!({"query": " appetite "})).unwrap();
        assert_eq!(params.query, "appetite");
        assert_eq!(params.max_results, 5);
        assert_eq!(params.context_lines, 1);

        assert!(FindPassagesParams::try_from(json!({"query": ""})).is_err());
        assert!(FindPassagesParams::try_from(json!({"query": "x", "max_results": 0})).is_err());
        assert!(FindPassagesParams::try_from(json!({"query": "x", "max_results": 21})).is_err());
        assert!(FindPassagesParams::try_from(json!({"query": "x", "context_lines": 9})).is_err());
    }

    #[test]
    fn test_keyword_scan_params_category() {
        let params = KeywordScanParams::try_from(json!({"category": "Homicidal"})).unwrap();
        assert_eq!(params.category.as_deref(), Some("homicidal"));
        assert!(params.text.is_none());

        let err = KeywordScanParams::try_from(json!({"category": "anxiety"})).unwrap_err();
        assert!(err.to_string().contains("must be one of"));
    }

    #[test]
    fn test_sanitize_strips_control_and_truncates() {
        let config = OutputConfig::with_max_size(60);
        let (clean, truncated) = sanitize_output("line\u{0007}one\n\ttwo\0", &config);
        assert_eq!(clean, "lineone\n\ttwo");
        assert!(!truncated);

        let long = "é".repeat(100);
        let (out, truncated) = sanitize_output(&long, &config);
        assert!(truncated);
        assert!(out.len() <= 60);
        assert!(out.ends_with("[Output truncated - exceeded size limit]"));
    }

    #[test]
    fn test_tool_result_content() {
        assert_eq!(ToolResult::text("hi").to_llm_content(), "hi");
        assert_eq!(ToolResult::error("bad").to_llm_content(), "Error: bad");
        assert!(ToolResult::json(json!({"a": 1})).is_success());
    }

    #[tokio::test]
    async fn test_mock_tool_execution() {
        let tool = MockTool::new("lookup").with_response(ToolResult::text("found"));
        let ctx = ToolContext::default();

        let result = tool.execute(json!({"q": 1}), &ctx).await.unwrap();
        assert_eq!(result.to_llm_content(), "found");
        assert_eq!(tool.call_count(), 1);
        assert_eq!(tool.calls()[0], json!({"q": 1}));
    }

    #[tokio::test]
    async fn test_registry_definitions_sorted() {
        let mut registry = ToolRegistry::new();
        registry.register(MockTool::new("zeta"));
        registry.register(MockTool::new("alpha"));

        let defs = registry.definitions();
        let names: Vec<_> = defs.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
        assert!(registry.contains("zeta"));
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn test_execute_call_unknown_tool() {
        let mut registry = ToolRegistry::new();
        registry.register(MockTool::new("lookup"));

        let exec = registry
            .execute_call("nope", json!({}), &ToolContext::default())
            .await;
        assert!(!exec.success);
        assert!(exec.error.as_deref().unwrap().contains("does not exist"));
        assert!(exec.content.contains("lookup"));
    }

    #[tokio::test]
    async fn test_execute_call_non_object_args() {
        let mut registry = ToolRegistry::new();
        let tool = Arc::new(MockTool::new("lookup"));
        registry.register_arc(tool.clone());

        let exec = registry
            .execute_call("lookup", json!("{not json"), &ToolContext::default())
            .await;
        assert!(!exec.success);
        assert!(exec.content.contains("must be a JSON object, got string"));
        assert_eq!(tool.call_count(), 0);
    }

    #[tokio::test]
    async fn test_execute_call_error_variants() {
        let mut registry = ToolRegistry::new();
        registry.register(FailingTool);
        registry.register(MockTool::new("soft").with_response(ToolResult::error("no match")));

        let ctx = ToolContext::default();
        let hard = registry.execute_call("failing", json!({}), &ctx).await;
        assert!(!hard.success);
        assert!(hard.content.contains("backing store unavailable"));

        let soft = registry.execute_call("soft", json!({}), &ctx).await;
        assert!(!soft.success);
        assert_eq!(soft.error.as_deref(), Some("no match"));
        assert_eq!(soft.content, "Error: no match");
    }

    #[tokio::test]
    async fn test_registry_sanitizes_output() {
        let mut registry =
            ToolRegistry::new().with_output_config(OutputConfig::with_max_size(64));
        registry.register(MockTool::new("big").with_response(ToolResult::text("x".repeat(500))));

        let exec = registry
            .execute_call("big", json!({}), &ToolContext::default())
            .await;
        assert!(exec.success);
        assert!(exec.content.len() <= 64);
        assert!(exec.content.contains("[Output truncated"));
    }
}
