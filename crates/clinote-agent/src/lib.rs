//! Agent core for clinote.
//!
//! Provides the bounded tool-calling loop and the tools extraction agents
//! can use while reading a note.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  AgentLoop                                                  │
//! │  - Drives provider turns until a final answer or a bound    │
//! │  - Dispatches each turn's tool calls concurrently           │
//! └─────────────────────────────────────────────────────────────┘
//!                      │                     │
//!                      ▼                     ▼
//!               ┌─────────────┐       ┌──────────────┐
//!               │ LlmBackend  │       │ ToolExecutor │
//!               │(clinote-llm)│       │ (registry)   │
//!               └─────────────┘       └──────────────┘
//! ```
//!
//! Bounds: 15 tool calls, 5 minutes of wall-clock time, caller
//! cancellation. Hitting any of them yields a partial result, not an error.

pub mod agent;
pub mod error;
pub mod tool;
pub mod tools;
pub mod types;

pub use agent::{AgentLoop, TOOL_LIMIT_MESSAGE};
pub use error::{AgentError, Result};
pub use tool::{
    DEFAULT_MAX_OUTPUT_SIZE, FindPassagesParams, KeywordScanParams, OutputConfig, ParamExt,
    ParamResult, ParameterValidationError, SharedToolExecutor, ThinkParams, Tool, ToolContext,
    ToolExecution, ToolExecutor, ToolRegistry, ToolResult, sanitize_output,
};
pub use tools::{FindPassagesTool, KeywordScanTool, Scratchpad, ThinkTool, new_scratchpad, note_tools};
pub use types::{
    AgentLoopConfig, AgentLoopResult, DEFAULT_LOOP_TIMEOUT, DEFAULT_MAX_ITERATIONS,
    DEFAULT_MAX_TOOL_CALLS, LoopStatus, PartialReason, ToolCallRecord, Transcript,
};

pub use tokio_util::sync::CancellationToken;
