//! Error types for the agent crate.

use thiserror::Error;

/// Result type alias using the agent error type.
pub type Result<T> = std::result::Result<T, AgentError>;

/// Error type for agent operations.
///
/// Bounded exhaustion (tool limit, timeout, cancellation) is not an error:
/// the loop reports it as a partial result. These variants cover the cases
/// where the loop could not produce any result at all.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Completion provider error.
    #[error("LLM error: {0}")]
    Llm(#[from] clinote_llm::LlmError),

    /// Tool execution error.
    #[error("Tool error: {0}")]
    Tool(String),

    /// Tool not found in registry.
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// Invalid tool parameters.
    #[error("Invalid tool parameters: {0}")]
    InvalidToolParams(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Task was cancelled before it started.
    #[error("Task cancelled")]
    Cancelled,

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AgentError {
    pub fn tool(msg: impl Into<String>) -> Self {
        Self::Tool(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// The underlying provider error, if this is one.
    pub fn as_llm(&self) -> Option<&clinote_llm::LlmError> {
        match self {
            Self::Llm(e) => Some(e),
            _ => None,
        }
    }
}
