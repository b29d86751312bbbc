//! Error types for the completion and embedding providers.

use std::time::Duration;
use thiserror::Error;

/// Result type alias using the LLM error type.
pub type Result<T> = std::result::Result<T, LlmError>;

// ─────────────────────────────────────────────────────────────────────────────
// Rate Limits
// ─────────────────────────────────────────────────────────────────────────────

/// A provider told us to slow down.
#[derive(Debug, Clone)]
pub struct RateLimitInfo {
    pub message: String,
    /// Provider-supplied wait, when one was given.
    pub retry_after: Option<Duration>,
}

impl RateLimitInfo {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retry_after: None,
        }
    }

    pub fn with_retry_after(message: impl Into<String>, retry_after: Duration) -> Self {
        Self {
            message: message.into(),
            retry_after: Some(retry_after),
        }
    }

    /// Build from an error body plus an optional `Retry-After` header.
    ///
    /// Groq puts the wait in the message ("Please try again in 6.5s") rather
    /// than the header, so both places are checked.
    pub fn from_response(message: &str, retry_after_header: Option<&str>) -> Self {
        let retry_after = retry_after_header
            .and_then(|v| v.trim().parse::<u64>().ok().map(Duration::from_secs))
            .or_else(|| parse_try_again_in(message));
        Self {
            message: message.to_string(),
            retry_after,
        }
    }
}

impl std::fmt::Display for RateLimitInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(retry_after) = self.retry_after {
            write!(f, " (retry after {:.2}s)", retry_after.as_secs_f64())?;
        }
        Ok(())
    }
}

fn parse_try_again_in(message: &str) -> Option<Duration> {
    let lower = message.to_lowercase();
    let idx = lower.find("try again in ")?;
    let num: String = lower[idx + "try again in ".len()..]
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    num.parse::<f64>().ok().map(Duration::from_secs_f64)
}

// ─────────────────────────────────────────────────────────────────────────────
// Response Validation
// ─────────────────────────────────────────────────────────────────────────────

/// A provider response that does not have the shape the agent loop relies on.
#[derive(Debug, Clone, Error)]
pub enum ResponseValidationError {
    #[error("missing required field '{field}' in response")]
    MissingField { field: &'static str },

    #[error("invalid tool_use block '{id}': {reason}")]
    InvalidToolUse { id: String, reason: String },

    #[error("multiple validation errors: {}", .0.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; "))]
    Multiple(Vec<ResponseValidationError>),
}

impl ResponseValidationError {
    pub fn invalid_tool_use(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidToolUse {
            id: id.into(),
            reason: reason.into(),
        }
    }
}

impl From<ResponseValidationError> for LlmError {
    fn from(err: ResponseValidationError) -> Self {
        LlmError::InvalidResponse(err.to_string())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// LlmError
// ─────────────────────────────────────────────────────────────────────────────

/// Error type for provider operations.
#[derive(Debug, Error)]
pub enum LlmError {
    /// The provider answered with an error.
    #[error("Backend error: {0}")]
    Backend(String),

    /// Connectivity failure or timeout (retryable).
    #[error("Network error: {0}")]
    Network(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The provider returned something structurally unusable.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Rate limit exceeded (retryable with backoff).
    #[error("Rate limit exceeded: {0}")]
    RateLimit(RateLimitInfo),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl LlmError {
    pub fn rate_limit(message: impl Into<String>) -> Self {
        Self::RateLimit(RateLimitInfo::new(message))
    }

    /// Provider-requested wait for rate limit errors.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimit(info) => info.retry_after,
            _ => None,
        }
    }

    /// Network and rate limit errors are worth another attempt. Everything
    /// else will fail the same way again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::RateLimit(_))
    }

    /// The provider rejected a tool call naming a tool it was never offered.
    ///
    /// The agent loop recovers from these by telling the model which tools exist.
    pub fn is_tool_validation_error(&self) -> bool {
        match self {
            Self::Backend(msg) => {
                msg.contains("tool call validation failed")
                    || msg.contains("was not in request.tools")
                    || msg.contains("unknown tool")
            }
            _ => false,
        }
    }

    /// Tool name from a tool validation error ("attempted to call tool 'x' which was not").
    pub fn invalid_tool_name(&self) -> Option<&str> {
        let Self::Backend(msg) = self else {
            return None;
        };
        let start = msg.find("call tool '")? + "call tool '".len();
        let rest = &msg[start..];
        rest.find('\'').map(|end| &rest[..end])
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Network(format!("Request timed out: {}", err))
        } else if err.is_connect() {
            LlmError::Network(format!("Connection failed: {}", err))
        } else {
            LlmError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for LlmError {
    fn from(err: serde_json::Error) -> Self {
        LlmError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_retryable() {
        assert!(LlmError::Network("timeout".into()).is_retryable());
        assert!(LlmError::rate_limit("slow down").is_retryable());
        assert!(!LlmError::Config("bad".into()).is_retryable());
        assert!(!LlmError::Auth("unauthorized".into()).is_retryable());
        assert!(!LlmError::Backend("500".into()).is_retryable());
        assert!(!LlmError::InvalidResponse("no choices".into()).is_retryable());
    }

    #[test]
    fn test_rate_limit_from_header() {
        let info = RateLimitInfo::from_response("Too many requests", Some(" 7 "));
        assert_eq!(info.retry_after, Some(Duration::from_secs(7)));
    }

    #[test]
    fn test_rate_limit_from_groq_message() {
        let info = RateLimitInfo::from_response(
            "Rate limit reached. Please try again in 6.57792s. Need more tokens?",
            None,
        );
        let retry = info.retry_after.unwrap();
        assert!((retry.as_secs_f64() - 6.57792).abs() < 0.001);

        let info = RateLimitInfo::from_response("Rate limit exceeded", None);
        assert!(info.retry_after.is_none());
    }

    #[test]
    fn test_rate_limit_display() {
        let info = RateLimitInfo::with_retry_after("Rate limited", Duration::from_secs_f64(6.5));
        assert!(info.to_string().contains("retry after 6.50s"));
        assert_eq!(RateLimitInfo::new("plain").to_string(), "plain");
    }

    #[test]
    fn test_retry_after_only_for_rate_limits() {
        let err = LlmError::RateLimit(RateLimitInfo::with_retry_after(
            "limited",
            Duration::from_secs(5),
        ));
        assert_eq!(err.retry_after(), Some(Duration::from_secs(5)));
        assert_eq!(LlmError::Network("x".into()).retry_after(), None);
    }

    #[test]
    fn test_tool_validation_error() {
        let err = LlmError::Backend(
            "tool call validation failed: attempted to call tool 'lookup_icd' which was not in request.tools".to_string(),
        );
        assert!(err.is_tool_validation_error());
        assert_eq!(err.invalid_tool_name(), Some("lookup_icd"));

        let err = LlmError::Backend("server error".to_string());
        assert!(!err.is_tool_validation_error());
        assert_eq!(err.invalid_tool_name(), None);

        assert!(!LlmError::Network("timeout".into()).is_tool_validation_error());
    }

    #[test]
    fn test_validation_error_converts() {
        let err: LlmError = ResponseValidationError::MissingField { field: "id" }.into();
        assert!(matches!(err, LlmError::InvalidResponse(_)));
    }
}
