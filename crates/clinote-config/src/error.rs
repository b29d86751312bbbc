//! Configuration error types.

/// Result type alias for config operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur during configuration loading and resolution.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadFile {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Referenced LLM profile not found.
    #[error("LLM profile '{name}' not found (referenced by {context})")]
    LlmNotFound { name: String, context: String },

    #[error("no default LLM configured; add an [llm] section to your config")]
    NoDefaultLlm,

    #[error("missing required field '{field}' in {context}")]
    MissingField { field: String, context: String },

    /// API key not found in config or environment.
    #[error("API key not found for backend '{backend}'. Set {env_var} or api_key in the config file")]
    ApiKeyNotFound { backend: String, env_var: String },

    /// A value is present but unusable.
    #[error("invalid value for '{field}': {message}")]
    Invalid { field: String, message: String },
}

impl ConfigError {
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            message: message.into(),
        }
    }
}
