//! Configuration types mapping to the TOML schema.
//!
//! ```toml
//! [llm]                    # default LLM
//! [llm_profiles.fast]      # named LLM profiles
//! [agent.default]          # settings shared by every extraction stage
//! [agent.risk]             # per-stage overrides
//! [agent_loop]             # tool-call and time bounds
//! [risk]                   # merge and safety net switches
//! [pipeline]               # validation limits, best-effort stages
//! ```

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{ConfigError, Result};

/// Agent names the pipeline resolves settings for.
pub const AGENT_CLINICAL: &str = "clinical";
pub const AGENT_RISK: &str = "risk";
pub const AGENT_SUMMARIZER: &str = "summarizer";

// ─────────────────────────────────────────────────────────────────────────────
// Top-level Config
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration structure.
///
/// All sections are optional so that partial configs (project-local
/// overrides) can be loaded and merged. Accessors return defaults for
/// sections that were never set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClinoteConfig {
    /// Default LLM (the `[llm]` section).
    pub llm: Option<LlmConfig>,

    /// Named LLM profiles (`[llm_profiles.<name>]`).
    pub llm_profiles: HashMap<String, LlmConfig>,

    /// Per-stage agent settings (`[agent.default]`, `[agent.risk]`, ...).
    pub agent: HashMap<String, AgentConfig>,

    pub agent_loop: Option<AgentLoopSection>,
    pub risk: Option<RiskSection>,
    pub confidence: Option<ConfidenceSection>,
    pub pipeline: Option<PipelineSection>,
    pub embedding: Option<EmbeddingConfig>,
    pub logging: Option<LoggingConfig>,
}

impl ClinoteConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string and validate.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: ClinoteConfig = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Merge another config on top of this one (other takes priority).
    ///
    /// Sections replace wholesale; named profiles and agents replace by name.
    pub fn merge(&mut self, other: ClinoteConfig) {
        if other.llm.is_some() {
            self.llm = other.llm;
        }
        self.llm_profiles.extend(other.llm_profiles);
        self.agent.extend(other.agent);

        if other.agent_loop.is_some() {
            self.agent_loop = other.agent_loop;
        }
        if other.risk.is_some() {
            self.risk = other.risk;
        }
        if other.confidence.is_some() {
            self.confidence = other.confidence;
        }
        if other.pipeline.is_some() {
            self.pipeline = other.pipeline;
        }
        if other.embedding.is_some() {
            self.embedding = other.embedding;
        }
        if other.logging.is_some() {
            self.logging = other.logging;
        }
    }

    /// Reject values that would make the pipeline unsafe or meaningless.
    pub fn validate(&self) -> Result<()> {
        let agent_loop = self.agent_loop();
        if agent_loop.max_tool_calls == 0 {
            return Err(ConfigError::invalid(
                "agent_loop.max_tool_calls",
                "must be at least 1",
            ));
        }
        if agent_loop.timeout_secs == 0 {
            return Err(ConfigError::invalid(
                "agent_loop.timeout_secs",
                "must be at least 1",
            ));
        }

        if let Some(threshold) = self.risk().confidence_threshold_override
            && !(0.0..=1.0).contains(&threshold)
        {
            return Err(ConfigError::invalid(
                "risk.confidence_threshold_override",
                "must be between 0.0 and 1.0",
            ));
        }

        let threshold = self.confidence().low_confidence_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ConfigError::invalid(
                "confidence.low_confidence_threshold",
                "must be between 0.0 and 1.0",
            ));
        }

        let pipeline = self.pipeline();
        if !(0.0..=1.0).contains(&pipeline.min_parse_confidence) {
            return Err(ConfigError::invalid(
                "pipeline.min_parse_confidence",
                "must be between 0.0 and 1.0",
            ));
        }

        for (name, agent) in &self.agent {
            if let Some(t) = agent.temperature
                && !(0.0..=2.0).contains(&t)
            {
                return Err(ConfigError::invalid(
                    format!("agent.{}.temperature", name),
                    "must be between 0.0 and 2.0",
                ));
            }
        }

        Ok(())
    }

    pub fn agent_loop(&self) -> AgentLoopSection {
        self.agent_loop.clone().unwrap_or_default()
    }

    pub fn risk(&self) -> RiskSection {
        self.risk.clone().unwrap_or_default()
    }

    pub fn confidence(&self) -> ConfidenceSection {
        self.confidence.clone().unwrap_or_default()
    }

    pub fn pipeline(&self) -> PipelineSection {
        self.pipeline.clone().unwrap_or_default()
    }

    pub fn embedding(&self) -> EmbeddingConfig {
        self.embedding.clone().unwrap_or_default()
    }

    pub fn logging(&self) -> LoggingConfig {
        self.logging.clone().unwrap_or_default()
    }

    /// Defined LLM names ("default" for the bare `[llm]`), sorted.
    pub fn llm_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        if self.llm.is_some() {
            names.push("default".to_string());
        }
        names.extend(self.llm_profiles.keys().cloned());
        names.sort();
        names
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// LLM Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration for a completion provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub backend: Option<Backend>,
    pub model: Option<String>,
    /// Custom API base URL (proxies, self-hosted endpoints).
    pub base_url: Option<String>,
    /// API key (prefer the backend's env var; warns if set here).
    pub api_key: Option<String>,
    pub max_tokens: Option<u32>,
    pub timeout_secs: Option<u64>,
    pub max_retries: Option<u32>,
}

impl LlmConfig {
    pub fn has_plaintext_api_key(&self) -> bool {
        self.api_key.is_some()
    }
}

/// Supported OpenAI-compatible providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Openai,
    Groq,
    Ollama,
}

impl Backend {
    /// Environment variable holding this backend's API key, if it needs one.
    pub fn env_var(&self) -> Option<&'static str> {
        match self {
            Backend::Openai => Some("OPENAI_API_KEY"),
            Backend::Groq => Some("GROQ_API_KEY"),
            Backend::Ollama => None,
        }
    }

    pub fn requires_api_key(&self) -> bool {
        self.env_var().is_some()
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Backend::Openai => "OpenAI",
            Backend::Groq => "Groq",
            Backend::Ollama => "Ollama",
        }
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Agent Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Per-stage agent configuration. Unset fields fall back to `agent.default`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Name of an `llm_profiles` entry to use.
    pub llm: Option<String>,
    /// Model override for this stage.
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

/// Bounds on one agent loop run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentLoopSection {
    pub max_tool_calls: usize,
    pub timeout_secs: u64,
    pub max_iterations: u32,
}

impl Default for AgentLoopSection {
    fn default() -> Self {
        Self {
            max_tool_calls: 15,
            timeout_secs: 300,
            max_iterations: 25,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Risk and Confidence
// ─────────────────────────────────────────────────────────────────────────────

/// Risk re-extraction and merge settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskSection {
    pub always_re_extract: bool,
    pub enable_keyword_safety_net: bool,
    pub use_conservative_merge: bool,
    /// Extra re-extraction attempts after an invalid response.
    pub max_retries: u32,
    /// Replaces the built-in 0.9 bar for elevated risk values.
    pub confidence_threshold_override: Option<f64>,
}

impl Default for RiskSection {
    fn default() -> Self {
        Self {
            always_re_extract: true,
            enable_keyword_safety_net: true,
            use_conservative_merge: true,
            max_retries: 2,
            confidence_threshold_override: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceSection {
    pub low_confidence_threshold: f64,
}

impl Default for ConfidenceSection {
    fn default() -> Self {
        Self {
            low_confidence_threshold: 0.7,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Pipeline Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Stage switches and document validation limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSection {
    pub enable_summarization: bool,
    pub enable_indexing: bool,
    /// Minimum characters of content after trimming.
    pub min_content_chars: usize,
    pub max_pages: u32,
    pub min_parse_confidence: f64,
    /// Largest document the parser accepts.
    pub max_document_bytes: usize,
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            enable_summarization: true,
            enable_indexing: true,
            min_content_chars: 50,
            max_pages: 50,
            min_parse_confidence: 0.3,
            max_document_bytes: 10 * 1024 * 1024,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Embedding Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Embedding provider configuration for the search index.
///
/// ```toml
/// [embedding]
/// provider = "openai"       # "openai" or "mock"
/// model = "text-embedding-3-small"
/// dimensions = 1536
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProvider,
    pub model: Option<String>,
    pub dimensions: Option<usize>,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::Mock,
            model: None,
            dimensions: None,
            base_url: None,
            api_key: None,
            timeout_secs: 30,
        }
    }
}

impl EmbeddingConfig {
    /// Effective dimensions for the configured provider.
    pub fn effective_dimensions(&self) -> usize {
        self.dimensions.unwrap_or(match self.provider {
            EmbeddingProvider::OpenAi => 1536,
            EmbeddingProvider::Mock => 384,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmbeddingProvider {
    #[serde(rename = "openai")]
    OpenAi,
    #[serde(rename = "mock")]
    Mock,
}

impl EmbeddingProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmbeddingProvider::OpenAi => "openai",
            EmbeddingProvider::Mock => "mock",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Logging Configuration
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Directory for rolling log files; the config dir's `logs/` when unset.
    pub directory: Option<PathBuf>,
    /// Write the file layer as JSON lines.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: None,
            json: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
[llm]
backend = "groq"
model = "llama-3.3-70b-versatile"
max_tokens = 8192

[llm_profiles.local]
backend = "ollama"
model = "llama3.1"
base_url = "http://localhost:11434/v1"

[agent.default]
temperature = 0.1

[agent.risk]
llm = "local"
temperature = 0.0

[agent_loop]
max_tool_calls = 10

[risk]
use_conservative_merge = false
confidence_threshold_override = 0.85

[pipeline]
enable_indexing = false

[embedding]
provider = "openai"
model = "text-embedding-3-small"
"#;

    #[test]
    fn test_parse_full_config() {
        let config = ClinoteConfig::from_toml(FULL).unwrap();

        let llm = config.llm.as_ref().unwrap();
        assert_eq!(llm.backend, Some(Backend::Groq));
        assert_eq!(llm.max_tokens, Some(8192));
        assert_eq!(config.llm_profiles["local"].backend, Some(Backend::Ollama));
        assert_eq!(config.agent["risk"].llm.as_deref(), Some("local"));

        let agent_loop = config.agent_loop();
        assert_eq!(agent_loop.max_tool_calls, 10);
        assert_eq!(agent_loop.timeout_secs, 300);

        let risk = config.risk();
        assert!(!risk.use_conservative_merge);
        assert!(risk.always_re_extract);
        assert_eq!(risk.confidence_threshold_override, Some(0.85));

        assert!(!config.pipeline().enable_indexing);
        assert!(config.pipeline().enable_summarization);
        assert_eq!(config.embedding().provider, EmbeddingProvider::OpenAi);
        assert_eq!(config.embedding().effective_dimensions(), 1536);
        assert_eq!(config.llm_names(), vec!["default", "local"]);
    }

    #[test]
    fn test_defaults_when_sections_missing() {
        let config = ClinoteConfig::from_toml("").unwrap();
        assert_eq!(config.agent_loop(), AgentLoopSection::default());
        assert_eq!(config.confidence().low_confidence_threshold, 0.7);
        assert_eq!(config.risk().max_retries, 2);
        assert_eq!(config.pipeline().min_content_chars, 50);
        assert_eq!(config.pipeline().max_pages, 50);
        assert_eq!(config.pipeline().min_parse_confidence, 0.3);
        assert_eq!(config.embedding().timeout_secs, 30);
        assert_eq!(config.embedding().provider, EmbeddingProvider::Mock);
        assert!(config.logging().json);
    }

    #[test]
    fn test_merge_overrides_sections() {
        let mut base = ClinoteConfig::from_toml(FULL).unwrap();
        let overlay = ClinoteConfig::from_toml(
            r#"
[llm]
backend = "openai"
model = "gpt-4o-mini"

[agent.summarizer]
model = "gpt-4o"

[pipeline]
enable_summarization = false
"#,
        )
        .unwrap();
        base.merge(overlay);

        assert_eq!(base.llm.as_ref().unwrap().backend, Some(Backend::Openai));
        assert!(base.llm_profiles.contains_key("local"));
        assert!(base.agent.contains_key("risk"));
        assert!(base.agent.contains_key("summarizer"));
        // the overlay's [pipeline] replaces the whole section
        assert!(!base.pipeline().enable_summarization);
        assert!(base.pipeline().enable_indexing);
        assert_eq!(base.agent_loop().max_tool_calls, 10);
    }

    #[test]
    fn test_round_trip_toml() {
        let config = ClinoteConfig::from_toml(FULL).unwrap();
        let rendered = config.to_toml().unwrap();
        let reparsed = ClinoteConfig::from_toml(&rendered).unwrap();
        assert_eq!(config, reparsed);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let err = ClinoteConfig::from_toml("[agent_loop]\nmax_tool_calls = 0").unwrap_err();
        assert!(err.to_string().contains("agent_loop.max_tool_calls"));

        let err =
            ClinoteConfig::from_toml("[risk]\nconfidence_threshold_override = 1.5").unwrap_err();
        assert!(err.to_string().contains("confidence_threshold_override"));

        let err = ClinoteConfig::from_toml("[agent.risk]\ntemperature = 3.0").unwrap_err();
        assert!(err.to_string().contains("agent.risk.temperature"));
    }

    #[test]
    fn test_unknown_backend_is_parse_error() {
        let err = ClinoteConfig::from_toml("[llm]\nbackend = \"anthropic\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_backend_env_vars() {
        assert_eq!(Backend::Openai.env_var(), Some("OPENAI_API_KEY"));
        assert_eq!(Backend::Groq.env_var(), Some("GROQ_API_KEY"));
        assert!(!Backend::Ollama.requires_api_key());
    }
}
