//! Run settings, built from [`ClinoteConfig`] or by hand in tests.

use std::time::Duration;

use clinote_agent::{
    AgentLoopConfig, DEFAULT_LOOP_TIMEOUT, DEFAULT_MAX_ITERATIONS, DEFAULT_MAX_TOOL_CALLS,
};
use clinote_config::{ClinoteConfig, ResolvedLlm};
use clinote_risk::{DEFAULT_LOW_CONFIDENCE_THRESHOLD, RISK_CONFIDENCE_THRESHOLD, RiskMergeConfig};

/// Model settings for one extraction stage.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentSettings {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: Option<f32>,
}

impl AgentSettings {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            max_tokens: 4096,
            temperature: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn from_resolved(resolved: &ResolvedLlm) -> Self {
        Self {
            model: resolved.model.clone(),
            max_tokens: resolved.max_tokens.unwrap_or(4096),
            temperature: resolved.temperature,
        }
    }

    /// Loop config for this stage under `bounds`.
    pub fn loop_config(&self, bounds: &LoopBounds) -> AgentLoopConfig {
        let config = AgentLoopConfig::new(&self.model)
            .with_max_tokens(self.max_tokens)
            .with_max_tool_calls(bounds.max_tool_calls)
            .with_timeout(bounds.timeout)
            .with_max_iterations(bounds.max_iterations);
        match self.temperature {
            Some(t) => config.with_temperature(t),
            None => config,
        }
    }
}

/// Bounds applied to every agent loop in a run.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopBounds {
    pub max_tool_calls: usize,
    pub timeout: Duration,
    pub max_iterations: u32,
}

impl Default for LoopBounds {
    fn default() -> Self {
        Self {
            max_tool_calls: DEFAULT_MAX_TOOL_CALLS,
            timeout: DEFAULT_LOOP_TIMEOUT,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

/// Limits a parsed document must meet before extraction.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationRules {
    pub min_content_chars: usize,
    pub max_pages: u32,
    pub min_parse_confidence: f64,
}

impl Default for ValidationRules {
    fn default() -> Self {
        Self {
            min_content_chars: 50,
            max_pages: 50,
            min_parse_confidence: 0.3,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    pub validation: ValidationRules,
    pub loop_bounds: LoopBounds,
    pub merge: RiskMergeConfig,
    pub low_confidence_threshold: f64,
    pub enable_summarization: bool,
    pub enable_indexing: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            validation: ValidationRules::default(),
            loop_bounds: LoopBounds::default(),
            merge: RiskMergeConfig::default(),
            low_confidence_threshold: DEFAULT_LOW_CONFIDENCE_THRESHOLD,
            enable_summarization: true,
            enable_indexing: true,
        }
    }
}

impl PipelineSettings {
    pub fn from_config(config: &ClinoteConfig) -> Self {
        let agent_loop = config.agent_loop();
        let risk = config.risk();
        let pipeline = config.pipeline();

        Self {
            validation: ValidationRules {
                min_content_chars: pipeline.min_content_chars,
                max_pages: pipeline.max_pages,
                min_parse_confidence: pipeline.min_parse_confidence,
            },
            loop_bounds: LoopBounds {
                max_tool_calls: agent_loop.max_tool_calls,
                timeout: Duration::from_secs(agent_loop.timeout_secs),
                max_iterations: agent_loop.max_iterations,
            },
            merge: RiskMergeConfig {
                always_re_extract: risk.always_re_extract,
                enable_keyword_safety_net: risk.enable_keyword_safety_net,
                use_conservative_merge: risk.use_conservative_merge,
                confidence_threshold: risk
                    .confidence_threshold_override
                    .unwrap_or(RISK_CONFIDENCE_THRESHOLD),
                max_retries: risk.max_retries,
            },
            low_confidence_threshold: config.confidence().low_confidence_threshold,
            enable_summarization: pipeline.enable_summarization,
            enable_indexing: pipeline.enable_indexing,
        }
    }
}
