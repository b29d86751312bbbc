//! LLM config resolution: turns named config references into concrete backend configs.
//!
//! Takes a [`ClinoteConfig`] and resolves a [`ResolvedLlm`] for one pipeline
//! stage, handling cascading defaults, per-stage overrides and API key lookup.

use crate::{Backend, ClinoteConfig, ConfigError, LlmConfig, Result};

/// A fully resolved LLM configuration ready to construct a backend.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedLlm {
    pub backend: Backend,
    pub model: String,
    /// API base URL (if custom).
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    /// Where the API key was resolved from.
    pub api_key_source: Option<SecretSource>,
    pub resolved_from: ResolvedFrom,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub timeout_secs: Option<u64>,
    pub max_retries: Option<u32>,
}

/// Tracks how the LLM config was resolved for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedFrom {
    /// From `agent.<name>.llm`.
    AgentSpecific { agent: String, profile: String },
    /// From `agent.default.llm`.
    AgentDefault { profile: String },
    /// From `[llm]`.
    GlobalDefault,
}

impl std::fmt::Display for ResolvedFrom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolvedFrom::AgentSpecific { agent, profile } => {
                write!(f, "agent.{}.llm -> llm_profiles.{}", agent, profile)
            }
            ResolvedFrom::AgentDefault { profile } => {
                write!(f, "agent.default.llm -> llm_profiles.{}", profile)
            }
            ResolvedFrom::GlobalDefault => write!(f, "[llm] (global default)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretSource {
    ConfigFile,
    EnvVar(String),
}

impl std::fmt::Display for SecretSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SecretSource::ConfigFile => f.write_str("config file"),
            SecretSource::EnvVar(name) => write!(f, "${}", name),
        }
    }
}

/// Resolve the LLM config for a pipeline stage, reading keys from the process environment.
pub fn resolve_for_agent(config: &ClinoteConfig, agent_name: &str) -> Result<ResolvedLlm> {
    resolve_for_agent_with_env(config, agent_name, |var| std::env::var(var).ok())
}

/// Resolve with an injectable environment lookup.
///
/// 1. Pick the `LlmConfig` (agent-specific, then `agent.default`, then `[llm]`)
/// 2. Require backend and model
/// 3. Resolve the API key (config file, then the backend's env var)
/// 4. Apply stage overrides for model, max_tokens and temperature
pub fn resolve_for_agent_with_env<F>(
    config: &ClinoteConfig,
    agent_name: &str,
    env: F,
) -> Result<ResolvedLlm>
where
    F: Fn(&str) -> Option<String>,
{
    let (llm_config, resolved_from) = resolve_llm_config(config, agent_name)?;

    let backend = llm_config
        .backend
        .ok_or_else(|| ConfigError::MissingField {
            field: "backend".to_string(),
            context: format!("LLM config (resolved via {})", resolved_from),
        })?;

    let stage = config.agent.get(agent_name);
    let default = config.agent.get("default");
    let model = stage
        .and_then(|a| a.model.clone())
        .or_else(|| default.and_then(|a| a.model.clone()))
        .or_else(|| llm_config.model.clone())
        .ok_or_else(|| ConfigError::MissingField {
            field: "model".to_string(),
            context: format!("LLM config (resolved via {})", resolved_from),
        })?;

    let (api_key, api_key_source) = resolve_api_key(backend, llm_config, env)?;

    let max_tokens = stage
        .and_then(|a| a.max_tokens)
        .or_else(|| default.and_then(|a| a.max_tokens))
        .or(llm_config.max_tokens);
    let temperature = stage
        .and_then(|a| a.temperature)
        .or_else(|| default.and_then(|a| a.temperature));

    Ok(ResolvedLlm {
        backend,
        model,
        base_url: llm_config.base_url.clone(),
        api_key,
        api_key_source,
        resolved_from,
        max_tokens,
        temperature,
        timeout_secs: llm_config.timeout_secs,
        max_retries: llm_config.max_retries,
    })
}

/// Summaries of every named LLM with a backend and model, sorted by name.
pub fn resolve_all_profiles(config: &ClinoteConfig) -> Vec<(String, Backend, String)> {
    let mut profiles = Vec::new();

    if let Some(ref llm) = config.llm
        && let (Some(backend), Some(model)) = (llm.backend, &llm.model)
    {
        profiles.push(("default".to_string(), backend, model.clone()));
    }

    for (name, llm) in &config.llm_profiles {
        if let (Some(backend), Some(model)) = (llm.backend, &llm.model) {
            profiles.push((name.clone(), backend, model.clone()));
        }
    }

    profiles.sort_by(|a, b| a.0.cmp(&b.0));
    profiles
}

fn resolve_api_key<F>(
    backend: Backend,
    llm_config: &LlmConfig,
    env: F,
) -> Result<(Option<String>, Option<SecretSource>)>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(ref key) = llm_config.api_key
        && !key.is_empty()
    {
        return Ok((Some(key.clone()), Some(SecretSource::ConfigFile)));
    }

    let Some(var) = backend.env_var() else {
        return Ok((None, None));
    };

    match env(var).filter(|v| !v.is_empty()) {
        Some(key) => Ok((Some(key), Some(SecretSource::EnvVar(var.to_string())))),
        None => Err(ConfigError::ApiKeyNotFound {
            backend: backend.display_name().to_string(),
            env_var: var.to_string(),
        }),
    }
}

fn resolve_llm_config<'a>(
    config: &'a ClinoteConfig,
    agent_name: &str,
) -> Result<(&'a LlmConfig, ResolvedFrom)> {
    if let Some(agent_cfg) = config.agent.get(agent_name)
        && let Some(ref llm_name) = agent_cfg.llm
    {
        let llm = lookup_profile(config, llm_name, &format!("agent.{}", agent_name))?;
        return Ok((
            llm,
            ResolvedFrom::AgentSpecific {
                agent: agent_name.to_string(),
                profile: llm_name.clone(),
            },
        ));
    }

    if let Some(default_cfg) = config.agent.get("default")
        && let Some(ref llm_name) = default_cfg.llm
    {
        let llm = lookup_profile(config, llm_name, "agent.default")?;
        return Ok((
            llm,
            ResolvedFrom::AgentDefault {
                profile: llm_name.clone(),
            },
        ));
    }

    let llm = config.llm.as_ref().ok_or(ConfigError::NoDefaultLlm)?;
    Ok((llm, ResolvedFrom::GlobalDefault))
}

fn lookup_profile<'a>(
    config: &'a ClinoteConfig,
    name: &str,
    context: &str,
) -> Result<&'a LlmConfig> {
    // "default" names the bare [llm] section.
    if name == "default"
        && let Some(ref llm) = config.llm
    {
        return Ok(llm);
    }
    config
        .llm_profiles
        .get(name)
        .ok_or_else(|| ConfigError::LlmNotFound {
            name: name.to_string(),
            context: context.to_string(),
        })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
