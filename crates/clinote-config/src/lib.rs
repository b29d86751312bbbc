//! Configuration for clinote.
//!
//! TOML-based configuration with:
//! - A default LLM (`[llm]`) plus named profiles (`[llm_profiles.<name>]`)
//! - Per-stage agent binding with fallback to `agent.default`
//! - Layered files (user config dir, then project-local `clinote.toml`)
//! - API key lookup from the config file or the backend's environment variable

pub mod discovery;
pub mod error;
pub mod resolver;
pub mod types;

pub use discovery::{
    ConfigSource, LoadedConfig, load_config, load_config_file, load_config_with_options,
    user_config_path, xdg_config_dir, xdg_config_path,
};
pub use error::{ConfigError, Result};
pub use resolver::{
    ResolvedFrom, ResolvedLlm, SecretSource, resolve_all_profiles, resolve_for_agent,
    resolve_for_agent_with_env,
};
pub use types::*;
