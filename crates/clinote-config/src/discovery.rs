//! Config file discovery and layered merging.
//!
//! Resolution order (later overrides earlier):
//! 1. `~/.config/clinote/config.toml` (user config, or `CLINOTE_CONFIG_DIR`)
//! 2. `./clinote.toml` (project-local)
//! 3. CLI arguments (handled externally)

use std::path::{Path, PathBuf};

use crate::{ClinoteConfig, ConfigError, Result};

const PROJECT_CONFIG_FILE: &str = "clinote.toml";
const USER_CONFIG_FILE: &str = "config.toml";
const APP_NAME: &str = "clinote";

/// Overrides the platform config directory.
const CONFIG_DIR_ENV: &str = "CLINOTE_CONFIG_DIR";

/// Tracks where each config layer was loaded from.
#[derive(Debug, Clone)]
pub struct ConfigSource {
    pub path: PathBuf,
    /// Whether the file was found and loaded.
    pub loaded: bool,
}

/// Result of config discovery and loading.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// The merged configuration.
    pub config: ClinoteConfig,
    /// Sources that were checked, lowest precedence first.
    pub sources: Vec<ConfigSource>,
    /// Non-fatal problems (unreadable layers, plaintext API keys).
    pub warnings: Vec<String>,
}

impl LoadedConfig {
    pub fn loaded_from(&self) -> Vec<&Path> {
        self.sources
            .iter()
            .filter(|s| s.loaded)
            .map(|s| s.path.as_path())
            .collect()
    }
}

/// Load configuration by discovering and merging all config layers.
pub fn load_config(project_dir: Option<&Path>) -> Result<LoadedConfig> {
    load_config_with_options(project_dir, None)
}

/// Load configuration with explicit control over the user config directory.
///
/// `config_dir` overrides both `CLINOTE_CONFIG_DIR` and the platform default.
pub fn load_config_with_options(
    project_dir: Option<&Path>,
    config_dir: Option<&Path>,
) -> Result<LoadedConfig> {
    let mut config = ClinoteConfig::new();
    let mut sources = Vec::new();
    let mut warnings = Vec::new();

    if let Some(path) = user_config_path(config_dir) {
        sources.push(load_layer(&mut config, &path, &mut warnings));
    }

    let project_path = project_dir
        .map(|d| d.join(PROJECT_CONFIG_FILE))
        .unwrap_or_else(|| PathBuf::from(PROJECT_CONFIG_FILE));
    sources.push(load_layer(&mut config, &project_path, &mut warnings));

    check_plaintext_keys(&config, &mut warnings);

    Ok(LoadedConfig {
        config,
        sources,
        warnings,
    })
}

/// Load config from a specific file path (no discovery).
pub fn load_config_file(path: &Path) -> Result<ClinoteConfig> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.display().to_string(),
        source: e,
    })?;
    ClinoteConfig::from_toml(&contents)
}

/// User config file inside `config_dir`, or the default location when `None`.
pub fn user_config_path(config_dir: Option<&Path>) -> Option<PathBuf> {
    match config_dir {
        Some(dir) => Some(dir.join(USER_CONFIG_FILE)),
        None => xdg_config_path(),
    }
}

/// Path of the user config file.
pub fn xdg_config_path() -> Option<PathBuf> {
    xdg_config_dir().map(|d| d.join(USER_CONFIG_FILE))
}

/// User config directory: `CLINOTE_CONFIG_DIR`, else the platform default.
pub fn xdg_config_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV)
        && !dir.is_empty()
    {
        return Some(PathBuf::from(dir));
    }
    dirs::config_dir().map(|d| d.join(APP_NAME))
}

/// Merge one layer if it exists. A broken layer becomes a warning.
fn load_layer(config: &mut ClinoteConfig, path: &Path, warnings: &mut Vec<String>) -> ConfigSource {
    if !path.is_file() {
        return ConfigSource {
            path: path.to_path_buf(),
            loaded: false,
        };
    }

    let loaded = match load_config_file(path) {
        Ok(layer) => {
            config.merge(layer);
            true
        }
        Err(e) => {
            warnings.push(format!("Failed to load {}: {}", path.display(), e));
            false
        }
    };

    ConfigSource {
        path: path.to_path_buf(),
        loaded,
    }
}

fn check_plaintext_keys(config: &ClinoteConfig, warnings: &mut Vec<String>) {
    if let Some(ref llm) = config.llm
        && llm.has_plaintext_api_key()
    {
        warnings.push(
            "Default [llm] config contains a plaintext API key. \
             Consider using an environment variable instead."
                .to_string(),
        );
    }

    let mut names: Vec<_> = config
        .llm_profiles
        .iter()
        .filter(|(_, llm)| llm.has_plaintext_api_key())
        .map(|(name, _)| name.as_str())
        .collect();
    names.sort();
    for name in names {
        warnings.push(format!(
            "[llm_profiles.{}] contains a plaintext API key. \
             Consider using an environment variable instead.",
            name
        ));
    }

    if config.embedding.as_ref().is_some_and(|e| e.api_key.is_some()) {
        warnings.push("[embedding] contains a plaintext API key.".to_string());
    }
}
