//! CLI command handlers.

pub mod config;
pub mod extract;
pub mod scan;

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use clinote_config::LoadedConfig;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
    /// User config directory in effect, if one could be determined.
    pub config_dir: Option<PathBuf>,
    pub loaded: LoadedConfig,
}

/// Read a note file, returning its bytes and the file name used for format detection.
pub fn read_note(path: &Path) -> Result<(Vec<u8>, String)> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok((bytes, filename))
}
