//! TOML configuration file loading
//!
//! Supports `~/.config/voicecmd/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::Result;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct ConfigFile {
    /// WebSocket server settings
    #[serde(default)]
    pub server: ServerFileConfig,

    /// Recognition model settings
    #[serde(default)]
    pub model: ModelFileConfig,

    /// Command vocabulary
    #[serde(default)]
    pub grammar: GrammarFileConfig,

    /// Offline evaluation sweep
    #[serde(default)]
    pub eval: EvalFileConfig,
}

#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    /// How long closing a connection waits for an in-flight decode
    pub drain_timeout_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ModelFileConfig {
    /// Directory holding the acoustic model
    pub path: Option<PathBuf>,
    pub sample_rate: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct GrammarFileConfig {
    /// Built-in vocabulary ("game" or "quiz")
    pub preset: Option<String>,
    /// Explicit phrase list; takes precedence over `preset`
    pub phrases: Option<Vec<String>>,
    pub sentinel: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct EvalFileConfig {
    pub corpus_dir: Option<PathBuf>,
    pub noise_path: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub snr_steps: Option<Vec<f64>>,
    pub repetitions: Option<usize>,
}

/// Load the TOML config file from the standard path
///
/// Returns `ConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> ConfigFile {
    let Some(path) = config_file_path() else {
        return ConfigFile::default();
    };

    if !path.exists() {
        return ConfigFile::default();
    }

    match read_config_file(&path) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to load config file, using defaults"
            );
            ConfigFile::default()
        }
    }
}

/// Load a config file the user pointed at explicitly
///
/// # Errors
///
/// Returns error if the file cannot be read or is not valid TOML
pub fn read_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)?;
    let config = toml::from_str(&content)?;
    tracing::info!(path = %path.display(), "loaded config file");
    Ok(config)
}

/// Return the config file path: `~/.config/voicecmd/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("voicecmd").join("config.toml"))
}
