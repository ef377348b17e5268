//! Configuration management for the voice command gateway
//!
//! Every setting resolves as env > TOML file > default.

pub mod file;

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::audio::SAMPLE_RATE;
use crate::eval::DEFAULT_SNR_STEPS;
use crate::grammar::{CommandGrammar, DEFAULT_SENTINEL};
use crate::{Error, Result};

pub use file::ConfigFile;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8765;
const DEFAULT_MODEL_PATH: &str = "model-en";
const DEFAULT_PRESET: &str = "game";
const DEFAULT_DRAIN_TIMEOUT_MS: u64 = 2000;

/// Gateway configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// WebSocket server configuration
    pub server: ServerConfig,

    /// Recognition model configuration
    pub model: ModelConfig,

    /// Command vocabulary configuration
    pub grammar: GrammarConfig,

    /// Offline evaluation configuration
    pub eval: EvalConfig,
}

/// WebSocket server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Interface to bind
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Upper bound on waiting for an in-flight decode when a connection closes
    pub drain_timeout: Duration,
}

/// Recognition model configuration
#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// Directory holding the acoustic model
    pub path: PathBuf,

    /// Sample rate of incoming PCM audio in Hz
    pub sample_rate: u32,
}

/// Command vocabulary configuration
#[derive(Debug, Clone)]
pub struct GrammarConfig {
    /// Built-in vocabulary used when no explicit phrases are configured
    pub preset: String,

    /// Explicit phrase list (from `VOICECMD_GRAMMAR` or the TOML file)
    pub phrases: Option<Vec<String>>,

    /// Out-of-vocabulary marker
    pub sentinel: String,
}

/// Offline evaluation configuration
#[derive(Debug, Clone)]
pub struct EvalConfig {
    /// Directory of clean `*.wav` utterances named after their label
    pub corpus_dir: PathBuf,

    /// Background noise clip
    pub noise_path: PathBuf,

    /// Where CSV reports are written
    pub output_dir: PathBuf,

    /// SNR levels swept, in order
    pub snr_steps: Vec<f64>,

    /// How many times each utterance is decoded per level
    pub repetitions: usize,
}

impl Config {
    /// Load configuration from the environment and the standard config file
    ///
    /// An unreadable standard config file is logged and ignored.
    #[must_use]
    pub fn load() -> Self {
        Self::from_sources(file::load_config_file(), |key| std::env::var(key).ok())
    }

    /// Load configuration from the environment and an explicit config file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed
    pub fn load_from(path: &Path) -> Result<Self> {
        let fc = file::read_config_file(path)?;
        Ok(Self::from_sources(fc, |key| std::env::var(key).ok()))
    }

    /// Resolve settings from a parsed file and an environment lookup
    pub fn from_sources(fc: ConfigFile, env: impl Fn(&str) -> Option<String>) -> Self {
        // Server config (env > toml > default)
        let server = ServerConfig {
            host: env("VOICECMD_HOST")
                .or(fc.server.host)
                .unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: env_parse::<u16>(&env, "VOICECMD_PORT")
                .or(fc.server.port)
                .unwrap_or(DEFAULT_PORT),
            drain_timeout: Duration::from_millis(
                fc.server.drain_timeout_ms.unwrap_or(DEFAULT_DRAIN_TIMEOUT_MS),
            ),
        };

        let model = ModelConfig {
            path: env("VOICECMD_MODEL_PATH")
                .map(PathBuf::from)
                .or(fc.model.path)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_MODEL_PATH)),
            sample_rate: env_parse::<u32>(&env, "VOICECMD_SAMPLE_RATE")
                .or(fc.model.sample_rate)
                .unwrap_or(SAMPLE_RATE),
        };

        let grammar = GrammarConfig {
            preset: env("VOICECMD_GRAMMAR_PRESET")
                .or(fc.grammar.preset)
                .unwrap_or_else(|| DEFAULT_PRESET.to_string()),
            phrases: env("VOICECMD_GRAMMAR")
                .map(|s| {
                    s.split(',')
                        .map(|p| p.trim().to_string())
                        .filter(|p| !p.is_empty())
                        .collect()
                })
                .or(fc.grammar.phrases),
            sentinel: fc
                .grammar
                .sentinel
                .unwrap_or_else(|| DEFAULT_SENTINEL.to_string()),
        };

        let eval = EvalConfig {
            corpus_dir: fc
                .eval
                .corpus_dir
                .unwrap_or_else(|| PathBuf::from("evaluation/clean_commands")),
            noise_path: fc
                .eval
                .noise_path
                .unwrap_or_else(|| PathBuf::from("evaluation/noise.wav")),
            output_dir: fc
                .eval
                .output_dir
                .unwrap_or_else(|| PathBuf::from("evaluation")),
            snr_steps: fc
                .eval
                .snr_steps
                .unwrap_or_else(|| DEFAULT_SNR_STEPS.to_vec()),
            repetitions: fc.eval.repetitions.unwrap_or(1),
        };

        Self {
            server,
            model,
            grammar,
            eval,
        }
    }

    /// Check settings that would otherwise fail later at startup
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the model directory is missing, the sample
    /// rate is zero, or the grammar cannot be built
    pub fn validate(&self) -> Result<()> {
        if !self.model.path.exists() {
            return Err(Error::Config(format!(
                "model not found at {}",
                self.model.path.display()
            )));
        }
        if self.model.sample_rate == 0 {
            return Err(Error::Config("sample rate must be positive".to_string()));
        }
        self.command_grammar().map(|_| ())
    }

    /// Build the command grammar: explicit phrases win over the preset
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the preset is unknown or the phrase list
    /// is empty
    pub fn command_grammar(&self) -> Result<CommandGrammar> {
        match &self.grammar.phrases {
            Some(phrases) => CommandGrammar::build(phrases, &self.grammar.sentinel),
            None => {
                let phrases = crate::grammar::preset(&self.grammar.preset).ok_or_else(|| {
                    Error::Config(format!("unknown grammar preset: {}", self.grammar.preset))
                })?;
                CommandGrammar::build(phrases.iter().copied(), &self.grammar.sentinel)
            }
        }
    }

}

/// Parse `key` from the environment; unparseable values fall through
fn env_parse<T: FromStr>(env: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    env(key).and_then(|s| s.trim().parse().ok())
}

impl Default for Config {
    fn default() -> Self {
        Self::from_sources(ConfigFile::default(), |_| None)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8765);
        assert_eq!(config.model.path, PathBuf::from("model-en"));
        assert_eq!(config.model.sample_rate, 16000);
        assert_eq!(config.grammar.preset, "game");
        assert_eq!(config.grammar.sentinel, "[unk]");
        assert_eq!(config.eval.snr_steps, vec![20.0, 15.0, 10.0, 5.0]);
        assert_eq!(config.eval.repetitions, 1);
        assert_eq!(config.server.drain_timeout, Duration::from_secs(2));
    }

    #[test]
    fn env_overrides_file() {
        let fc: ConfigFile = toml::from_str(
            r#"
            [server]
            host = "0.0.0.0"
            port = 9000

            [model]
            sample_rate = 8000
            "#,
        )
        .unwrap();
        let config = Config::from_sources(fc, env_of(&[("VOICECMD_PORT", "7000")]));
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 7000);
        assert_eq!(config.model.sample_rate, 8000);
    }

    #[test]
    fn unparseable_env_falls_through() {
        let config = Config::from_sources(
            ConfigFile::default(),
            env_of(&[("VOICECMD_PORT", "nope"), ("VOICECMD_SAMPLE_RATE", "-1")]),
        );
        assert_eq!(config.server.port, 8765);
        assert_eq!(config.model.sample_rate, 16000);
    }

    #[test]
    fn sample_rate_from_env() {
        let fc: ConfigFile = toml::from_str("[model]\nsample_rate = 8000\n").unwrap();
        let config = Config::from_sources(
            fc,
            env_of(&[("VOICECMD_SAMPLE_RATE", " 44100 "), ("VOICECMD_PORT", "9001")]),
        );
        assert_eq!(config.model.sample_rate, 44100);
        assert_eq!(config.server.port, 9001);
    }

    #[test]
    fn explicit_phrases_beat_preset() {
        let config = Config::from_sources(
            ConfigFile::default(),
            env_of(&[("VOICECMD_GRAMMAR", "up, down,,jump")]),
        );
        let grammar = config.command_grammar().unwrap();
        assert_eq!(grammar.commands().collect::<Vec<_>>(), vec!["up", "down", "jump"]);
    }

    #[test]
    fn preset_selection() {
        let config = Config::from_sources(
            ConfigFile::default(),
            env_of(&[("VOICECMD_GRAMMAR_PRESET", "quiz")]),
        );
        let grammar = config.command_grammar().unwrap();
        assert!(grammar.is_known("general knowledge"));

        let config = Config::from_sources(
            ConfigFile::default(),
            env_of(&[("VOICECMD_GRAMMAR_PRESET", "chess")]),
        );
        assert!(matches!(config.command_grammar(), Err(Error::Config(_))));
    }

    #[test]
    fn validate_requires_model_directory() {
        let mut config = Config::default();
        config.model.path = PathBuf::from("/definitely/not/a/model");
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let dir = tempfile::tempdir().unwrap();
        config.model.path = dir.path().to_path_buf();
        assert!(config.validate().is_ok());
    }
}
