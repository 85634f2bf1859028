use anyhow::{Context, Result, anyhow};
use log::warn;
use serde::{Deserialize, Serialize};
use std::default::Default;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use url::Url;

use crate::game::filter::LengthBounds;
use crate::models::CorpusSelection;

/// Application configuration module
/// This module handles the application configuration including loading,
/// validating and saving configuration settings.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Config {
    /// Subtitle backend connection
    #[serde(default)]
    pub backend: BackendConfig,

    /// Game tunables
    #[serde(default)]
    pub game: GameConfig,

    /// Corpus ids selected when a game starts (empty selects every corpus)
    #[serde(default)]
    pub default_corpora: Vec<String>,

    /// Directory merged videos are downloaded to
    #[serde(default)]
    pub download_dir: Option<PathBuf>,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Subtitle backend connection settings
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct BackendConfig {
    // @field: Service URL
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    // @field: Timeout seconds, clip rendering and merging are slow
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Game settings shared by all modes
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct GameConfig {
    /// Number of opening prompts drawn per fetch
    #[serde(default = "default_prompt_count")]
    pub prompt_count: usize,

    /// Maximum chain candidates offered at once
    #[serde(default = "default_display_cap")]
    pub display_cap: usize,

    /// Chain length window, counted after stripping filler particles
    #[serde(default = "default_chain_min_length")]
    pub chain_min_length: usize,

    #[serde(default = "default_chain_max_length")]
    pub chain_max_length: usize,

    /// Rhyme length window passed to the rhyme service
    #[serde(default = "default_rhyme_min_length")]
    pub rhyme_min_length: usize,

    #[serde(default = "default_rhyme_max_length")]
    pub rhyme_max_length: usize,

    /// Maximum rhymes requested per fetch
    #[serde(default = "default_rhyme_limit")]
    pub rhyme_limit: usize,

    /// Context added before and after each clip, in seconds
    #[serde(default = "default_clip_padding_secs")]
    pub clip_padding_secs: f64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            prompt_count: default_prompt_count(),
            display_cap: default_display_cap(),
            chain_min_length: default_chain_min_length(),
            chain_max_length: default_chain_max_length(),
            rhyme_min_length: default_rhyme_min_length(),
            rhyme_max_length: default_rhyme_max_length(),
            rhyme_limit: default_rhyme_limit(),
            clip_padding_secs: default_clip_padding_secs(),
        }
    }
}

impl GameConfig {
    pub fn chain_window(&self) -> LengthBounds {
        LengthBounds::new(self.chain_min_length, self.chain_max_length)
    }

    pub fn rhyme_window(&self) -> LengthBounds {
        LengthBounds::new(self.rhyme_min_length, self.rhyme_max_length)
    }

    /// Validate the game settings
    pub fn validate(&self) -> Result<()> {
        if self.prompt_count == 0 {
            return Err(anyhow!("game.prompt_count must be at least 1"));
        }
        if self.display_cap == 0 {
            return Err(anyhow!("game.display_cap must be at least 1"));
        }
        if self.rhyme_limit == 0 {
            return Err(anyhow!("game.rhyme_limit must be at least 1"));
        }
        if self.chain_min_length > self.chain_max_length {
            return Err(anyhow!(
                "game.chain_min_length ({}) exceeds game.chain_max_length ({})",
                self.chain_min_length,
                self.chain_max_length
            ));
        }
        if self.rhyme_min_length > self.rhyme_max_length {
            return Err(anyhow!(
                "game.rhyme_min_length ({}) exceeds game.rhyme_max_length ({})",
                self.rhyme_min_length,
                self.rhyme_max_length
            ));
        }
        if !self.clip_padding_secs.is_finite() || self.clip_padding_secs < 0.0 {
            return Err(anyhow!(
                "game.clip_padding_secs must be a non-negative number, got {}",
                self.clip_padding_secs
            ));
        }
        Ok(())
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            Self::Error => log::LevelFilter::Error,
            Self::Warn => log::LevelFilter::Warn,
            Self::Info => log::LevelFilter::Info,
            Self::Debug => log::LevelFilter::Debug,
            Self::Trace => log::LevelFilter::Trace,
        }
    }
}

fn default_endpoint() -> String {
    "http://localhost:8089".to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_prompt_count() -> usize {
    8
}

fn default_display_cap() -> usize {
    8
}

fn default_chain_min_length() -> usize {
    3
}

fn default_chain_max_length() -> usize {
    8
}

fn default_rhyme_min_length() -> usize {
    3
}

fn default_rhyme_max_length() -> usize {
    20
}

fn default_rhyme_limit() -> usize {
    8
}

fn default_clip_padding_secs() -> f64 {
    2.0
}

impl Config {
    /// Load the configuration at `path`, writing a default one when it is missing
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            return Self::from_file(path);
        }

        warn!("Config file not found at '{}', creating default config.", path.display());
        let config = Config::default();
        config.save(path)?;
        Ok(config)
    }

    /// Load the configuration at `path`
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Failed to open config file: {}", path.display()))?;
        let reader = BufReader::new(file);
        let config: Config = serde_json::from_reader(reader)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Write the configuration as pretty JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let config_json = serde_json::to_string_pretty(self)
            .context("Failed to serialize config to JSON")?;
        std::fs::write(path, config_json)
            .with_context(|| format!("Failed to write config to file: {}", path.display()))?;
        Ok(())
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.backend.endpoint)
            .with_context(|| format!("Invalid backend endpoint: {}", self.backend.endpoint))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(anyhow!(
                "Backend endpoint must use http or https: {}",
                self.backend.endpoint
            ));
        }
        if self.backend.timeout_secs == 0 {
            return Err(anyhow!("backend.timeout_secs must be at least 1"));
        }
        if self.default_corpora.iter().any(|id| id.trim().is_empty()) {
            return Err(anyhow!("default_corpora contains an empty corpus id"));
        }

        self.game.validate()
    }

    /// Configured default corpora, if any
    pub fn default_selection(&self) -> Option<CorpusSelection> {
        if self.default_corpora.is_empty() {
            None
        } else {
            Some(self.default_corpora.iter().cloned().collect())
        }
    }

    /// Where merged videos are written
    pub fn resolve_download_dir(&self) -> PathBuf {
        self.download_dir
            .clone()
            .or_else(dirs::download_dir)
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Config {
            backend: BackendConfig::default(),
            game: GameConfig::default(),
            default_corpora: Vec::new(),
            download_dir: None,
            log_level: LogLevel::default(),
        }
    }
}
