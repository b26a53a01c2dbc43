//! Configuration module for the chat client.
//!
//! This module provides a layered configuration system that supports:
//! - Default values
//! - TOML configuration file
//! - Environment variable overrides
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `TERMCHAT_` and use double
//! underscores to separate nested levels:
//! - `TERMCHAT_API__KEY=sk-...` sets `api.key`
//! - `TERMCHAT_API__PROVIDER=qwen` sets `api.provider`
//! - `TERMCHAT_RETRIEVAL__CHUNK_SIZE=500` sets `retrieval.chunk_size`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use crate::chat::adapter::Provider;

/// Directory holding the settings file and runtime data.
const CONFIG_DIR: &str = ".termchat";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Directory for runtime data (vector store, cache, history)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// UI language code ("en" or "zh")
    #[serde(default = "default_language")]
    pub language: String,

    /// Global debug mode
    #[serde(default = "default_false")]
    pub debug: bool,

    /// LLM API settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Retrieval engine settings
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Response cache settings
    #[serde(default)]
    pub cache: CacheConfig,

    /// Chat history settings
    #[serde(default)]
    pub history: HistoryConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// LLM API connection settings.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ApiConfig {
    /// Which provider adapter to use
    #[serde(default)]
    pub provider: Provider,

    /// API key (prefer `TERMCHAT_API__KEY` over writing it to disk)
    #[serde(default)]
    pub key: String,

    /// API endpoint URL; empty uses the provider's default endpoint
    #[serde(default)]
    pub url: String,

    /// Model name sent in requests
    #[serde(default = "default_model")]
    pub model: String,

    /// Maximum retry attempts for failed requests
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay between retries in seconds
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Retrieval engine settings.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RetrievalConfig {
    /// Enable retrieval-augmented context
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Target chunk length in tokens
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Overlap between adjacent chunks in tokens
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    /// Number of chunks injected as context per prompt
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Embedding model name
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Embedding vector dimension (must match the model)
    #[serde(default = "default_dimension")]
    pub dimension: usize,
}

impl RetrievalConfig {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.chunk_size == 0 {
            return Err("chunk_size must be greater than 0".to_string());
        }

        if self.chunk_overlap >= self.chunk_size {
            return Err(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            ));
        }

        if self.dimension == 0 {
            return Err("dimension must be greater than 0".to_string());
        }

        if self.top_k == 0 {
            return Err("top_k must be greater than 0".to_string());
        }

        Ok(())
    }
}

/// Response cache settings.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CacheConfig {
    /// Enable response caching
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Cache entry time-to-live in seconds
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
}

/// Chat history settings.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct HistoryConfig {
    /// Enable history persistence
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Maximum interactions kept on disk
    #[serde(default = "default_max_history_items")]
    pub max_items: usize,
}

/// Logging configuration.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Default log level filter ("error", "warn", "info", "debug", "trace")
    #[serde(default = "default_log_level")]
    pub default: String,

    /// Per-module level overrides, e.g. `retrieval = "debug"`
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

// Default value functions
fn default_version() -> u32 {
    1
}
fn default_data_dir() -> PathBuf {
    PathBuf::from(".termchat/data")
}
fn default_language() -> String {
    "en".to_string()
}
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_model() -> String {
    "glm-4-flash".to_string()
}
fn default_max_retries() -> u32 {
    3
}
fn default_retry_delay_secs() -> u64 {
    2
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_chunk_size() -> usize {
    1000
}
fn default_chunk_overlap() -> usize {
    200
}
fn default_top_k() -> usize {
    3
}
fn default_embedding_model() -> String {
    "AllMiniLML6V2".to_string()
}
fn default_dimension() -> usize {
    384
}
fn default_cache_ttl_secs() -> u64 {
    3600
}
fn default_max_history_items() -> usize {
    100
}
fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            data_dir: default_data_dir(),
            language: default_language(),
            debug: false,
            api: ApiConfig::default(),
            retrieval: RetrievalConfig::default(),
            cache: CacheConfig::default(),
            history: HistoryConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            provider: Provider::default(),
            key: String::new(),
            url: String::new(),
            model: default_model(),
            max_retries: default_max_retries(),
            retry_delay_secs: default_retry_delay_secs(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            top_k: default_top_k(),
            model: default_embedding_model(),
            dimension: default_dimension(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: default_cache_ttl_secs(),
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_items: default_max_history_items(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: HashMap::new(),
        }
    }
}

impl Settings {
    /// Load configuration from all sources
    pub fn load() -> Result<Self, Box<figment::Error>> {
        let config_path = Self::find_workspace_config()
            .unwrap_or_else(|| PathBuf::from(CONFIG_DIR).join("settings.toml"));

        Figment::new()
            // Start with defaults
            .merge(Serialized::defaults(Settings::default()))
            // Layer in config file if it exists
            .merge(Toml::file(config_path))
            // Layer in environment variables with TERMCHAT_ prefix.
            // Double underscore (__) separates nested levels; single
            // underscores remain part of the field name.
            .merge(
                Env::prefixed("TERMCHAT_")
                    .map(|key| key.as_str().to_lowercase().replace("__", ".").into()),
            )
            .extract()
            .map_err(Box::new)
    }

    /// Load configuration from a specific file
    pub fn load_from(path: impl AsRef<std::path::Path>) -> Result<Self, Box<figment::Error>> {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path))
            .merge(
                Env::prefixed("TERMCHAT_")
                    .map(|key| key.as_str().to_lowercase().replace("__", ".").into()),
            )
            .extract()
            .map_err(Box::new)
    }

    /// Find the config file by looking for a .termchat directory,
    /// searching from the current directory up to the filesystem root.
    fn find_workspace_config() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;

        for ancestor in current.ancestors() {
            let config_dir = ancestor.join(CONFIG_DIR);
            if config_dir.is_dir() {
                return Some(config_dir.join("settings.toml"));
            }
        }

        None
    }

    /// Check if configuration is properly initialized
    pub fn check_init() -> Result<(), String> {
        let config_path = Self::find_workspace_config()
            .unwrap_or_else(|| PathBuf::from(CONFIG_DIR).join("settings.toml"));

        if !config_path.exists() {
            return Err(
                "No configuration file found. Run 'termchat init' to create one".to_string(),
            );
        }

        match std::fs::read_to_string(&config_path) {
            Ok(content) => {
                if let Err(e) = toml::from_str::<Settings>(&content) {
                    return Err(format!(
                        "Configuration file is corrupted: {e}\nRun 'termchat init --force' to regenerate."
                    ));
                }
            }
            Err(e) => {
                return Err(format!("Cannot read configuration file: {e}"));
            }
        }

        Ok(())
    }

    /// Save current configuration to file
    pub fn save(
        &self,
        path: impl AsRef<std::path::Path>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let parent = path.as_ref().parent().ok_or("Invalid path")?;
        std::fs::create_dir_all(parent)?;

        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;

        Ok(())
    }

    /// Create a default settings file
    pub fn init_config_file(force: bool) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let config_path = PathBuf::from(CONFIG_DIR).join("settings.toml");

        if !force && config_path.exists() {
            return Err("Configuration file already exists. Use --force to overwrite".into());
        }

        let settings = Settings::default();
        settings.save(&config_path)?;

        Ok(config_path)
    }

    /// Directory for the retrieval snapshot.
    pub fn vectorstore_dir(&self) -> PathBuf {
        self.data_dir.join("vectorstore")
    }

    /// Directory for fastembed's model cache.
    pub fn models_dir(&self) -> PathBuf {
        self.data_dir.join("models")
    }

    /// Response cache file path.
    pub fn cache_file(&self) -> PathBuf {
        self.data_dir.join("cache").join("responses.json")
    }

    /// Chat history file path.
    pub fn history_file(&self) -> PathBuf {
        self.data_dir.join("history").join("chat_history.json")
    }

    /// Effective API endpoint: configured URL or the provider default.
    pub fn api_url(&self) -> String {
        if self.api.url.is_empty() {
            self.api.provider.default_url().to_string()
        } else {
            self.api.url.clone()
        }
    }
}
