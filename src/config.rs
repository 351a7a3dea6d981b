//! Configuration file support for corpusflower
//!
//! Config file location: ~/.config/corpusflower/config.toml
//!
//! Example config:
//! ```toml
//! [embedding]
//! provider = "ollama"  # ollama, openai, hash
//! model = "nomic-embed-text"
//! host = "http://localhost:11434"  # for ollama
//! # base_url = "http://localhost:1234/v1"  # for openai-compatible servers
//! # api_key = "sk-..."  # for openai
//!
//! [chunking]
//! target_length = 1200
//! overlap = 200
//!
//! [retrieval]
//! top_k = 5
//! context_size = 60
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use corpusflower::chunker::{ChunkerConfig, LengthUnit};
use corpusflower::embedding::DEFAULT_HASH_DIMENSIONS;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub chunking: ChunkerConfig,

    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

/// Embedding provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Provider type: ollama, openai, hash
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Model name
    #[serde(default = "default_model")]
    pub model: String,

    /// Host for Ollama (e.g., http://localhost:11434)
    pub host: Option<String>,

    /// Base URL for OpenAI-compatible APIs (e.g., http://localhost:1234/v1)
    pub base_url: Option<String>,

    /// API key for OpenAI
    pub api_key: Option<String>,

    /// Batch size for embedding requests
    pub batch_size: Option<usize>,

    /// Seconds to wait for one provider call
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Vector length for the hash provider
    #[serde(default = "default_hash_dimensions")]
    pub hash_dimensions: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            host: None,
            base_url: None,
            api_key: None,
            batch_size: None,
            timeout_secs: default_timeout_secs(),
            hash_dimensions: default_hash_dimensions(),
        }
    }
}

impl EmbeddingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_provider() -> String {
    "ollama".to_string()
}

fn default_model() -> String {
    "nomic-embed-text".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_hash_dimensions() -> usize {
    DEFAULT_HASH_DIMENSIONS
}

/// Query defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Context on each side of a concordance hit
    #[serde(default = "default_context_size")]
    pub context_size: usize,

    #[serde(default)]
    pub context_unit: LengthUnit,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            context_size: default_context_size(),
            context_unit: LengthUnit::Chars,
        }
    }
}

fn default_top_k() -> usize {
    5
}

fn default_context_size() -> usize {
    60
}

const EXAMPLE: &str = r#"# corpusflower configuration
# Location: ~/.config/corpusflower/config.toml

[embedding]
# Provider: ollama, openai, hash (offline, deterministic)
provider = "ollama"

# Model name (provider-specific)
# Ollama: nomic-embed-text, mxbai-embed-large
# OpenAI: text-embedding-3-small, text-embedding-3-large
model = "nomic-embed-text"

# Ollama host (default: http://localhost:11434)
# host = "http://localhost:11434"

# OpenAI-compatible base URL
# base_url = "http://localhost:1234/v1"

# API key (or set OPENAI_API_KEY)
# api_key = "sk-..."

# Batch size for embedding requests (default: 32)
# batch_size = 32

# Seconds to wait for one provider call
timeout_secs = 60

[chunking]
# Passage length and overlap, in `unit` (chars or tokens)
target_length = 1200
overlap = 200
boundary_tolerance = 120
unit = "chars"

[retrieval]
top_k = 5
context_size = 60
context_unit = "chars"
"#;

impl Config {
    /// Get the config file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("corpusflower")
            .join("config.toml")
    }

    /// Load config from file, returning defaults if not found
    pub fn load() -> Self {
        let path = Self::config_path();
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(content) => match toml::from_str(&content) {
                    Ok(config) => {
                        tracing::debug!("Loaded config from {:?}", path);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to parse config file: {}", e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config file: {}", e);
                }
            }
        }
        Self::default()
    }

    /// Write the commented example config to `path`.
    ///
    /// Returns false when a file exists there and `overwrite` is off.
    pub fn write_example(path: &Path, overwrite: bool) -> anyhow::Result<bool> {
        if path.exists() && !overwrite {
            return Ok(false);
        }


        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, EXAMPLE)?;
        Ok(true)
    }

    /// Copy safe to print: the API key is masked
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if config.embedding.api_key.is_some() {
            config.embedding.api_key = Some("***".to_string());
        }
        config
    }
}
