//! Configuration system
//!
//! Supports loading configuration from:
//! 1. CLI --config argument
//! 2. Default values
//!
//! Environment variables override service endpoints and keys:
//! - FARO_OLLAMA_URL
//! - OPENAI_API_KEY
//!
//! Every config object validates eagerly via [`EngineConfig::validate`];
//! invalid tier sizes, window sizes or thresholds are rejected at
//! construction, never deferred to query time.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse config JSON: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Supported model providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ModelProvider {
    #[default]
    Ollama,
    OpenAI,
}

impl std::fmt::Display for ModelProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ollama => write!(f, "ollama"),
            Self::OpenAI => write!(f, "openai"),
        }
    }
}

impl std::str::FromStr for ModelProvider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::OpenAI),
            _ => Err(ConfigError::ValidationError(format!(
                "Unknown provider: {}",
                s
            ))),
        }
    }
}

/// Configuration for a completion model (synthesis or judge)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Provider type
    pub provider: ModelProvider,

    /// API base URL
    #[serde(default = "default_ollama_url")]
    pub url: String,

    /// Model name
    pub model: String,

    /// API key (OpenAI); falls back to the OPENAI_API_KEY env var
    #[serde(default)]
    pub api_key: Option<String>,

    /// Sampling temperature. Low but non-zero by default: output is stable
    /// but not guaranteed identical across calls.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default)]
    pub max_tokens: Option<usize>,

    /// Per-call timeout in seconds; on expiry the call fails instead of
    /// hanging
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_ollama_url() -> String {
    std::env::var("FARO_OLLAMA_URL").unwrap_or_else(|_| "http://localhost:11434".to_string())
}

fn default_temperature() -> f32 {
    0.1
}

fn default_timeout_secs() -> u64 {
    120
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: ModelProvider::Ollama,
            url: default_ollama_url(),
            model: "qwen3:8b".to_string(),
            api_key: None,
            temperature: default_temperature(),
            max_tokens: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ModelConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model.is_empty() {
            return Err(ConfigError::ValidationError("model name is empty".into()));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::ValidationError(format!(
                "temperature {} outside [0, 2]",
                self.temperature
            )));
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "timeout_secs must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Hierarchical chunking tiers, coarse to fine, in characters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Chunk-size tiers from coarse to fine
    #[serde(default = "default_tiers")]
    pub tiers: Vec<usize>,

    /// Overlap between adjacent siblings at the same tier, in characters
    #[serde(default = "default_overlap")]
    pub overlap: usize,
}

fn default_tiers() -> Vec<usize> {
    vec![2048, 512, 128]
}

fn default_overlap() -> usize {
    20
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            tiers: default_tiers(),
            overlap: default_overlap(),
        }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tiers.is_empty() {
            return Err(ConfigError::ValidationError("no chunk tiers given".into()));
        }
        if self.tiers.iter().any(|&t| t == 0) {
            return Err(ConfigError::ValidationError("chunk tier of size 0".into()));
        }
        for pair in self.tiers.windows(2) {
            if pair[1] >= pair[0] {
                return Err(ConfigError::ValidationError(format!(
                    "tiers must be strictly decreasing, got {} then {}",
                    pair[0], pair[1]
                )));
            }
        }
        let finest = *self.tiers.last().unwrap_or(&0);
        if self.overlap >= finest {
            return Err(ConfigError::ValidationError(format!(
                "overlap {} must be smaller than the finest tier {}",
                self.overlap, finest
            )));
        }
        Ok(())
    }
}

/// Sentence-window indexing parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    /// Sentences on each side of a matched sentence
    #[serde(default = "default_window_size")]
    pub window_size: usize,
}

fn default_window_size() -> usize {
    3
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            window_size: default_window_size(),
        }
    }
}

impl WindowConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_size == 0 {
            return Err(ConfigError::ValidationError(
                "window_size must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Retrieval parameters shared by all strategies
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Results to retrieve per query
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Fraction of a parent's children that must be retrieved before the
    /// parent replaces them
    #[serde(default = "default_merge_threshold")]
    pub merge_threshold: f32,

    /// Apply the secondary rerank stage to sentence-window retrieval
    #[serde(default = "default_rerank")]
    pub rerank: bool,

    /// Separator between context texts in the synthesis prompt
    #[serde(default = "default_separator")]
    pub separator: String,
}

fn default_top_k() -> usize {
    6
}

fn default_merge_threshold() -> f32 {
    0.5
}

fn default_rerank() -> bool {
    true
}

fn default_separator() -> String {
    "\n\n".to_string()
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            merge_threshold: default_merge_threshold(),
            rerank: default_rerank(),
            separator: default_separator(),
        }
    }
}

impl RetrievalConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.top_k == 0 {
            return Err(ConfigError::ValidationError(
                "top_k must be at least 1".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.merge_threshold) {
            return Err(ConfigError::ValidationError(format!(
                "merge_threshold {} outside [0, 1]",
                self.merge_threshold
            )));
        }
        Ok(())
    }
}

/// Top-level engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub chunking: ChunkingConfig,

    #[serde(default)]
    pub window: WindowConfig,

    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Model used for answer synthesis
    #[serde(default)]
    pub model: ModelConfig,

    /// Model used as the feedback judge (defaults to the synthesis model)
    #[serde(default)]
    pub judge: Option<ModelConfig>,
}

impl EngineConfig {
    /// Load from a JSON file, or defaults when no path is given
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(p) => {
                let data = std::fs::read_to_string(p)?;
                serde_json::from_str(&data)?
            }
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Judge model config, falling back to the synthesis model
    pub fn judge_model(&self) -> &ModelConfig {
        self.judge.as_ref().unwrap_or(&self.model)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.chunking.validate()?;
        self.window.validate()?;
        self.retrieval.validate()?;
        self.model.validate()?;
        if let Some(judge) = &self.judge {
            judge.validate()?;
        }
        Ok(())
    }
}
