use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::search::OutputFormat;
use crate::error::ConfigError;

pub const DEFAULT_EMBEDDING_URL: &str =
    "https://api-inference.huggingface.co/pipeline/feature-extraction";
pub const DEFAULT_EMBEDDING_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 384;
pub const DEFAULT_COLLECTION: &str = "document_embeddings";

/// Texts sent to the embedding endpoint per request.
pub const EMBEDDING_BATCH_SIZE: usize = 10;

pub const MIN_CHUNK_SIZE: usize = 100;
pub const MAX_CHUNK_SIZE: usize = 4000;
pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const MIN_CHUNK_OVERLAP: usize = 50;

pub const MIN_K_DOCUMENTS: usize = 1;
pub const MAX_K_DOCUMENTS: usize = 20;
pub const DEFAULT_K_DOCUMENTS: usize = 3;

pub const DEFAULT_MAX_HISTORY: usize = 100;

const ENV_STORAGE_PATH: &str = "DOCRAG_STORAGE_PATH";
const ENV_COLLECTION: &str = "DOCRAG_COLLECTION";
const ENV_EMBEDDING_URL: &str = "DOCRAG_EMBEDDING_URL";
const ENV_EMBEDDING_MODEL: &str = "DOCRAG_EMBEDDING_MODEL";
const ENV_EMBEDDING_TOKEN: &str = "DOCRAG_EMBEDDING_TOKEN";

/// Default overlap for a chunk size: a fifth of it, never below the minimum.
pub fn default_chunk_overlap(chunk_size: usize) -> usize {
    (chunk_size / 5).max(MIN_CHUNK_OVERLAP)
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub indexing: IndexingConfig,

    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub monitor: MonitorConfig,
}

impl Config {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("docrag").join("config.toml"))
    }

    /// Load the config file at the default location (if any), then apply
    /// environment overrides and validate.
    pub fn load() -> Result<Self, ConfigError> {
        match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => {
                let mut config = Self::default();
                config.apply_env();
                config.validate()?;
                Ok(config)
            }
        }
    }

    /// Load from an explicit file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&content)?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn save(&self) -> Result<PathBuf, ConfigError> {
        let path = Self::config_path().ok_or_else(|| {
            ConfigError::PathError("could not determine config directory".to_string())
        })?;
        self.save_to(&path)?;
        Ok(path)
    }

    fn apply_env(&mut self) {
        if let Some(path) = env_value(ENV_STORAGE_PATH) {
            self.storage.path = PathBuf::from(path);
        }
        if let Some(collection) = env_value(ENV_COLLECTION) {
            self.storage.collection = collection;
        }
        if let Some(url) = env_value(ENV_EMBEDDING_URL) {
            self.embedding.url = url;
        }
        if let Some(model) = env_value(ENV_EMBEDDING_MODEL) {
            self.embedding.model = model;
        }
        if let Some(token) = env_value(ENV_EMBEDDING_TOKEN) {
            self.embedding.api_token = Some(token);
        }
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::ValidationError(msg));

        if self.embedding.dimension == 0 {
            return invalid("embedding.dimension must be greater than zero".into());
        }
        if self.embedding.timeout_secs == 0 {
            return invalid("embedding.timeout_secs must be greater than zero".into());
        }
        if !(MIN_CHUNK_SIZE..=MAX_CHUNK_SIZE).contains(&self.indexing.chunk_size) {
            return invalid(format!(
                "indexing.chunk_size must be between {} and {}",
                MIN_CHUNK_SIZE, MAX_CHUNK_SIZE
            ));
        }
        let overlap = self.indexing.effective_overlap();
        if overlap < MIN_CHUNK_OVERLAP || overlap >= self.indexing.chunk_size {
            return invalid(format!(
                "indexing.chunk_overlap must be at least {} and smaller than chunk_size",
                MIN_CHUNK_OVERLAP
            ));
        }
        if !(MIN_K_DOCUMENTS..=MAX_K_DOCUMENTS).contains(&self.search.default_k) {
            return invalid(format!(
                "search.default_k must be between {} and {}",
                MIN_K_DOCUMENTS, MAX_K_DOCUMENTS
            ));
        }
        if self.storage.collection.trim().is_empty() {
            return invalid("storage.collection must not be empty".into());
        }
        if self.monitor.max_history == 0 {
            return invalid("monitor.max_history must be greater than zero".into());
        }
        Ok(())
    }
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Base URL; requests go to `<url>/<model>`.
    #[serde(default = "default_embedding_url")]
    pub url: String,

    #[serde(default = "default_embedding_model")]
    pub model: String,

    #[serde(default = "default_dimension")]
    pub dimension: usize,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,

    /// Delay before the first retry; later retries double it.
    #[serde(default = "default_retry_delay")]
    pub retry_initial_delay_ms: u64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,
}

fn default_embedding_url() -> String {
    DEFAULT_EMBEDDING_URL.to_string()
}

fn default_embedding_model() -> String {
    DEFAULT_EMBEDDING_MODEL.to_string()
}

fn default_dimension() -> usize {
    DEFAULT_EMBEDDING_DIMENSION
}

fn default_timeout() -> u64 {
    30
}

fn default_probe_timeout() -> u64 {
    10
}

fn default_retry_delay() -> u64 {
    1000
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            url: default_embedding_url(),
            model: default_embedding_model(),
            dimension: default_dimension(),
            timeout_secs: default_timeout(),
            probe_timeout_secs: default_probe_timeout(),
            retry_initial_delay_ms: default_retry_delay(),
            api_token: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,

    #[serde(default = "default_collection")]
    pub collection: String,
}

fn default_storage_path() -> PathBuf {
    dirs::data_dir()
        .map(|p| p.join("docrag").join("vectorstore"))
        .unwrap_or_else(|| PathBuf::from("./data/vectorstore"))
}

fn default_collection() -> String {
    DEFAULT_COLLECTION.to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
            collection: default_collection(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Defaults to a fifth of `chunk_size` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_overlap: Option<usize>,

    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,

    #[serde(default = "default_exclude_patterns")]
    pub exclude_patterns: Vec<String>,
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_max_file_size() -> u64 {
    10 * 1024 * 1024
}

fn default_exclude_patterns() -> Vec<String> {
    vec![
        "**/.git/**".to_string(),
        "**/target/**".to_string(),
        "**/node_modules/**".to_string(),
    ]
}

impl IndexingConfig {
    pub fn effective_overlap(&self) -> usize {
        self.chunk_overlap
            .unwrap_or_else(|| default_chunk_overlap(self.chunk_size))
    }
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: None,
            max_file_size: default_max_file_size(),
            exclude_patterns: default_exclude_patterns(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_k")]
    pub default_k: usize,

    #[serde(default)]
    pub default_format: OutputFormat,
}

fn default_k() -> usize {
    DEFAULT_K_DOCUMENTS
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_k: default_k(),
            default_format: OutputFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default = "default_max_history")]
    pub max_history: usize,
}

fn default_max_history() -> usize {
    DEFAULT_MAX_HISTORY
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            max_history: default_max_history(),
        }
    }
}
