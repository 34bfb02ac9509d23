//! Configuration management for ollamarag
//!
//! TOML-based configuration with defaults and validation.
//! Location: ~/.ollamarag/config.toml (overridable with `--config`).
//!
//! The configuration is loaded once at startup and handed to each component
//! by reference; nothing here is global.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::errors::{RagError, Result};
use crate::rag::{RetrievalConfig, MAX_TOP_K};

/// Complete configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub ollama: OllamaConfig,
    pub store: StoreConfig,
    pub corpus: CorpusConfig,
    pub retrieval: RetrievalConfig,
    pub ingestion: IngestionConfig,
}

/// Ollama connection and model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    pub host: String,
    pub port: u16,
    pub llm_model: String,
    pub embed_model: String,
    pub temperature: f32,
    /// Context window requested from the model, in tokens
    pub num_ctx: usize,
    pub request_timeout_secs: u64,
}

/// Which persisted store backs the knowledge base
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// JSONL files under `store.path`; supports graph retrieval
    Local,
    /// Qdrant collection at `store.qdrant_url`
    Qdrant,
}

/// Knowledge store location
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub path: PathBuf,
    pub collection: String,
    pub qdrant_url: String,
    /// Vector size for Qdrant collections (bge-m3 produces 1024)
    pub embedding_dim: u64,
}

/// Document corpus and chunking
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorpusConfig {
    pub docs_dir: PathBuf,
    /// Target chunk size in tokens
    pub chunk_size: usize,
    /// Overlap between consecutive chunks in tokens
    pub chunk_overlap: usize,
}

/// Ingestion throughput limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestionConfig {
    /// Concurrent embedding calls during population
    pub max_concurrency: usize,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 11434,
            llm_model: "qwen2.5".to_string(),
            embed_model: "bge-m3".to_string(),
            temperature: 0.1,
            num_ctx: 32768,
            request_timeout_secs: 300,
        }
    }
}

impl OllamaConfig {
    /// Base URL of the Ollama HTTP API
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Local,
            path: PathBuf::from("./rag_store"),
            collection: "my_collection".to_string(),
            qdrant_url: "http://localhost:6334".to_string(),
            embedding_dim: 1024,
        }
    }
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            docs_dir: PathBuf::from("./docs"),
            chunk_size: 512,
            chunk_overlap: 50,
        }
    }
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self { max_concurrency: 4 }
    }
}

impl Config {
    /// Load configuration from file or use defaults
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        if let Some(config_path) = path {
            Self::load_from_file(&config_path)
        } else {
            Self::load_default()
        }
    }

    /// Load configuration from specific file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| RagError::ConfigError(format!("Failed to read config: {}", e)))?;

        let config: Config = toml::from_str(&contents)
            .map_err(|e| RagError::ConfigError(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load default configuration from standard location or use built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Some(config_path) = Self::default_path() {
            if config_path.exists() {
                return Self::load_from_file(&config_path);
            }
        }

        Ok(Config::default())
    }

    /// Standard config file location
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".ollamarag").join("config.toml"))
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.corpus.chunk_size == 0 {
            return Err(RagError::ConfigError(
                "chunk_size must be greater than 0".to_string(),
            ));
        }

        if self.corpus.chunk_overlap >= self.corpus.chunk_size {
            return Err(RagError::ConfigError(
                "chunk_overlap must be less than chunk_size".to_string(),
            ));
        }

        if self.retrieval.top_k == 0 || self.retrieval.top_k > MAX_TOP_K {
            return Err(RagError::ConfigError(format!(
                "top_k must be between 1 and {}",
                MAX_TOP_K
            )));
        }

        if !(0.0..=1.0).contains(&self.retrieval.mmr_lambda) {
            return Err(RagError::ConfigError(
                "mmr_lambda must be between 0.0 and 1.0".to_string(),
            ));
        }

        if self.retrieval.candidate_multiplier == 0 {
            return Err(RagError::ConfigError(
                "candidate_multiplier must be greater than 0".to_string(),
            ));
        }

        if self.ingestion.max_concurrency == 0 {
            return Err(RagError::ConfigError(
                "max_concurrency must be greater than 0".to_string(),
            ));
        }

        if self.ollama.num_ctx < 512 {
            return Err(RagError::ConfigError(
                "num_ctx must be at least 512 tokens".to_string(),
            ));
        }

        if self.ollama.request_timeout_secs == 0 {
            return Err(RagError::ConfigError(
                "request_timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.store.collection.trim().is_empty() {
            return Err(RagError::ConfigError(
                "store.collection must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                RagError::ConfigError(format!("Failed to create config directory: {}", e))
            })?;
        }

        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| RagError::ConfigError(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, toml_string)
            .map_err(|e| RagError::ConfigError(format!("Failed to write config: {}", e)))?;

        Ok(())
    }
}
