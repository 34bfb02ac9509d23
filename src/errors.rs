//! Error types for ollamarag
//!
//! One error enum for the whole pipeline. Per-file and per-query failures are
//! contained by their callers; only `StoreUnavailable` ends the process.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the RAG orchestrator
#[derive(Error, Debug)]
pub enum RagError {
    /// Persisted store could not be opened, created, read or written
    #[error("Knowledge store unavailable: {0}")]
    StoreUnavailable(String),

    /// Embedding call failed
    #[error("Embedding failed: {0}")]
    EmbeddingFailure(String),

    /// Completion or streaming call failed
    #[error("Generation failed: {0}")]
    GenerationFailure(String),

    /// File extension is not handled by any loader
    #[error("Unsupported format for {path:?}: {reason}")]
    UnsupportedFormat { path: PathBuf, reason: String },

    /// File content could not be decoded as text
    #[error("Could not decode {path:?}: {reason}")]
    DecodeFailure { path: PathBuf, reason: String },

    /// A configured deadline was exceeded
    #[error("{operation} timed out after {duration_ms}ms")]
    Timeout { operation: String, duration_ms: u64 },

    /// Streaming errors
    #[error("Streaming error: {0}")]
    StreamingError(String),

    /// JSON parsing errors
    #[error("JSON parse error: {0}")]
    JsonParseError(String),

    /// HTTP client errors
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Generic errors with context
    #[error("{0}")]
    Generic(String),
}

impl RagError {
    /// True when the failure was caused by a deadline
    pub fn is_timeout(&self) -> bool {
        matches!(self, RagError::Timeout { .. })
    }

    /// Only store initialization failures end the process
    pub fn is_fatal(&self) -> bool {
        matches!(self, RagError::StoreUnavailable(_))
    }
}

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, RagError>;

/// Convert anyhow errors to RagError
impl From<anyhow::Error> for RagError {
    fn from(err: anyhow::Error) -> Self {
        RagError::Generic(err.to_string())
    }
}
