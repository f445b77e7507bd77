use std::path::PathBuf;
use thiserror::Error;

use crate::embedding::EmbeddingError;
use crate::index::{DenseIndexError, LexicalIndexError};
use crate::retrieval::SearchError;

/// Main error type for hybrag
#[derive(Error, Debug)]
pub enum RagError {
    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration validation errors
    #[error("Configuration validation failed: {errors:?}")]
    ConfigValidation { errors: Vec<ValidationError> },

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Invalid configuration value
    #[error("Invalid configuration value at {path}: {message}")]
    InvalidConfigValue { path: String, message: String },

    /// IO errors
    #[error("IO error: {context}: {source}")]
    Io {
        source: std::io::Error,
        context: String,
    },

    /// TOML deserialization errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization errors
    #[error("TOML serialization error: {0}")]
    TomlSerialization(#[from] toml::ser::Error),

    /// JSON errors
    #[error("JSON error: {context}: {source}")]
    Json {
        source: serde_json::Error,
        context: String,
    },

    /// Dense index errors (shape mismatch, corrupt blob, missing ledger)
    #[error("Dense index error: {0}")]
    DenseIndex(#[from] DenseIndexError),

    /// Lexical index errors
    #[error("Lexical index error: {0}")]
    LexicalIndex(#[from] LexicalIndexError),

    /// Dense and lexical membership diverged; only a full rebuild recovers
    #[error("Inconsistent index state: dense has {dense} units, lexical has {lexical} ({detail})")]
    InconsistentIndexState {
        dense: usize,
        lexical: usize,
        detail: String,
    },

    /// Embedding provider failures during ingestion
    #[error("Embedding provider failure: {0}")]
    Embedding(#[from] EmbeddingError),

    /// Query-time failures
    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    /// Generic errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// Path to the configuration key that failed validation
    pub path: String,
    /// Error message describing the validation failure
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result type for hybrag operations
pub type Result<T> = std::result::Result<T, RagError>;
