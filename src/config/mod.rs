//! Configuration management for hybrag
//!
//! Configuration is a TOML file (by default `~/.config/hybrag/config.toml`)
//! with optional named profiles and `HYBRAG_SECTION__KEY` environment
//! overrides. Once loaded it is immutable: per-query parameters are derived
//! from it as plain values.

use crate::chunking::ChunkingConfig;
use crate::embedding::EmbeddingConfig;
use crate::error::{RagError, Result};
use crate::index::Bm25Params;
use crate::retrieval::{RetrievalParams, Strategy};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

mod validator;

pub use validator::ConfigValidator;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "_meta")]
    pub meta: MetaConfig,
    pub storage: StorageConfig,
    pub embedding: EmbeddingConfig,
    pub chunking: ChunkingConfig,
    pub retrieval: RetrievalConfig,
    pub lexical: Bm25Params,
    pub reranker: RerankerConfig,
    #[serde(default)]
    pub profiles: HashMap<String, ProfileOverrides>,
}

/// Metadata about the configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaConfig {
    pub schema_version: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub last_modified: DateTime<Utc>,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the persisted indexes
    pub index_dir: PathBuf,
    /// Folder scanned by a full rebuild
    pub docs_dir: PathBuf,
}

/// Retrieval defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Default strategy name
    pub strategy: String,
    pub top_k: usize,
    pub mmr_lambda: f32,
    pub hybrid_alpha: f32,
    pub mmr_pool_factor: usize,
    pub rerank_pool_factor: usize,
    pub rrf_k: f32,
    pub rrf_candidate_factor: usize,
    pub rrf_min_candidates: usize,
    /// Strategy that produces candidates for `rerank`
    pub rerank_base: String,
}

impl RetrievalConfig {
    /// Strategy parameters for one query
    pub fn params(&self) -> RetrievalParams {
        RetrievalParams {
            mmr_lambda: self.mmr_lambda,
            hybrid_alpha: self.hybrid_alpha,
            mmr_pool_factor: self.mmr_pool_factor,
            rerank_pool_factor: self.rerank_pool_factor,
            rrf_k: self.rrf_k,
            rrf_candidate_factor: self.rrf_candidate_factor,
            rrf_min_candidates: self.rrf_min_candidates,
        }
    }

    /// Resolve a strategy name, applying `rerank_base` to a bare `rerank`
    /// and falling back to MMR for unknown names
    pub fn strategy(&self, name: &str) -> Strategy {
        if name.trim().eq_ignore_ascii_case("rerank") {
            return Strategy::rerank_over(&self.rerank_base);
        }
        Strategy::from_name_or_default(name)
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        let params = RetrievalParams::default();
        Self {
            strategy: "mmr".to_string(),
            top_k: 5,
            mmr_lambda: params.mmr_lambda,
            hybrid_alpha: params.hybrid_alpha,
            mmr_pool_factor: params.mmr_pool_factor,
            rerank_pool_factor: params.rerank_pool_factor,
            rrf_k: params.rrf_k,
            rrf_candidate_factor: params.rrf_candidate_factor,
            rrf_min_candidates: params.rrf_min_candidates,
            rerank_base: "hybrid".to_string(),
        }
    }
}

/// Cross-encoder reranker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankerConfig {
    pub enabled: bool,
    pub model: String,
}

/// Profile-specific configuration overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mmr_lambda: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hybrid_alpha: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reranker_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_dir: Option<PathBuf>,
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(RagError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| RagError::Io {
            source: e,
            context: format!("Failed to read config file: {:?}", path),
        })?;
        let config: Config = toml::from_str(&content)?;
        config.with_env_overrides()
    }

    /// Load `path`, or fall back to defaults when no file exists
    ///
    /// Environment overrides are applied and validated either way.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            return Self::load(path);
        }

        tracing::warn!(
            "Config file {} not found, using defaults. Run 'hybrag config init' to create one.",
            path.display()
        );
        Self::default().with_env_overrides()
    }

    /// Apply environment variable overrides, then validate
    fn with_env_overrides(mut self) -> Result<Self> {
        self.apply_env_overrides();
        ConfigValidator::validate(&self)?;
        Ok(self)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| RagError::Io {
                source: e,
                context: format!("Failed to create config directory: {:?}", parent),
            })?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| RagError::Io {
            source: e,
            context: format!("Failed to write config file: {:?}", path),
        })?;
        Ok(())
    }

    /// Load configuration with a specific profile applied
    pub fn load_with_profile(path: &Path, profile: &str) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_profile(profile)?;
        ConfigValidator::validate(&config)?;
        Ok(config)
    }

    /// Apply a profile's overrides to the configuration
    pub fn apply_profile(&mut self, profile: &str) -> Result<()> {
        let overrides = self
            .profiles
            .get(profile)
            .cloned()
            .ok_or_else(|| RagError::Config(format!("Unknown profile: {}", profile)))?;

        if let Some(model) = overrides.embedding_model {
            self.embedding.model = model;
        }
        if let Some(strategy) = overrides.strategy {
            self.retrieval.strategy = strategy;
        }
        if let Some(top_k) = overrides.top_k {
            self.retrieval.top_k = top_k;
        }
        if let Some(lambda) = overrides.mmr_lambda {
            self.retrieval.mmr_lambda = lambda;
        }
        if let Some(alpha) = overrides.hybrid_alpha {
            self.retrieval.hybrid_alpha = alpha;
        }
        if let Some(enabled) = overrides.reranker_enabled {
            self.reranker.enabled = enabled;
        }
        if let Some(index_dir) = overrides.index_dir {
            self.storage.index_dir = index_dir;
        }

        tracing::debug!("Applied configuration profile: {}", profile);
        Ok(())
    }

    /// Apply environment variable overrides
    /// Environment variables in format: HYBRAG_SECTION__KEY=value
    pub fn apply_env_overrides(&mut self) {
        for (key, value) in std::env::vars() {
            if let Some(config_key) = key.strip_prefix("HYBRAG_") {
                if let Err(e) = self.set_value_from_env(config_key, &value) {
                    tracing::warn!("Failed to apply env override {}: {}", key, e);
                }
            }
        }
    }

    fn set_value_from_env(&mut self, path: &str, value: &str) -> Result<()> {
        match path {
            "STORAGE__INDEX_DIR" => self.storage.index_dir = PathBuf::from(value),
            "STORAGE__DOCS_DIR" => self.storage.docs_dir = PathBuf::from(value),
            "EMBEDDING__MODEL" => self.embedding.model = value.to_string(),
            "EMBEDDING__BATCH_SIZE" => self.embedding.batch_size = parse_env(path, value)?,
            "EMBEDDING__DIMENSION" => self.embedding.dimension = parse_env(path, value)?,
            "CHUNKING__CHUNK_SIZE" => self.chunking.chunk_size = parse_env(path, value)?,
            "CHUNKING__OVERLAP" => self.chunking.overlap = parse_env(path, value)?,
            "RETRIEVAL__STRATEGY" => self.retrieval.strategy = value.to_string(),
            "RETRIEVAL__TOP_K" => self.retrieval.top_k = parse_env(path, value)?,
            "RETRIEVAL__MMR_LAMBDA" => self.retrieval.mmr_lambda = parse_env(path, value)?,
            "RETRIEVAL__HYBRID_ALPHA" => self.retrieval.hybrid_alpha = parse_env(path, value)?,
            "RETRIEVAL__RRF_K" => self.retrieval.rrf_k = parse_env(path, value)?,
            "RERANKER__ENABLED" => self.reranker.enabled = parse_env(path, value)?,
            "RERANKER__MODEL" => self.reranker.model = value.to_string(),
            _ => {
                tracing::debug!("Unknown env config key: {}", path);
            }
        }
        Ok(())
    }

    /// Index directory with `~` expanded
    pub fn index_dir(&self) -> PathBuf {
        expand_tilde(&self.storage.index_dir)
    }

    /// Documents directory with `~` expanded
    pub fn docs_dir(&self) -> PathBuf {
        expand_tilde(&self.storage.docs_dir)
    }

    /// Get the default configuration file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| RagError::Config("Cannot determine config directory".to_string()))?;

        Ok(config_dir.join("hybrag").join("config.toml"))
    }
}

fn parse_env<T: FromStr>(path: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| RagError::InvalidConfigValue {
        path: path.to_string(),
        message: format!(
            "Cannot parse '{}' as {}",
            value,
            std::any::type_name::<T>()
        ),
    })
}

/// Expand a leading `~` to the home directory
pub fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(rest) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    path.to_path_buf()
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = PathBuf::from("~/.hybrag");

        Self {
            meta: MetaConfig {
                schema_version: "1.0.0".to_string(),
                created_at: Utc::now(),
                last_modified: Utc::now(),
            },
            storage: StorageConfig {
                index_dir: data_dir.join("index"),
                docs_dir: data_dir.join("docs"),
            },
            embedding: EmbeddingConfig::default(),
            chunking: ChunkingConfig::default(),
            retrieval: RetrievalConfig::default(),
            lexical: Bm25Params::default(),
            reranker: RerankerConfig {
                enabled: false,
                model: "bge-reranker-base".to_string(),
            },
            profiles: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_save_and_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("hybrag").join("config.toml");

        let mut config = Config::default();
        config.retrieval.strategy = "rrf".to_string();
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.retrieval.strategy, "rrf");
        assert_eq!(loaded.chunking.chunk_size, 800);
        assert_eq!(loaded.lexical.k1, 1.5);
        assert_eq!(loaded.meta.created_at, config.meta.created_at);
    }

    #[test]
    fn test_defaults_are_validated_after_overrides() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("absent.toml");
        assert!(Config::load_or_default(&missing).is_ok());

        let mut config = Config::default();
        config.set_value_from_env("CHUNKING__OVERLAP", "900").unwrap();
        assert!(matches!(
            config.with_env_overrides(),
            Err(RagError::ConfigValidation { .. })
        ));
    }

    #[test]
    fn test_missing_file() {
        let result = Config::load(Path::new("/nonexistent/hybrag.toml"));
        assert!(matches!(result, Err(RagError::ConfigNotFound { .. })));
    }

    #[test]
    fn test_profile_overrides() {
        let mut config = Config::default();
        config.profiles.insert(
            "offline".to_string(),
            ProfileOverrides {
                embedding_model: Some("hashing".to_string()),
                top_k: Some(3),
                ..Default::default()
            },
        );

        config.apply_profile("offline").unwrap();
        assert_eq!(config.embedding.model, "hashing");
        assert_eq!(config.retrieval.top_k, 3);
        assert!(config.apply_profile("missing").is_err());
    }

    #[test]
    fn test_env_value_parsing() {
        let mut config = Config::default();
        config.set_value_from_env("RETRIEVAL__TOP_K", "9").unwrap();
        config.set_value_from_env("RERANKER__ENABLED", "true").unwrap();
        config.set_value_from_env("UNKNOWN__KEY", "x").unwrap();
        assert_eq!(config.retrieval.top_k, 9);
        assert!(config.reranker.enabled);

        let err = config.set_value_from_env("RETRIEVAL__MMR_LAMBDA", "high");
        assert!(matches!(err, Err(RagError::InvalidConfigValue { .. })));
    }

    #[test]
    fn test_strategy_resolution() {
        let retrieval = RetrievalConfig {
            rerank_base: "rrf".to_string(),
            ..Default::default()
        };
        assert_eq!(
            retrieval.strategy("rerank"),
            Strategy::Rerank(Box::new(Strategy::Rrf))
        );
        assert_eq!(retrieval.strategy("hybrid"), Strategy::Hybrid);
        assert_eq!(retrieval.strategy("nope"), Strategy::Mmr);
    }

    #[test]
    fn test_expand_tilde() {
        let plain = Path::new("/var/lib/hybrag");
        assert_eq!(expand_tilde(plain), plain);

        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_tilde(Path::new("~/index")), home.join("index"));
        }
    }
}
