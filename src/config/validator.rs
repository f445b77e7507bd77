use crate::config::Config;
use crate::embedding::{is_supported_model, HASHING_MODEL};
use crate::error::{RagError, Result, ValidationError};
use crate::retrieval::Strategy;

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration, collecting every violation
    pub fn validate(config: &Config) -> Result<()> {
        let mut errors = Vec::new();

        // Validate schema version
        Self::validate_schema_version(config, &mut errors);

        // Validate storage settings
        Self::validate_storage(config, &mut errors);

        // Validate embedding settings
        Self::validate_embedding(config, &mut errors);

        // Validate chunking settings
        Self::validate_chunking(config, &mut errors);

        // Validate retrieval settings
        Self::validate_retrieval(config, &mut errors);

        // Validate BM25 parameters
        Self::validate_lexical(config, &mut errors);

        // Validate reranker settings
        Self::validate_reranker(config, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(RagError::ConfigValidation { errors })
        }
    }

    fn validate_schema_version(config: &Config, errors: &mut Vec<ValidationError>) {
        let version = &config.meta.schema_version;
        if version != "1.0.0" {
            errors.push(ValidationError::new(
                "_meta.schema_version",
                format!("Unsupported schema version: {}", version),
            ));
        }
    }

    fn validate_storage(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.storage.index_dir.as_os_str().is_empty() {
            errors.push(ValidationError::new(
                "storage.index_dir",
                "Index directory cannot be empty",
            ));
        }

        if config.storage.docs_dir.as_os_str().is_empty() {
            errors.push(ValidationError::new(
                "storage.docs_dir",
                "Documents directory cannot be empty",
            ));
        }
    }

    fn validate_embedding(config: &Config, errors: &mut Vec<ValidationError>) {
        // Validate batch size
        if config.embedding.batch_size == 0 {
            errors.push(ValidationError::new(
                "embedding.batch_size",
                "Batch size must be greater than 0",
            ));
        }

        let model = &config.embedding.model;
        if model.is_empty() {
            errors.push(ValidationError::new(
                "embedding.model",
                "Model name cannot be empty",
            ));
        } else if model != HASHING_MODEL && !is_supported_model(model) {
            errors.push(ValidationError::new(
                "embedding.model",
                format!("Unknown embedding model '{}'", model),
            ));
        }

        if config.embedding.model == HASHING_MODEL && config.embedding.dimension == 0 {
            errors.push(ValidationError::new(
                "embedding.dimension",
                "Dimension must be greater than 0",
            ));
        }
    }

    fn validate_chunking(config: &Config, errors: &mut Vec<ValidationError>) {
        let chunking = &config.chunking;
        if chunking.chunk_size == 0 {
            errors.push(ValidationError::new(
                "chunking.chunk_size",
                "Chunk size must be greater than 0",
            ));
        }

        if chunking.overlap >= chunking.chunk_size {
            errors.push(ValidationError::new(
                "chunking.overlap",
                format!(
                    "Overlap ({}) must be smaller than chunk size ({})",
                    chunking.overlap, chunking.chunk_size
                ),
            ));
        }
    }

    fn validate_retrieval(config: &Config, errors: &mut Vec<ValidationError>) {
        let retrieval = &config.retrieval;

        if Strategy::parse(&retrieval.strategy).is_none() {
            errors.push(ValidationError::new(
                "retrieval.strategy",
                format!(
                    "Unknown strategy '{}'; expected similarity, mmr, hybrid, rrf or rerank[:<base>]",
                    retrieval.strategy
                ),
            ));
        }

        match Strategy::parse(&retrieval.rerank_base) {
            Some(Strategy::Rerank(_)) | None => errors.push(ValidationError::new(
                "retrieval.rerank_base",
                format!(
                    "Rerank base must be similarity, mmr, hybrid or rrf, got '{}'",
                    retrieval.rerank_base
                ),
            )),
            Some(_) => {}
        }

        if retrieval.top_k == 0 {
            errors.push(ValidationError::new(
                "retrieval.top_k",
                "top_k must be greater than 0",
            ));
        }

        for (path, value) in [
            ("retrieval.mmr_lambda", retrieval.mmr_lambda),
            ("retrieval.hybrid_alpha", retrieval.hybrid_alpha),
        ] {
            if !(0.0..=1.0).contains(&value) {
                errors.push(ValidationError::new(
                    path,
                    format!("Must be between 0.0 and 1.0, got {}", value),
                ));
            }
        }

        for (path, value) in [
            ("retrieval.mmr_pool_factor", retrieval.mmr_pool_factor),
            ("retrieval.rerank_pool_factor", retrieval.rerank_pool_factor),
            ("retrieval.rrf_candidate_factor", retrieval.rrf_candidate_factor),
        ] {
            if value == 0 {
                errors.push(ValidationError::new(path, "Must be at least 1"));
            }
        }

        if retrieval.rrf_k <= 0.0 {
            errors.push(ValidationError::new(
                "retrieval.rrf_k",
                format!("RRF constant must be positive, got {}", retrieval.rrf_k),
            ));
        }
    }

    fn validate_lexical(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.lexical.k1 < 0.0 {
            errors.push(ValidationError::new(
                "lexical.k1",
                format!("k1 must be non-negative, got {}", config.lexical.k1),
            ));
        }

        if !(0.0..=1.0).contains(&config.lexical.b) {
            errors.push(ValidationError::new(
                "lexical.b",
                format!("b must be between 0.0 and 1.0, got {}", config.lexical.b),
            ));
        }
    }

    fn validate_reranker(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.reranker.enabled && config.reranker.model.is_empty() {
            errors.push(ValidationError::new(
                "reranker.model",
                "Reranker model cannot be empty when the reranker is enabled",
            ));
        }
    }
}
