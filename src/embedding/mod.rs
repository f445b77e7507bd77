//! Embedding providers
//!
//! The embedding model is an external capability: text in, fixed-dimension
//! unit-length vectors out. Two providers ship with the crate:
//! - FastEmbedProvider for local ONNX models (all-MiniLM-L6-v2, 384-dim, by default)
//! - HashingEmbedder, a deterministic offline bag-of-words fallback
mod hashing;
mod provider;

pub use hashing::HashingEmbedder;
pub use provider::{is_supported_model, EmbeddingError, EmbeddingProvider, FastEmbedProvider};

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Model name that selects the hashing embedder
pub const HASHING_MODEL: &str = "hashing";

/// Configuration for embedding generation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Model name (e.g., "all-MiniLM-L6-v2" or "hashing")
    pub model: String,
    /// Batch size for ingestion
    pub batch_size: usize,
    /// Vector dimension for the hashing embedder (fastembed models fix their own)
    pub dimension: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "all-MiniLM-L6-v2".to_string(),
            batch_size: 32,
            dimension: 384,
        }
    }
}

/// Build the provider named by the configuration
pub fn provider_from_config(
    config: &EmbeddingConfig,
) -> Result<Arc<dyn EmbeddingProvider>, EmbeddingError> {
    if config.model == HASHING_MODEL {
        return Ok(Arc::new(HashingEmbedder::new(config.dimension)?));
    }
    Ok(Arc::new(FastEmbedProvider::new(&config.model)?))
}

/// Inner product of two equal-length vectors
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Scale `v` to unit length in place; zero vectors are left as-is
pub fn normalize(v: &mut [f32]) {
    let norm = dot(v, v).sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}
