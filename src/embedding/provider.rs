//! Embedding provider trait and the fastembed-backed implementation
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("Failed to load embedding model: {0}")]
    ModelLoad(String),

    #[error("Embedding inference failed: {0}")]
    Inference(String),

    #[error("Cannot embed empty text (input {index})")]
    EmptyText { index: usize },

    #[error("Model returned {actual} vectors of dimension {dimension}, expected {expected}")]
    DimensionMismatch {
        expected: usize,
        actual: usize,
        dimension: usize,
    },
}

/// Text in, fixed-dimension vectors out
///
/// Vectors must be L2-normalized so that inner product equals cosine
/// similarity, and deterministic for a fixed model version.
pub trait EmbeddingProvider: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// One vector per input, in input order
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    fn dimension(&self) -> usize;

    /// Recorded in the index manifest to detect model changes
    fn model_name(&self) -> &str;
}

struct CatalogEntry {
    names: &'static [&'static str],
    model: EmbeddingModel,
    dimension: usize,
    download_mb: usize,
}

/// Sentence-embedding models known to produce unit vectors
const CATALOG: &[CatalogEntry] = &[
    CatalogEntry {
        names: &["all-MiniLM-L6-v2", "all-minilm-l6-v2"],
        model: EmbeddingModel::AllMiniLML6V2,
        dimension: 384,
        download_mb: 90,
    },
    CatalogEntry {
        names: &["bge-small-en-v1.5"],
        model: EmbeddingModel::BGESmallENV15,
        dimension: 384,
        download_mb: 130,
    },
    CatalogEntry {
        names: &["bge-base-en-v1.5"],
        model: EmbeddingModel::BGEBaseENV15,
        dimension: 768,
        download_mb: 440,
    },
];

fn lookup(model_name: &str) -> Option<&'static CatalogEntry> {
    CATALOG.iter().find(|entry| entry.names.contains(&model_name))
}

/// Whether `model_name` names a fastembed model this crate can load
pub fn is_supported_model(model_name: &str) -> bool {
    lookup(model_name).is_some()
}

/// Local ONNX sentence embeddings via fastembed
///
/// Models are downloaded to the huggingface cache on first use; after that
/// everything runs offline.
pub struct FastEmbedProvider {
    model: Arc<TextEmbedding>,
    model_name: String,
    dimension: usize,
}

impl FastEmbedProvider {
    pub fn new(model_name: &str) -> Result<Self, EmbeddingError> {
        let entry = lookup(model_name).ok_or_else(|| {
            let known: Vec<&str> = CATALOG.iter().map(|e| e.names[0]).collect();
            EmbeddingError::ModelLoad(format!(
                "Unsupported model: {}. Supported: {}, {}",
                model_name,
                known.join(", "),
                super::HASHING_MODEL
            ))
        })?;

        tracing::info!(
            "Loading embedding model {} ({}D, ~{}MB download if not cached)",
            model_name,
            entry.dimension,
            entry.download_mb
        );

        let options = InitOptions::new(entry.model.clone()).with_show_download_progress(true);
        let model =
            TextEmbedding::try_new(options).map_err(|e| EmbeddingError::ModelLoad(e.to_string()))?;

        Ok(Self {
            model: Arc::new(model),
            model_name: model_name.to_string(),
            dimension: entry.dimension,
        })
    }

    /// all-MiniLM-L6-v2
    pub fn with_default_model() -> Result<Self, EmbeddingError> {
        Self::new("all-MiniLM-L6-v2")
    }
}

impl EmbeddingProvider for FastEmbedProvider {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut vectors = self.embed_batch(&[text.to_string()])?;
        vectors
            .pop()
            .ok_or_else(|| EmbeddingError::Inference("Model returned no vector".to_string()))
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        // Empty inputs would leave vectors and chunks misaligned
        if let Some(index) = texts.iter().position(|t| t.trim().is_empty()) {
            return Err(EmbeddingError::EmptyText { index });
        }

        let vectors = self
            .model
            .embed(texts.to_vec(), None)
            .map_err(|e| EmbeddingError::Inference(e.to_string()))?;

        if let Some(bad) = vectors.iter().find(|v| v.len() != self.dimension) {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimension,
                actual: vectors.len(),
                dimension: bad.len(),
            });
        }
        if vectors.len() != texts.len() {
            return Err(EmbeddingError::Inference(format!(
                "Model returned {} vectors for {} inputs",
                vectors.len(),
                texts.len()
            )));
        }

        Ok(vectors)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::dot;

    #[test]
    fn test_catalog_lookup() {
        assert!(is_supported_model("all-MiniLM-L6-v2"));
        assert!(is_supported_model("all-minilm-l6-v2"));
        assert!(is_supported_model("bge-base-en-v1.5"));
        assert!(!is_supported_model("text-embedding-3-large"));
        assert_eq!(lookup("bge-base-en-v1.5").unwrap().dimension, 768);
    }

    #[test]
    fn test_unsupported_model_is_rejected() {
        let result = FastEmbedProvider::new("not-a-model");
        assert!(matches!(result, Err(EmbeddingError::ModelLoad(_))));
    }

    #[test]
    #[ignore] // Requires model download (~90MB) - run with: cargo test -- --ignored
    fn test_default_model_is_normalized() {
        let provider = FastEmbedProvider::with_default_model().unwrap();
        assert_eq!(provider.dimension(), 384);

        let embedding = provider.embed("This is a test sentence.").unwrap();
        assert_eq!(embedding.len(), 384);
        assert!((dot(&embedding, &embedding).sqrt() - 1.0).abs() < 0.01);
    }

    #[test]
    #[ignore] // Requires model download (~90MB) - run with: cargo test -- --ignored
    fn test_batch_rejects_empty_text() {
        let provider = FastEmbedProvider::with_default_model().unwrap();
        let texts = vec!["first".to_string(), "  ".to_string()];
        assert!(matches!(
            provider.embed_batch(&texts),
            Err(EmbeddingError::EmptyText { index: 1 })
        ));
    }

    #[test]
    #[ignore] // Requires model download (~90MB) - run with: cargo test -- --ignored
    fn test_batch_matches_single_embeddings() {
        let provider = FastEmbedProvider::with_default_model().unwrap();
        let texts = vec![
            "The cat sits on the mat.".to_string(),
            "Python programming language.".to_string(),
        ];

        let batch = provider.embed_batch(&texts).unwrap();
        assert_eq!(batch.len(), 2);
        let single = provider.embed(&texts[1]).unwrap();
        assert!(dot(&batch[1], &single) > 0.99);

        let related = provider.embed("A feline rests on the rug.").unwrap();
        assert!(dot(&batch[0], &related) > dot(&batch[0], &batch[1]));
    }
}
