//! Cross-encoder reranking using FastEmbed

use crate::retrieval::{sort_by_score, ScoredChunk};
use fastembed::{RerankInitOptions, RerankerModel, TextRerank};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RerankError {
    #[error("Reranker initialization failed: {0}")]
    InitializationError(String),

    #[error("Reranking failed: {0}")]
    RerankingError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Pairwise (query, text) relevance model
///
/// Higher is more relevant. Scores are only comparable within one call.
pub trait RelevanceScorer: Send + Sync {
    fn score(&self, query: &str, text: &str) -> Result<f32, RerankError>;

    /// Score many texts against one query; one score per text, in input order
    fn score_batch(&self, query: &str, texts: &[&str]) -> Result<Vec<f32>, RerankError> {
        texts.iter().map(|text| self.score(query, text)).collect()
    }

    fn model_name(&self) -> &str;
}

/// Cross-encoder reranker for improving result precision
pub struct CrossEncoderReranker {
    model: Arc<TextRerank>,
    model_name: String,
}

impl CrossEncoderReranker {
    /// Create a new reranker with specified model
    ///
    /// # Arguments
    /// * `model_name` - "bge-reranker-base" or "jina-reranker-v1-turbo-en"
    pub fn new(model_name: &str) -> Result<Self, RerankError> {
        let model = match model_name {
            "bge-reranker-base" | "BAAI/bge-reranker-base" => RerankerModel::BGERerankerBase,
            "jina-reranker-v1-turbo-en" | "jinaai/jina-reranker-v1-turbo-en" => {
                RerankerModel::JINARerankerV1TurboEn
            }
            _ => {
                return Err(RerankError::InitializationError(format!(
                    "Unsupported reranker model: {}. Supported: bge-reranker-base, jina-reranker-v1-turbo-en",
                    model_name
                )))
            }
        };

        tracing::info!("Initializing reranker model: {}", model_name);

        let init_options = RerankInitOptions::new(model).with_show_download_progress(true);

        let model = TextRerank::try_new(init_options)
            .map_err(|e| RerankError::InitializationError(e.to_string()))?;

        Ok(Self {
            model: Arc::new(model),
            model_name: model_name.to_string(),
        })
    }

    /// Create reranker with default model
    pub fn with_default_model() -> Result<Self, RerankError> {
        Self::new("bge-reranker-base")
    }
}

impl RelevanceScorer for CrossEncoderReranker {
    fn score(&self, query: &str, text: &str) -> Result<f32, RerankError> {
        let scores = self.score_batch(query, &[text])?;
        scores
            .first()
            .copied()
            .ok_or_else(|| RerankError::RerankingError("No score returned".to_string()))
    }

    fn score_batch(&self, query: &str, texts: &[&str]) -> Result<Vec<f32>, RerankError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        if query.is_empty() {
            return Err(RerankError::InvalidInput(
                "Query cannot be empty".to_string(),
            ));
        }

        // FastEmbed returns results sorted by score; map them back to input order
        let results = self
            .model
            .rerank(query, texts.to_vec(), false, None)
            .map_err(|e| RerankError::RerankingError(e.to_string()))?;

        let mut scores: Vec<Option<f32>> = vec![None; texts.len()];
        for result in results {
            if let Some(slot) = scores.get_mut(result.index) {
                *slot = Some(result.score);
            }
        }

        scores
            .into_iter()
            .enumerate()
            .map(|(i, score)| {
                score.ok_or_else(|| {
                    RerankError::RerankingError(format!("No score returned for candidate {}", i))
                })
            })
            .collect()
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

/// Rescore `candidates` with `scorer`, sort by the new score, keep `top_k`
pub(super) fn rerank(
    scorer: &dyn RelevanceScorer,
    query: &str,
    mut candidates: Vec<ScoredChunk>,
    top_k: usize,
) -> Result<Vec<ScoredChunk>, RerankError> {
    if candidates.is_empty() {
        return Ok(candidates);
    }

    let texts: Vec<&str> = candidates.iter().map(|c| c.chunk.text.as_str()).collect();
    let scores = scorer.score_batch(query, &texts)?;
    if scores.len() != candidates.len() {
        return Err(RerankError::RerankingError(format!(
            "{} scores for {} candidates",
            scores.len(),
            candidates.len()
        )));
    }

    for (candidate, score) in candidates.iter_mut().zip(scores) {
        candidate.score_rerank = Some(score);
        candidate.score = score;
    }

    sort_by_score(&mut candidates);
    candidates.truncate(top_k);
    Ok(candidates)
}
