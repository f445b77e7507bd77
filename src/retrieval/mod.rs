//! Retrieval strategies over the dense + lexical index pair
//!
//! Five strategies share one contract: `retrieve(query, top_k)` returns up to
//! `top_k` scored chunks, best first, ties in first-seen order.
//! - Similarity: dense top-k
//! - MMR: greedy relevance/diversity trade-off over a dense candidate pool
//! - Hybrid: weighted fusion of max-normalized dense and BM25 scores
//! - RRF: reciprocal rank fusion of both channels
//! - Rerank: cross-encoder rescoring of any base strategy's candidates
//!
//! Strategies only read the snapshot they are given; they never mutate
//! indexed data.

mod deduplication;
mod fusion;
mod hybrid;
mod mmr;
mod provenance;
mod reranker;
mod similarity;

pub use deduplication::deduplicate_chunks;
pub use fusion::reciprocal_rank_fusion;
pub use hybrid::weighted_fusion;
pub use mmr::mmr_select;
pub use provenance::{fold_chat_history, Citation, ContextPack};
pub use reranker::{CrossEncoderReranker, RelevanceScorer, RerankError};

use crate::chunking::Chunk;
use crate::embedding::{EmbeddingError, EmbeddingProvider};
use crate::index::{DenseIndexError, IndexSnapshot};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Strategy used when a name is not recognized
pub const DEFAULT_STRATEGY: Strategy = Strategy::Mmr;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Embedding provider failed: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Relevance scorer failed: {0}")]
    Scoring(#[from] RerankError),

    #[error("Rerank strategy requested but no relevance scorer is configured")]
    ScorerUnavailable,

    #[error("Dense search failed: {0}")]
    DenseIndex(#[from] DenseIndexError),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

/// A chunk annotated with the channel scores of one retrieval call
///
/// `score` is the value the strategy ranked by; the per-channel fields are
/// filled in by whichever channels contributed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score_dense: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score_sparse: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score_fused: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score_rerank: Option<f32>,
}

impl ScoredChunk {
    pub fn dense(chunk: Chunk, score: f32) -> Self {
        Self {
            chunk,
            score,
            score_dense: Some(score),
            score_sparse: None,
            score_fused: None,
            score_rerank: None,
        }
    }

    pub fn sparse(chunk: Chunk, score: f32) -> Self {
        Self {
            chunk,
            score,
            score_dense: None,
            score_sparse: Some(score),
            score_fused: None,
            score_rerank: None,
        }
    }
}

/// Strategy parameters for one retrieval call
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetrievalParams {
    /// MMR relevance weight: 1.0 = pure similarity, 0.0 = pure diversity
    pub mmr_lambda: f32,
    /// Weighted hybrid dense weight; sparse gets `1 - alpha`
    pub hybrid_alpha: f32,
    /// MMR candidate pool = `top_k * mmr_pool_factor`
    pub mmr_pool_factor: usize,
    /// Rerank candidate pool = `top_k * rerank_pool_factor`
    pub rerank_pool_factor: usize,
    /// RRF smoothing constant
    pub rrf_k: f32,
    /// RRF per-channel candidates = `max(top_k * rrf_candidate_factor, rrf_min_candidates)`
    pub rrf_candidate_factor: usize,
    pub rrf_min_candidates: usize,
}

impl Default for RetrievalParams {
    fn default() -> Self {
        Self {
            mmr_lambda: 0.5,
            hybrid_alpha: 0.6,
            mmr_pool_factor: 3,
            rerank_pool_factor: 5,
            rrf_k: 60.0,
            rrf_candidate_factor: 5,
            rrf_min_candidates: 20,
        }
    }
}

impl RetrievalParams {
    pub fn validate(&self) -> Result<(), SearchError> {
        if !(0.0..=1.0).contains(&self.mmr_lambda) {
            return Err(SearchError::InvalidParameter(format!(
                "mmr_lambda must be in [0, 1], got {}",
                self.mmr_lambda
            )));
        }
        if !(0.0..=1.0).contains(&self.hybrid_alpha) {
            return Err(SearchError::InvalidParameter(format!(
                "hybrid_alpha must be in [0, 1], got {}",
                self.hybrid_alpha
            )));
        }
        if self.mmr_pool_factor == 0 || self.rerank_pool_factor == 0 || self.rrf_candidate_factor == 0 {
            return Err(SearchError::InvalidParameter(
                "pool factors must be at least 1".to_string(),
            ));
        }
        if self.rrf_k <= 0.0 || !self.rrf_k.is_finite() {
            return Err(SearchError::InvalidParameter(format!(
                "rrf_k must be a positive number, got {}",
                self.rrf_k
            )));
        }
        Ok(())
    }
}

/// Retrieval strategy kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Strategy {
    Similarity,
    Mmr,
    Hybrid,
    Rrf,
    /// Cross-encoder rescoring of the wrapped strategy's candidates
    Rerank(Box<Strategy>),
}

impl Strategy {
    /// Parse a strategy name
    ///
    /// Accepts `similarity`, `mmr`, `hybrid`, `rrf`, `rerank` (over hybrid)
    /// and `rerank:<base>`. Rerank cannot wrap another rerank.
    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim().to_ascii_lowercase();
        if let Some(base) = name.strip_prefix("rerank:") {
            return match Self::parse_base(base)? {
                Strategy::Rerank(_) => None,
                base => Some(Strategy::Rerank(Box::new(base))),
            };
        }
        Self::parse_base(&name)
    }

    fn parse_base(name: &str) -> Option<Self> {
        match name {
            "similarity" => Some(Strategy::Similarity),
            "mmr" => Some(Strategy::Mmr),
            "hybrid" => Some(Strategy::Hybrid),
            "rrf" => Some(Strategy::Rrf),
            "rerank" => Some(Strategy::Rerank(Box::new(Strategy::Hybrid))),
            _ => None,
        }
    }

    /// Parse a strategy name, falling back to MMR for unknown names
    pub fn from_name_or_default(name: &str) -> Self {
        Self::parse(name).unwrap_or_else(|| {
            tracing::warn!(
                "Unknown retrieval strategy '{}', falling back to {}",
                name,
                DEFAULT_STRATEGY
            );
            DEFAULT_STRATEGY
        })
    }

    /// Build the rerank strategy over the named base
    pub fn rerank_over(base: &str) -> Self {
        match Self::parse(base) {
            Some(Strategy::Rerank(inner)) => Strategy::Rerank(inner),
            Some(inner) => Strategy::Rerank(Box::new(inner)),
            None => Strategy::Rerank(Box::new(Strategy::Hybrid)),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Similarity => write!(f, "similarity"),
            Strategy::Mmr => write!(f, "mmr"),
            Strategy::Hybrid => write!(f, "hybrid"),
            Strategy::Rrf => write!(f, "rrf"),
            Strategy::Rerank(base) => write!(f, "rerank:{}", base),
        }
    }
}

/// Immutable per-query context
#[derive(Debug, Clone)]
pub struct QueryContext {
    pub text: String,
    pub top_k: usize,
    pub strategy: Strategy,
    pub params: RetrievalParams,
}

impl QueryContext {
    pub fn new(text: impl Into<String>, top_k: usize, strategy: Strategy) -> Self {
        Self {
            text: text.into(),
            top_k,
            strategy,
            params: RetrievalParams::default(),
        }
    }

    pub fn with_params(mut self, params: RetrievalParams) -> Self {
        self.params = params;
        self
    }
}

/// Read-only view used to run strategies against one index snapshot
pub struct Retriever<'a> {
    snapshot: &'a IndexSnapshot,
    embedder: &'a dyn EmbeddingProvider,
    scorer: Option<&'a dyn RelevanceScorer>,
}

impl<'a> Retriever<'a> {
    pub fn new(
        snapshot: &'a IndexSnapshot,
        embedder: &'a dyn EmbeddingProvider,
        scorer: Option<&'a dyn RelevanceScorer>,
    ) -> Self {
        Self {
            snapshot,
            embedder,
            scorer,
        }
    }

    /// Run the strategy named in `ctx`
    pub fn retrieve(&self, ctx: &QueryContext) -> Result<Vec<ScoredChunk>, SearchError> {
        ctx.params.validate()?;
        self.run(&ctx.strategy, &ctx.text, ctx.top_k, &ctx.params)
    }

    fn run(
        &self,
        strategy: &Strategy,
        query: &str,
        top_k: usize,
        params: &RetrievalParams,
    ) -> Result<Vec<ScoredChunk>, SearchError> {
        if top_k == 0 || self.snapshot.is_empty() {
            return Ok(Vec::new());
        }

        let results = match strategy {
            Strategy::Similarity => {
                similarity::retrieve(&self.snapshot.dense, &self.embed_query(query)?, top_k)?
            }
            Strategy::Mmr => mmr::retrieve(
                &self.snapshot.dense,
                &self.embed_query(query)?,
                top_k,
                params.mmr_lambda,
                params.mmr_pool_factor,
            )?,
            Strategy::Hybrid => hybrid::retrieve(
                self.snapshot,
                &self.embed_query(query)?,
                query,
                top_k,
                params.hybrid_alpha,
            )?,
            Strategy::Rrf => fusion::retrieve(
                self.snapshot,
                &self.embed_query(query)?,
                query,
                top_k,
                params,
            )?,
            Strategy::Rerank(base) => {
                let scorer = self.scorer.ok_or(SearchError::ScorerUnavailable)?;
                let pool = top_k.saturating_mul(params.rerank_pool_factor).max(top_k);
                let candidates = self.run(base, query, pool, params)?;
                reranker::rerank(scorer, query, candidates, top_k)?
            }
        };

        tracing::debug!(
            "{} retrieval returned {} of {} requested",
            strategy,
            results.len(),
            top_k
        );
        Ok(results)
    }

    fn embed_query(&self, query: &str) -> Result<Vec<f32>, SearchError> {
        Ok(self.embedder.embed(query)?)
    }
}

/// Sort descending by `score`, keeping first-seen order on ties
pub(crate) fn sort_by_score(results: &mut [ScoredChunk]) {
    results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
}
