/// BM25 lexical index over tokenized chunks
use crate::chunking::Chunk;
use crate::index::persist;
use ahash::{HashMap, HashMapExt};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LexicalIndexError {
    #[error("Index not found: {0}")]
    IndexNotFound(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Corrupt index file {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },
}

/// Search hit: position of the chunk in insertion order plus its BM25 score
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeywordSearchResult {
    pub position: usize,
    pub score: f32,
}

/// BM25 saturation and length-normalization parameters
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Bm25Params {
    /// Term-frequency saturation
    pub k1: f32,
    /// Length normalization strength (0 = none, 1 = full)
    pub b: f32,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: 1.5, b: 0.75 }
    }
}

fn word_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[\p{L}\p{M}\p{Nd}_]+").expect("static regex is valid"))
}

/// Lowercased runs of letters (with diacritics), digits and underscore.
/// Everything else separates tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    word_pattern()
        .find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .collect()
}

/// On-disk form: raw chunks plus their token sequences
#[derive(Serialize, Deserialize)]
struct LexicalSnapshot {
    chunks: Vec<Chunk>,
    corpus_tokens: Vec<Vec<String>>,
}

/// In-memory BM25 index
///
/// Corpus statistics (document frequencies, total length) are maintained
/// incrementally on every `add`, so a search right after an append already
/// sees the updated IDF values and average length.
#[derive(Debug, Clone)]
pub struct LexicalIndex {
    params: Bm25Params,
    chunks: Vec<Chunk>,
    corpus_tokens: Vec<Vec<String>>,
    term_freqs: Vec<HashMap<String, u32>>,
    doc_freqs: HashMap<String, u32>,
    total_len: usize,
}

impl LexicalIndex {
    pub fn new(params: Bm25Params) -> Self {
        Self {
            params,
            chunks: Vec::new(),
            corpus_tokens: Vec::new(),
            term_freqs: Vec::new(),
            doc_freqs: HashMap::new(),
            total_len: 0,
        }
    }

    /// Replace the whole corpus
    pub fn build(&mut self, chunks: Vec<Chunk>) {
        let params = self.params;
        *self = Self::new(params);
        self.add(chunks);
    }

    /// Append chunks and fold them into the corpus statistics
    pub fn add(&mut self, chunks: Vec<Chunk>) {
        for chunk in chunks {
            let tokens = tokenize(&chunk.text);
            self.push(chunk, tokens);
        }
    }

    fn push(&mut self, chunk: Chunk, tokens: Vec<String>) {
        let mut freqs: HashMap<String, u32> = HashMap::new();
        for token in &tokens {
            *freqs.entry(token.clone()).or_insert(0) += 1;
        }
        for term in freqs.keys() {
            *self.doc_freqs.entry(term.clone()).or_insert(0) += 1;
        }

        self.total_len += tokens.len();
        self.term_freqs.push(freqs);
        self.corpus_tokens.push(tokens);
        self.chunks.push(chunk);
    }

    fn idf(&self, term: &str) -> f32 {
        let n = self.chunks.len() as f32;
        let df = self.doc_freqs.get(term).copied().unwrap_or(0) as f32;
        ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
    }

    /// BM25 score of every chunk for `query`, in insertion order
    pub fn scores(&self, query: &str) -> Vec<f32> {
        let mut scores = vec![0.0f32; self.chunks.len()];
        if self.chunks.is_empty() {
            return scores;
        }

        let avg_len = self.total_len as f32 / self.chunks.len() as f32;
        let avg_len = if avg_len > 0.0 { avg_len } else { 1.0 };
        let Bm25Params { k1, b } = self.params;

        for term in tokenize(query) {
            if !self.doc_freqs.contains_key(&term) {
                continue;
            }
            let idf = self.idf(&term);

            for (position, freqs) in self.term_freqs.iter().enumerate() {
                let Some(&tf) = freqs.get(&term) else {
                    continue;
                };
                let tf = tf as f32;
                let doc_len = self.corpus_tokens[position].len() as f32;
                let norm = k1 * (1.0 - b + b * doc_len / avg_len);
                scores[position] += idf * (tf * (k1 + 1.0)) / (tf + norm);
            }
        }

        scores
    }

    /// Top-k chunks by descending BM25 score
    ///
    /// Every chunk is ranked, including ones that share no term with the
    /// query (score 0); ties keep insertion order.
    pub fn search(&self, query: &str, k: usize) -> Vec<KeywordSearchResult> {
        if k == 0 || self.chunks.is_empty() {
            return Vec::new();
        }

        let mut results: Vec<KeywordSearchResult> = self
            .scores(query)
            .into_iter()
            .enumerate()
            .map(|(position, score)| KeywordSearchResult { position, score })
            .collect();
        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(k);
        results
    }

    pub fn chunk(&self, position: usize) -> Option<&Chunk> {
        self.chunks.get(position)
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn params(&self) -> Bm25Params {
        self.params
    }

    /// Persist chunks and token sequences as JSON
    pub fn save(&self, path: &Path) -> Result<(), LexicalIndexError> {
        let snapshot = LexicalSnapshot {
            chunks: self.chunks.clone(),
            corpus_tokens: self.corpus_tokens.clone(),
        };
        let json = serde_json::to_vec(&snapshot)?;
        persist::write_atomic(path, &json)?;

        tracing::debug!("Lexical index saved: {} chunks to {}", self.len(), path.display());
        Ok(())
    }

    /// Load a saved corpus and recompute its statistics
    pub fn load(path: &Path, params: Bm25Params) -> Result<Self, LexicalIndexError> {
        if !path.exists() {
            return Err(LexicalIndexError::IndexNotFound(path.display().to_string()));
        }

        let data = fs::read(path)?;
        let snapshot: LexicalSnapshot = serde_json::from_slice(&data)?;
        if snapshot.chunks.len() != snapshot.corpus_tokens.len() {
            return Err(LexicalIndexError::Corrupt {
                path: path.to_path_buf(),
                reason: format!(
                    "{} chunks but {} token sequences",
                    snapshot.chunks.len(),
                    snapshot.corpus_tokens.len()
                ),
            });
        }

        let mut index = Self::new(params);
        for (chunk, tokens) in snapshot.chunks.into_iter().zip(snapshot.corpus_tokens) {
            index.push(chunk, tokens);
        }

        tracing::debug!("Lexical index loaded: {} chunks", index.len());
        Ok(index)
    }
}
