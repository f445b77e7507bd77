//! Deterministic providers shared by the integration tests

#![allow(dead_code)]

use hybrag::config::Config;
use hybrag::embedding::{normalize, EmbeddingError, EmbeddingProvider};
use hybrag::index::tokenize;
use hybrag::retrieval::{RelevanceScorer, RerankError};
use std::path::Path;

/// Bag-of-words embedder over a fixed vocabulary; unknown words are ignored
pub struct VocabEmbedder {
    vocab: Vec<String>,
}

impl VocabEmbedder {
    pub fn new(words: &[&str]) -> Self {
        let mut vocab: Vec<String> = Vec::new();
        for word in words {
            let word = word.to_lowercase();
            if !vocab.contains(&word) {
                vocab.push(word);
            }
        }
        Self { vocab }
    }

    /// Vocabulary taken from every word of `texts`
    pub fn from_texts(texts: &[&str]) -> Self {
        let tokens: Vec<String> = texts.iter().flat_map(|t| tokenize(t)).collect();
        let words: Vec<&str> = tokens.iter().map(String::as_str).collect();
        Self::new(&words)
    }
}

impl EmbeddingProvider for VocabEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut vector = vec![0.0f32; self.vocab.len()];
        for token in tokenize(text) {
            if let Some(i) = self.vocab.iter().position(|w| *w == token) {
                vector[i] += 1.0;
            }
        }
        normalize(&mut vector);
        Ok(vector)
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    fn dimension(&self) -> usize {
        self.vocab.len()
    }

    fn model_name(&self) -> &str {
        "vocab"
    }
}

/// Fails any batch containing the word POISON
pub struct PoisonedEmbedder {
    pub inner: VocabEmbedder,
}

impl EmbeddingProvider for PoisonedEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if text.contains("POISON") {
            return Err(EmbeddingError::Inference("poisoned input".to_string()));
        }
        self.inner.embed(text)
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    fn model_name(&self) -> &str {
        "vocab"
    }
}

/// Scores by the number of query tokens present in the text
pub struct OverlapScorer;

impl RelevanceScorer for OverlapScorer {
    fn score(&self, query: &str, text: &str) -> Result<f32, RerankError> {
        let text_tokens = tokenize(text);
        Ok(tokenize(query)
            .iter()
            .filter(|t| text_tokens.contains(t))
            .count() as f32)
    }

    fn model_name(&self) -> &str {
        "overlap"
    }
}

/// Default configuration rooted in a temporary directory
pub fn test_config(root: &Path) -> Config {
    let mut config = Config::default();
    config.storage.index_dir = root.join("index");
    config.storage.docs_dir = root.join("docs");
    config.embedding.batch_size = 2;
    config
}
