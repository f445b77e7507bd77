//! Paragraph-aware chunking with carried overlap
//!
//! Documents are split on blank lines and paragraphs are packed greedily into
//! chunks of roughly `chunk_size` characters. When a chunk is flushed, the tail
//! of its text (`overlap` characters) is carried into the next chunk so that a
//! passage cut at a boundary stays retrievable from either side.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// The atomic indexed unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// `{title}_{sequence}`, unique per (source, title)
    pub id: String,

    /// Chunk content (never empty)
    pub text: String,

    /// Originating document (path or logical id)
    pub source: String,

    /// Human-readable document title
    pub title: String,
}

impl Chunk {
    /// Key used to union candidates across the dense and lexical channels
    pub fn key(&self) -> ChunkKey {
        ChunkKey {
            source: self.source.clone(),
            id: self.id.clone(),
        }
    }
}

/// `(source, id)` identity of a chunk
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkKey {
    pub source: String,
    pub id: String,
}

impl std::fmt::Display for ChunkKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.source, self.id)
    }
}

/// Chunking parameters
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Target chunk size in characters (advisory, not a hard cap)
    pub chunk_size: usize,
    /// Characters carried from the previous chunk
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 800,
            overlap: 120,
        }
    }
}

const PARAGRAPH_SEP: &str = "\n\n";
const SEP_LEN: usize = PARAGRAPH_SEP.len();

fn blank_line_runs() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n{3,}").expect("static regex is valid"))
}

/// Split `text` into overlapping chunks
pub fn chunk_text(text: &str, source: &str, title: &str, config: ChunkingConfig) -> Vec<Chunk> {
    let normalized = blank_line_runs().replace_all(text, PARAGRAPH_SEP);
    let normalized = normalized.trim();

    let mut pieces: Vec<String> = Vec::new();
    let mut buf: Vec<String> = Vec::new();
    // Length of `buf.join(PARAGRAPH_SEP)` in chars
    let mut cur_len = 0usize;

    for para in normalized.split(PARAGRAPH_SEP) {
        let para = para.trim();
        if para.is_empty() {
            continue;
        }
        let para_len = para.chars().count();

        let joined_len = if buf.is_empty() {
            para_len
        } else {
            cur_len + SEP_LEN + para_len
        };
        if joined_len <= config.chunk_size {
            buf.push(para.to_string());
            cur_len = joined_len;
            continue;
        }

        if !buf.is_empty() {
            pieces.push(buf.join(PARAGRAPH_SEP));
        }

        // Carry comes from the most recently emitted piece and is shortened
        // so that carry + separator + paragraph stays within chunk_size + overlap
        let carry_budget = config
            .chunk_size
            .saturating_add(config.overlap)
            .saturating_sub(para_len + SEP_LEN);
        let carry = pieces
            .last()
            .map(|last| tail_chars(last, config.overlap.min(carry_budget)))
            .unwrap_or_default();

        if carry.is_empty() {
            buf = vec![para.to_string()];
            cur_len = para_len;
        } else {
            cur_len = carry.chars().count() + SEP_LEN + para_len;
            buf = vec![carry, para.to_string()];
        }
    }

    if !buf.is_empty() {
        pieces.push(buf.join(PARAGRAPH_SEP));
    }

    pieces
        .into_iter()
        .enumerate()
        .map(|(i, text)| Chunk {
            id: format!("{}_{}", title, i),
            text,
            source: source.to_string(),
            title: title.to_string(),
        })
        .collect()
}

/// Last `n` characters of `s`, on a char boundary
fn tail_chars(s: &str, n: usize) -> String {
    if n == 0 {
        return String::new();
    }
    let total = s.chars().count();
    s.chars().skip(total.saturating_sub(n)).collect()
}
