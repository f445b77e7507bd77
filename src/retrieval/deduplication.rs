//! Result deduplication by chunk identity

use crate::chunking::ChunkKey;
use crate::retrieval::ScoredChunk;
use std::collections::HashSet;

/// Deduplicate chunks by `(source, id)`, keeping the first occurrence
///
/// # Arguments
/// * `chunks` - Scored chunks potentially with duplicates
///
/// # Returns
/// Deduplicated chunks, maintaining rank order
pub fn deduplicate_chunks(chunks: Vec<ScoredChunk>) -> Vec<ScoredChunk> {
    let mut seen: HashSet<ChunkKey> = HashSet::new();

    chunks
        .into_iter()
        .filter(|chunk| seen.insert(chunk.chunk.key()))
        .collect()
}
