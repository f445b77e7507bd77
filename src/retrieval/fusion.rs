//! Reciprocal Rank Fusion algorithm for combining search results

use crate::chunking::ChunkKey;
use crate::index::{DenseIndexError, IndexSnapshot};
use crate::retrieval::{RetrievalParams, ScoredChunk};
use ahash::{HashMap, HashMapExt};
use std::hash::Hash;

/// Apply Reciprocal Rank Fusion to any number of ranked lists
///
/// RRF formula: score(id) = sum over the rankings containing id of 1 / (k + rank),
/// with 1-based ranks. Ids absent from a ranking get nothing from it.
///
/// # Arguments
/// * `rankings` - ranked id lists, best first
/// * `rrf_k` - smoothing constant (typically 60)
///
/// # Returns
/// Fused (id, score) pairs sorted by score descending; equal scores keep
/// the order in which ids were first seen
pub fn reciprocal_rank_fusion<K>(rankings: &[Vec<K>], rrf_k: f32) -> Vec<(K, f32)>
where
    K: Hash + Eq + Clone,
{
    let mut fused: Vec<(K, f32)> = Vec::new();
    let mut slots: HashMap<K, usize> = HashMap::new();

    for ranking in rankings {
        for (rank, id) in ranking.iter().enumerate() {
            let contribution = 1.0 / (rrf_k + (rank + 1) as f32);
            match slots.get(id) {
                Some(&slot) => fused[slot].1 += contribution,
                None => {
                    slots.insert(id.clone(), fused.len());
                    fused.push((id.clone(), contribution));
                }
            }
        }
    }

    fused.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    fused
}

pub(super) fn retrieve(
    snapshot: &IndexSnapshot,
    query_vector: &[f32],
    query: &str,
    top_k: usize,
    params: &RetrievalParams,
) -> Result<Vec<ScoredChunk>, DenseIndexError> {
    let candidates = top_k
        .saturating_mul(params.rrf_candidate_factor)
        .max(params.rrf_min_candidates);

    let dense = super::similarity::retrieve(&snapshot.dense, query_vector, candidates)?;
    let sparse: Vec<ScoredChunk> = snapshot
        .lexical
        .search(query, candidates)
        .into_iter()
        .filter_map(|hit| {
            snapshot
                .lexical
                .chunk(hit.position)
                .map(|chunk| ScoredChunk::sparse(chunk.clone(), hit.score))
        })
        .collect();

    let rankings: Vec<Vec<ChunkKey>> = vec![
        dense.iter().map(|c| c.chunk.key()).collect(),
        sparse.iter().map(|c| c.chunk.key()).collect(),
    ];
    let fused = reciprocal_rank_fusion(&rankings, params.rrf_k);

    // Channel annotations for the fused output
    let mut by_key: HashMap<ChunkKey, ScoredChunk> = HashMap::new();
    for candidate in dense.into_iter().chain(sparse) {
        let key = candidate.chunk.key();
        match by_key.get_mut(&key) {
            Some(entry) => {
                entry.score_dense = entry.score_dense.or(candidate.score_dense);
                entry.score_sparse = entry.score_sparse.or(candidate.score_sparse);
            }
            None => {
                by_key.insert(key, candidate);
            }
        }
    }

    let results: Vec<ScoredChunk> = fused
        .into_iter()
        .take(top_k)
        .filter_map(|(key, score)| {
            by_key.remove(&key).map(|mut candidate| {
                candidate.score = score;
                candidate.score_fused = Some(score);
                candidate
            })
        })
        .collect();

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rrf_basic() {
        let semantic = vec![1, 2, 3];
        let keyword = vec![2, 1, 4];

        let fused = reciprocal_rank_fusion(&[semantic, keyword], 60.0);
        assert_eq!(fused.len(), 4);

        // 1 and 2 appear in both lists and tie; 1 was seen first
        assert_eq!(fused[0].0, 1);
        assert_eq!(fused[1].0, 2);
        assert!((fused[0].1 - (1.0 / 61.0 + 1.0 / 62.0)).abs() < 1e-6);
    }

    #[test]
    fn test_rank_one_in_both_beats_rank_one_in_one() {
        let dense = vec!["both", "dense_only"];
        let sparse = vec!["both", "sparse_only"];
        let fused = reciprocal_rank_fusion(&[dense, sparse], 60.0);

        assert_eq!(fused[0].0, "both");
        let single_channel_best = 1.0 / 61.0;
        assert!(fused[0].1 > single_channel_best);
    }

    #[test]
    fn test_absent_channel_contributes_nothing() {
        let fused = reciprocal_rank_fusion(&[vec!["a"], vec![]], 60.0);
        assert_eq!(fused, vec![("a", 1.0 / 61.0)]);
    }

    #[test]
    fn test_small_k_sharpens_rank_differences() {
        let sharp = reciprocal_rank_fusion(&[vec!["a", "b"]], 1.0);
        let flat = reciprocal_rank_fusion(&[vec!["a", "b"]], 60.0);
        assert!(sharp[0].1 / sharp[1].1 > flat[0].1 / flat[1].1);
    }
}
