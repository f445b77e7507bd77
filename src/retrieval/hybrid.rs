//! Weighted score fusion of dense and lexical results

use crate::chunking::ChunkKey;
use crate::index::{DenseIndexError, IndexSnapshot};
use crate::retrieval::{sort_by_score, ScoredChunk};
use ahash::{HashMap, HashMapExt};

/// Fuse two channel result lists by weighted normalized score
///
/// Candidates are unioned by `(source, id)` in first-seen order (dense list
/// first). A channel a candidate is missing from scores 0.0 there. Each
/// channel is divided by its maximum over the unioned pool, with a zero
/// maximum treated as 1.0, so normalization depends on the pool and not on
/// the corpus. Fused score = `alpha * dense + (1 - alpha) * sparse`.
pub fn weighted_fusion(
    dense: Vec<ScoredChunk>,
    sparse: Vec<ScoredChunk>,
    alpha: f32,
    top_k: usize,
) -> Vec<ScoredChunk> {
    let mut pool: Vec<ScoredChunk> = Vec::with_capacity(dense.len() + sparse.len());
    let mut slots: HashMap<ChunkKey, usize> = HashMap::new();

    for candidate in dense.into_iter().chain(sparse) {
        let key = candidate.chunk.key();
        match slots.get(&key) {
            Some(&slot) => {
                let entry = &mut pool[slot];
                entry.score_dense = entry.score_dense.or(candidate.score_dense);
                entry.score_sparse = entry.score_sparse.or(candidate.score_sparse);
            }
            None => {
                slots.insert(key, pool.len());
                pool.push(candidate);
            }
        }
    }

    let channel_max = |score: fn(&ScoredChunk) -> f32| {
        let max = pool.iter().map(score).fold(f32::NEG_INFINITY, f32::max);
        if max == 0.0 || !max.is_finite() {
            1.0
        } else {
            max
        }
    };
    let dense_of = |c: &ScoredChunk| c.score_dense.unwrap_or(0.0);
    let sparse_of = |c: &ScoredChunk| c.score_sparse.unwrap_or(0.0);
    let dense_max = channel_max(dense_of);
    let sparse_max = channel_max(sparse_of);

    for candidate in &mut pool {
        let fused = alpha * (dense_of(candidate) / dense_max)
            + (1.0 - alpha) * (sparse_of(candidate) / sparse_max);
        candidate.score_fused = Some(fused);
        candidate.score = fused;
    }

    sort_by_score(&mut pool);
    pool.truncate(top_k);
    pool
}

pub(super) fn retrieve(
    snapshot: &IndexSnapshot,
    query_vector: &[f32],
    query: &str,
    top_k: usize,
    alpha: f32,
) -> Result<Vec<ScoredChunk>, DenseIndexError> {
    let dense = super::similarity::retrieve(&snapshot.dense, query_vector, top_k)?;
    let sparse = snapshot
        .lexical
        .search(query, top_k)
        .into_iter()
        .filter_map(|hit| {
            snapshot
                .lexical
                .chunk(hit.position)
                .map(|chunk| ScoredChunk::sparse(chunk.clone(), hit.score))
        })
        .collect();

    Ok(weighted_fusion(dense, sparse, alpha, top_k))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::Chunk;

    fn chunk(id: &str) -> Chunk {
        Chunk {
            id: id.to_string(),
            text: format!("text of {}", id),
            source: "doc".to_string(),
            title: "doc".to_string(),
        }
    }

    fn ids(results: &[ScoredChunk]) -> Vec<&str> {
        results.iter().map(|r| r.chunk.id.as_str()).collect()
    }

    #[test]
    fn test_union_and_normalization() {
        let dense = vec![
            ScoredChunk::dense(chunk("a"), 0.8),
            ScoredChunk::dense(chunk("b"), 0.4),
        ];
        let sparse = vec![
            ScoredChunk::sparse(chunk("b"), 6.0),
            ScoredChunk::sparse(chunk("c"), 3.0),
        ];

        let fused = weighted_fusion(dense, sparse, 0.5, 10);
        assert_eq!(fused.len(), 3);

        // a: 0.5*1.0 + 0   = 0.5
        // b: 0.5*0.5 + 0.5 = 0.75
        // c: 0 + 0.5*0.5   = 0.25
        assert_eq!(ids(&fused), vec!["b", "a", "c"]);
        assert!((fused[0].score - 0.75).abs() < 1e-6);
        assert_eq!(fused[0].score_dense, Some(0.4));
        assert_eq!(fused[0].score_sparse, Some(6.0));
        assert_eq!(fused[2].score_dense, None);
    }

    #[test]
    fn test_alpha_extremes() {
        let dense = || {
            vec![
                ScoredChunk::dense(chunk("a"), 0.9),
                ScoredChunk::dense(chunk("b"), 0.5),
            ]
        };
        let sparse = || {
            vec![
                ScoredChunk::sparse(chunk("b"), 2.0),
                ScoredChunk::sparse(chunk("a"), 1.0),
            ]
        };

        assert_eq!(ids(&weighted_fusion(dense(), sparse(), 1.0, 2)), vec!["a", "b"]);
        assert_eq!(ids(&weighted_fusion(dense(), sparse(), 0.0, 2)), vec!["b", "a"]);
    }

    #[test]
    fn test_zero_channel_max_does_not_divide_by_zero() {
        let dense = vec![ScoredChunk::dense(chunk("a"), 0.7)];
        let sparse = vec![
            ScoredChunk::sparse(chunk("a"), 0.0),
            ScoredChunk::sparse(chunk("b"), 0.0),
        ];

        let fused = weighted_fusion(dense, sparse, 0.6, 5);
        assert!(fused.iter().all(|c| c.score.is_finite()));
        assert_eq!(ids(&fused), vec!["a", "b"]);
    }

    #[test]
    fn test_truncates_to_top_k() {
        let dense = vec![
            ScoredChunk::dense(chunk("a"), 0.9),
            ScoredChunk::dense(chunk("b"), 0.8),
        ];
        let sparse = vec![ScoredChunk::sparse(chunk("c"), 1.0)];
        assert_eq!(weighted_fusion(dense, sparse, 0.6, 1).len(), 1);
    }
}
