//! Maximal Marginal Relevance over a dense candidate pool

use crate::index::{DenseIndex, DenseIndexError};
use crate::retrieval::ScoredChunk;
use ndarray::{Array2, Axis};

/// Greedy MMR selection
///
/// `query_sims[i]` is the similarity of candidate `i` to the query and row `i`
/// of `candidates` its unit vector. The first pick is the most query-similar
/// candidate; each later pick maximizes
/// `lambda * sim(c, q) - (1 - lambda) * max(sim(c, s) for s in selected)`.
/// Picks are final and leave the remaining pool. Ties go to the candidate
/// earliest in pool order.
///
/// Returns pool indices in selection order.
pub fn mmr_select(query_sims: &[f32], candidates: &Array2<f32>, lambda: f32, k: usize) -> Vec<usize> {
    let mut selected: Vec<usize> = Vec::with_capacity(k.min(query_sims.len()));
    let mut remaining: Vec<usize> = (0..query_sims.len()).collect();
    // max similarity of each candidate to anything already selected
    let mut redundancy = vec![f32::NEG_INFINITY; query_sims.len()];

    while selected.len() < k && !remaining.is_empty() {
        let mut best_slot = 0;
        let mut best_score = f32::NEG_INFINITY;

        for (slot, &candidate) in remaining.iter().enumerate() {
            let score = if selected.is_empty() {
                query_sims[candidate]
            } else {
                lambda * query_sims[candidate] - (1.0 - lambda) * redundancy[candidate]
            };
            if slot == 0 || score > best_score {
                best_slot = slot;
                best_score = score;
            }
        }

        let pick = remaining.remove(best_slot);
        selected.push(pick);

        let pick_vector = candidates.row(pick);
        for &candidate in &remaining {
            let sim = candidates.row(candidate).dot(&pick_vector);
            if sim > redundancy[candidate] {
                redundancy[candidate] = sim;
            }
        }
    }

    selected
}

pub(super) fn retrieve(
    dense: &DenseIndex,
    query_vector: &[f32],
    top_k: usize,
    lambda: f32,
    pool_factor: usize,
) -> Result<Vec<ScoredChunk>, DenseIndexError> {
    let pool_size = top_k.saturating_mul(pool_factor).max(top_k);
    let pool = dense.search(query_vector, pool_size)?;
    if pool.is_empty() {
        return Ok(Vec::new());
    }

    // Stored vectors stand in for re-embedding the candidate texts
    let rows: Vec<_> = pool
        .iter()
        .filter_map(|hit| dense.vector(hit.position))
        .map(|v| v.insert_axis(Axis(0)))
        .collect();
    let candidates = ndarray::concatenate(Axis(0), &rows)
        .map_err(|e| DenseIndexError::SerializationError(e.to_string()))?;
    let query_sims: Vec<f32> = pool.iter().map(|hit| hit.score).collect();

    let picks = mmr_select(&query_sims, &candidates, lambda, top_k);

    Ok(picks
        .into_iter()
        .filter_map(|i| {
            let hit = pool[i];
            dense
                .chunk(hit.position)
                .map(|chunk| ScoredChunk::dense(chunk.clone(), hit.score))
        })
        .collect())
}
