//! Pure dense similarity top-k

use crate::index::{DenseIndex, DenseIndexError};
use crate::retrieval::ScoredChunk;

pub(super) fn retrieve(
    dense: &DenseIndex,
    query_vector: &[f32],
    top_k: usize,
) -> Result<Vec<ScoredChunk>, DenseIndexError> {
    let hits = dense.search(query_vector, top_k)?;

    Ok(hits
        .into_iter()
        .filter_map(|hit| {
            dense
                .chunk(hit.position)
                .map(|chunk| ScoredChunk::dense(chunk.clone(), hit.score))
        })
        .collect())
}
