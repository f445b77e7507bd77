/// Exact dense vector index (inner product over unit vectors)
use crate::chunking::Chunk;
use crate::index::persist;
use ndarray::{concatenate, Array2, ArrayView1, Axis};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

const BLOB_MAGIC: &[u8; 4] = b"HBVX";
const BLOB_VERSION: u8 = 1;
const HEADER_LEN: usize = BLOB_MAGIC.len() + 1 + blake3::OUT_LEN;

#[derive(Error, Debug)]
pub enum DenseIndexError {
    #[error("Shape mismatch: {vectors} vectors for {chunks} chunks")]
    ShapeMismatch { vectors: usize, chunks: usize },

    #[error("Invalid dimension: expected {expected}, got {actual}")]
    InvalidDimension { expected: usize, actual: usize },

    #[error("Index not found: {0}")]
    IndexNotFound(String),

    #[error("Found {present} without its counterpart {missing}")]
    MissingCounterpart { present: PathBuf, missing: PathBuf },

    #[error("Corrupt index file {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Search hit: position of the chunk in insertion order plus its score
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchResult {
    /// Insertion position (stable across save/load)
    pub position: usize,
    /// Inner product with the query (cosine similarity for unit vectors)
    pub score: f32,
}

/// Dense vector index
///
/// Stores one row per chunk in a contiguous matrix and answers top-k queries
/// by exhaustive inner product. Ties keep insertion order.
#[derive(Debug, Clone)]
pub struct DenseIndex {
    dimension: usize,
    vectors: Array2<f32>,
    chunks: Vec<Chunk>,
}

impl DenseIndex {
    /// Create an empty index for vectors of `dimension`
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            vectors: Array2::zeros((0, dimension)),
            chunks: Vec::new(),
        }
    }

    /// Replace the whole index content. Nothing changes on error.
    pub fn reset(&mut self, vectors: Vec<Vec<f32>>, chunks: Vec<Chunk>) -> Result<(), DenseIndexError> {
        let matrix = self.to_matrix(vectors, chunks.len())?;
        self.vectors = matrix;
        self.chunks = chunks;
        Ok(())
    }

    /// Append vectors and chunks. Nothing changes on error.
    pub fn add(&mut self, vectors: Vec<Vec<f32>>, chunks: Vec<Chunk>) -> Result<(), DenseIndexError> {
        let matrix = self.to_matrix(vectors, chunks.len())?;
        let merged = concatenate(Axis(0), &[self.vectors.view(), matrix.view()])
            .map_err(|e| DenseIndexError::SerializationError(e.to_string()))?;
        self.vectors = merged;
        self.chunks.extend(chunks);
        Ok(())
    }

    fn to_matrix(&self, vectors: Vec<Vec<f32>>, chunk_count: usize) -> Result<Array2<f32>, DenseIndexError> {
        if vectors.len() != chunk_count {
            return Err(DenseIndexError::ShapeMismatch {
                vectors: vectors.len(),
                chunks: chunk_count,
            });
        }

        let rows = vectors.len();
        let mut flat = Vec::with_capacity(rows * self.dimension);
        for vector in vectors {
            if vector.len() != self.dimension {
                return Err(DenseIndexError::InvalidDimension {
                    expected: self.dimension,
                    actual: vector.len(),
                });
            }
            flat.extend(vector);
        }

        Array2::from_shape_vec((rows, self.dimension), flat)
            .map_err(|e| DenseIndexError::SerializationError(e.to_string()))
    }

    /// Top-k chunks by descending inner product with `query`
    ///
    /// Returns every entry when the index holds fewer than `k`, and nothing
    /// (without error) when it is empty.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>, DenseIndexError> {
        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }
        if query.len() != self.dimension {
            return Err(DenseIndexError::InvalidDimension {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        let scores = self.vectors.dot(&ArrayView1::from(query));

        let mut results: Vec<SearchResult> = scores
            .iter()
            .enumerate()
            .map(|(position, score)| SearchResult {
                position,
                score: *score,
            })
            .collect();
        // Stable sort: equal scores keep insertion order
        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(k);

        Ok(results)
    }

    /// Chunk stored at `position`
    pub fn chunk(&self, position: usize) -> Option<&Chunk> {
        self.chunks.get(position)
    }

    /// Stored vector at `position`
    pub fn vector(&self, position: usize) -> Option<ArrayView1<'_, f32>> {
        (position < self.len()).then(|| self.vectors.row(position))
    }

    /// All chunks in insertion order
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Persist the vector blob and the chunk ledger
    pub fn save(&self, blob_path: &Path, ledger_path: &Path) -> Result<(), DenseIndexError> {
        let mut payload = Vec::with_capacity(12 + self.vectors.len() * 4);
        payload.extend_from_slice(&(self.dimension as u32).to_le_bytes());
        payload.extend_from_slice(&(self.len() as u64).to_le_bytes());
        for value in self.vectors.iter() {
            payload.extend_from_slice(&value.to_le_bytes());
        }

        let checksum = blake3::hash(&payload);
        let compressed = persist::compress(&payload)?;

        let mut blob = Vec::with_capacity(HEADER_LEN + compressed.len());
        blob.extend_from_slice(BLOB_MAGIC);
        blob.push(BLOB_VERSION);
        blob.extend_from_slice(checksum.as_bytes());
        blob.extend_from_slice(&compressed);

        let mut ledger = String::new();
        for chunk in &self.chunks {
            let line = serde_json::to_string(chunk)
                .map_err(|e| DenseIndexError::SerializationError(e.to_string()))?;
            ledger.push_str(&line);
            ledger.push('\n');
        }

        persist::write_atomic(blob_path, &blob)?;
        persist::write_atomic(ledger_path, ledger.as_bytes())?;

        tracing::debug!(
            "Dense index saved: {} vectors ({}D) to {}",
            self.len(),
            self.dimension,
            blob_path.display()
        );
        Ok(())
    }

    /// Load an index saved with [`DenseIndex::save`]
    pub fn load(blob_path: &Path, ledger_path: &Path) -> Result<Self, DenseIndexError> {
        match (blob_path.exists(), ledger_path.exists()) {
            (true, true) => {}
            (false, false) => {
                return Err(DenseIndexError::IndexNotFound(
                    blob_path.display().to_string(),
                ))
            }
            (true, false) => {
                return Err(DenseIndexError::MissingCounterpart {
                    present: blob_path.to_path_buf(),
                    missing: ledger_path.to_path_buf(),
                })
            }
            (false, true) => {
                return Err(DenseIndexError::MissingCounterpart {
                    present: ledger_path.to_path_buf(),
                    missing: blob_path.to_path_buf(),
                })
            }
        }

        let corrupt = |reason: &str| DenseIndexError::Corrupt {
            path: blob_path.to_path_buf(),
            reason: reason.to_string(),
        };

        let blob = fs::read(blob_path)?;
        if blob.len() < HEADER_LEN || &blob[..4] != BLOB_MAGIC {
            return Err(corrupt("bad magic"));
        }
        if blob[4] != BLOB_VERSION {
            return Err(corrupt(&format!("unsupported version {}", blob[4])));
        }
        let expected_checksum = &blob[5..HEADER_LEN];
        let payload = persist::decompress(&blob[HEADER_LEN..]).map_err(|e| corrupt(&e.to_string()))?;
        if blake3::hash(&payload).as_bytes() != expected_checksum {
            return Err(corrupt("checksum mismatch"));
        }
        if payload.len() < 12 {
            return Err(corrupt("truncated header"));
        }

        let mut dim_bytes = [0u8; 4];
        dim_bytes.copy_from_slice(&payload[..4]);
        let dimension = u32::from_le_bytes(dim_bytes) as usize;
        let mut count_bytes = [0u8; 8];
        count_bytes.copy_from_slice(&payload[4..12]);
        let count = u64::from_le_bytes(count_bytes) as usize;

        let data = &payload[12..];
        if data.len() != count * dimension * 4 {
            return Err(corrupt("vector data length does not match header"));
        }
        let flat: Vec<f32> = data
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        let vectors = Array2::from_shape_vec((count, dimension), flat)
            .map_err(|e| corrupt(&e.to_string()))?;

        let ledger = fs::read_to_string(ledger_path)?;
        let chunks = ledger
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| serde_json::from_str::<Chunk>(l))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| DenseIndexError::SerializationError(e.to_string()))?;

        if chunks.len() != count {
            return Err(DenseIndexError::Corrupt {
                path: ledger_path.to_path_buf(),
                reason: format!("ledger has {} records for {} vectors", chunks.len(), count),
            });
        }

        tracing::debug!("Dense index loaded: {} vectors ({}D)", count, dimension);

        Ok(Self {
            dimension,
            vectors,
            chunks,
        })
    }
}
