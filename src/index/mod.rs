//! Dense and lexical indexes over the same chunk set
//!
//! The two indexes are only ever mutated together, through an [`IndexSnapshot`]
//! owned by the index manager. A snapshot is a plain value: ingestion clones
//! the current one, mutates the clone, checks it and swaps it in.

mod dense;
mod lexical;
pub mod persist;

pub use dense::{DenseIndex, DenseIndexError, SearchResult};
pub use lexical::{tokenize, Bm25Params, KeywordSearchResult, LexicalIndex, LexicalIndexError};

use crate::chunking::{Chunk, ChunkKey};
use crate::error::{RagError, Result};
use std::path::{Path, PathBuf};

/// Locations of the durable index artifacts inside the index directory
#[derive(Debug, Clone)]
pub struct IndexPaths {
    pub dir: PathBuf,
    pub vectors: PathBuf,
    pub ledger: PathBuf,
    pub lexical: PathBuf,
    pub manifest: PathBuf,
}

impl IndexPaths {
    pub fn new(index_dir: &Path) -> Self {
        Self {
            dir: index_dir.to_path_buf(),
            vectors: index_dir.join("vectors.bin"),
            ledger: index_dir.join("chunks.jsonl"),
            lexical: index_dir.join("lexical.json"),
            manifest: index_dir.join("manifest.json"),
        }
    }
}

/// Dense + lexical index pair
#[derive(Debug, Clone)]
pub struct IndexSnapshot {
    pub dense: DenseIndex,
    pub lexical: LexicalIndex,
}

impl IndexSnapshot {
    pub fn empty(dimension: usize, params: Bm25Params) -> Self {
        Self {
            dense: DenseIndex::new(dimension),
            lexical: LexicalIndex::new(params),
        }
    }

    /// Number of chunks (both indexes agree once consistency holds)
    pub fn len(&self) -> usize {
        self.dense.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dense.is_empty()
    }

    /// Fail unless both indexes hold exactly the same chunk identities
    pub fn check_consistency(&self) -> Result<()> {
        let mut dense_keys: Vec<ChunkKey> = self.dense.chunks().iter().map(Chunk::key).collect();
        let mut lexical_keys: Vec<ChunkKey> =
            self.lexical.chunks().iter().map(Chunk::key).collect();
        dense_keys.sort();
        lexical_keys.sort();

        if dense_keys == lexical_keys {
            return Ok(());
        }

        let detail = dense_keys
            .iter()
            .zip(lexical_keys.iter())
            .find(|(d, l)| d != l)
            .map(|(d, l)| format!("first difference: {} vs {}", d, l))
            .unwrap_or_else(|| "membership differs".to_string());

        Err(RagError::InconsistentIndexState {
            dense: dense_keys.len(),
            lexical: lexical_keys.len(),
            detail,
        })
    }

    /// Persist both indexes; each file is replaced atomically
    pub fn save(&self, paths: &IndexPaths) -> Result<()> {
        self.dense.save(&paths.vectors, &paths.ledger)?;
        self.lexical.save(&paths.lexical)?;
        Ok(())
    }

    /// Load a persisted pair
    ///
    /// Returns `Ok(None)` when nothing has been persisted yet. Finding only
    /// one of the two indexes on disk is a configuration error.
    pub fn load(paths: &IndexPaths, params: Bm25Params) -> Result<Option<Self>> {
        let dense_present = paths.vectors.exists() || paths.ledger.exists();
        let lexical_present = paths.lexical.exists();

        match (dense_present, lexical_present) {
            (false, false) => return Ok(None),
            (true, false) => {
                return Err(RagError::Config(format!(
                    "dense index found in {} but lexical index {} is missing; run a full rebuild",
                    paths.dir.display(),
                    paths.lexical.display()
                )))
            }
            (false, true) => {
                return Err(RagError::Config(format!(
                    "lexical index found in {} but dense index {} is missing; run a full rebuild",
                    paths.dir.display(),
                    paths.vectors.display()
                )))
            }
            (true, true) => {}
        }

        let snapshot = Self {
            dense: DenseIndex::load(&paths.vectors, &paths.ledger)?,
            lexical: LexicalIndex::load(&paths.lexical, params)?,
        };
        snapshot.check_consistency()?;

        Ok(Some(snapshot))
    }
}
