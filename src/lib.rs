//! hybrag - hybrid dense + lexical passage retrieval
//!
//! Documents are chunked into overlapping units that are indexed twice: as
//! unit vectors in an exact inner-product index and as token bags in a BM25
//! index. Queries run one of five strategies over the pair (similarity, MMR,
//! weighted hybrid, reciprocal rank fusion, cross-encoder rerank) and come
//! back as ranked, de-duplicated citations ready for a generator prompt.
//!
//! The [`manager::IndexManager`] owns both indexes and keeps them in sync.

pub mod chunking;
pub mod cli;
pub mod config;
pub mod corpus;
pub mod embedding;
pub mod error;
pub mod index;
pub mod manager;
pub mod retrieval;

pub use error::{RagError, Result};
