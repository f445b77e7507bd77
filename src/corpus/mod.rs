//! Document corpus loading
//!
//! Raw documents arrive as UTF-8 text files. Binary formats (PDF and friends)
//! are decoded by an external loader before they reach this module.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Extensions picked up when scanning a documents folder
pub const ALLOWED_EXTENSIONS: &[&str] = &["txt", "md"];

/// A document could not be read or decoded
#[derive(Error, Debug)]
pub enum CorpusLoadError {
    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Failed to read {path}: {source}")]
    Unreadable {
        path: String,
        source: std::io::Error,
    },

    #[error("Document is not valid UTF-8: {0}")]
    InvalidEncoding(String),

    #[error("Document already indexed: {0}; rebuild to refresh it")]
    AlreadyIndexed(String),

    #[error("Document source appears more than once in the batch: {0}")]
    DuplicateSource(String),
}

/// A raw document ready for chunking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Path or logical id
    pub source: String,
    /// Human-readable title
    pub title: String,
    /// Full text
    pub text: String,
}

impl Document {
    pub fn new(source: impl Into<String>, title: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            title: title.into(),
            text: text.into(),
        }
    }
}

/// A document that was skipped during loading
#[derive(Debug)]
pub struct SkippedDocument {
    pub source: String,
    pub error: CorpusLoadError,
}

/// Outcome of loading a batch of documents
#[derive(Debug, Default)]
pub struct LoadOutcome {
    pub documents: Vec<Document>,
    pub skipped: Vec<SkippedDocument>,
}

/// Outcome of copying files into the documents folder
#[derive(Debug, Default)]
pub struct ImportOutcome {
    /// Destination paths inside the documents folder
    pub imported: Vec<PathBuf>,
    pub skipped: Vec<SkippedDocument>,
}

/// Title derived from a path: the file stem
pub fn title_from_path(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Supported document files directly inside `dir`, sorted by path
pub fn list_doc_paths(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut paths = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && is_supported(&path) {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let e = e.to_ascii_lowercase();
            ALLOWED_EXTENSIONS.contains(&e.as_str())
        })
        .unwrap_or(false)
}

/// Load one document from disk
pub fn load_document(path: &Path) -> Result<Document, CorpusLoadError> {
    let source = path.display().to_string();

    if !path.is_file() {
        return Err(CorpusLoadError::NotFound(source));
    }

    let bytes = fs::read(path).map_err(|e| CorpusLoadError::Unreadable {
        path: source.clone(),
        source: e,
    })?;
    let text = String::from_utf8(bytes).map_err(|_| CorpusLoadError::InvalidEncoding(source.clone()))?;

    Ok(Document {
        title: title_from_path(path),
        source,
        text,
    })
}

/// Load many documents; failures are collected, never fatal
pub fn load_documents<P: AsRef<Path>>(paths: &[P]) -> LoadOutcome {
    let mut outcome = LoadOutcome::default();

    for path in paths {
        let path = path.as_ref();
        match load_document(path) {
            Ok(doc) => outcome.documents.push(doc),
            Err(error) => {
                tracing::warn!("Skipping document {}: {}", path.display(), error);
                outcome.skipped.push(SkippedDocument {
                    source: path.display().to_string(),
                    error,
                });
            }
        }
    }

    outcome
}

/// Where `path` lands when imported into `docs_dir`
pub fn import_destination(path: &Path, docs_dir: &Path) -> Option<PathBuf> {
    path.file_name().map(|name| docs_dir.join(name))
}

/// Copy files into `docs_dir` so a later folder rebuild picks them up
///
/// Missing files and failed copies are reported per file; only failing to
/// create `docs_dir` itself is an error.
pub fn import_files<P: AsRef<Path>>(paths: &[P], docs_dir: &Path) -> std::io::Result<ImportOutcome> {
    fs::create_dir_all(docs_dir)?;

    let mut outcome = ImportOutcome::default();
    for path in paths {
        let path = path.as_ref();
        let source = path.display().to_string();
        let dst = match import_destination(path, docs_dir) {
            Some(dst) if path.is_file() => dst,
            _ => {
                tracing::warn!("Skipping document {}: not found", source);
                outcome.skipped.push(SkippedDocument {
                    error: CorpusLoadError::NotFound(source.clone()),
                    source,
                });
                continue;
            }
        };

        let same_file = match (path.canonicalize(), dst.canonicalize()) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        };
        if !same_file {
            if let Err(e) = fs::copy(path, &dst) {
                tracing::warn!("Skipping document {}: copy to {} failed: {}", source, dst.display(), e);
                outcome.skipped.push(SkippedDocument {
                    error: CorpusLoadError::Unreadable {
                        path: source.clone(),
                        source: e,
                    },
                    source,
                });
                continue;
            }
        }
        outcome.imported.push(dst);
    }

    Ok(outcome)
}
