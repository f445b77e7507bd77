//! Index Manager: the only owner of the dense + lexical index pair
//!
//! Single writer, many readers. Ingestion is serialized by an async mutex and
//! works on a private copy of the current snapshot; the copy is checked for
//! consistency, persisted, and only then swapped in. Queries clone the `Arc`
//! of whatever snapshot is current and never see a half-applied ingestion.

mod manifest;

pub use manifest::IndexManifest;

use crate::chunking::{chunk_text, Chunk};
use crate::config::Config;
use crate::corpus::{
    import_destination, import_files, list_doc_paths, load_documents, CorpusLoadError, Document,
    SkippedDocument,
};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::index::{IndexPaths, IndexSnapshot};
use crate::retrieval::{
    fold_chat_history, Citation, ContextPack, QueryContext, RelevanceScorer, RetrievalParams,
    Retriever, ScoredChunk,
};
use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Result of an ingestion call
#[derive(Debug, Default)]
pub struct IngestReport {
    /// Sources of the documents that were indexed
    pub accepted: Vec<String>,
    /// Documents left out, with the reason
    pub skipped: Vec<SkippedDocument>,
    /// Units added (incremental) or now indexed (rebuild)
    pub units: usize,
}

/// Unit counts and build information
#[derive(Debug, Clone, Serialize)]
pub struct IndexStats {
    pub dense_units: usize,
    pub lexical_units: usize,
    pub dimension: usize,
    pub embedding_model: String,
    pub manifest: Option<IndexManifest>,
}

pub struct IndexManager {
    config: Config,
    paths: IndexPaths,
    embedder: Arc<dyn EmbeddingProvider>,
    scorer: Option<Arc<dyn RelevanceScorer>>,
    snapshot: RwLock<Arc<IndexSnapshot>>,
    ingest_lock: Mutex<()>,
}

impl IndexManager {
    /// Open the index stored under `config.storage.index_dir`
    ///
    /// Starts empty when nothing has been persisted. Finding only part of
    /// the durable state, or a dense/lexical membership mismatch, is an error.
    pub fn open(
        config: Config,
        embedder: Arc<dyn EmbeddingProvider>,
        scorer: Option<Arc<dyn RelevanceScorer>>,
    ) -> Result<Self> {
        let paths = IndexPaths::new(&config.index_dir());

        let snapshot = match IndexSnapshot::load(&paths, config.lexical)? {
            Some(snapshot) => {
                tracing::info!(
                    "Loaded index from {}: {} units",
                    paths.dir.display(),
                    snapshot.len()
                );
                snapshot
            }
            None => {
                tracing::debug!("No index at {}, starting empty", paths.dir.display());
                IndexSnapshot::empty(embedder.dimension(), config.lexical)
            }
        };

        if let Some(manifest) = IndexManifest::load(&paths.manifest)? {
            if manifest.model != embedder.model_name() || manifest.dimension != embedder.dimension() {
                tracing::warn!(
                    "Index was built with {} ({}D) but the current embedder is {} ({}D); rebuild the index",
                    manifest.model,
                    manifest.dimension,
                    embedder.model_name(),
                    embedder.dimension()
                );
            }
        }

        Ok(Self {
            config,
            paths,
            embedder,
            scorer,
            snapshot: RwLock::new(Arc::new(snapshot)),
            ingest_lock: Mutex::new(()),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Current snapshot (read-only)
    pub async fn snapshot(&self) -> Arc<IndexSnapshot> {
        self.snapshot.read().await.clone()
    }

    /// Replace both indexes with the chunks of `documents`
    ///
    /// Returns the number of units now indexed.
    pub async fn rebuild(&self, documents: Vec<Document>) -> Result<usize> {
        Ok(self.rebuild_documents(documents).await?.units)
    }

    /// Like [`rebuild`](Self::rebuild), reporting accepted and skipped documents
    ///
    /// A source that appears more than once is indexed from its first
    /// occurrence only.
    pub async fn rebuild_documents(&self, documents: Vec<Document>) -> Result<IngestReport> {
        let _guard = self.ingest_lock.lock().await;

        let (fresh, skipped) = split_new_sources(documents, &HashSet::new());
        let chunks = self.chunk_documents(&fresh);
        tracing::info!(
            "Rebuilding index: {} documents, {} units",
            fresh.len(),
            chunks.len()
        );
        let vectors = self.embed_chunks(&chunks).await?;

        let mut next = IndexSnapshot::empty(self.embedder.dimension(), self.config.lexical);
        next.dense.reset(vectors, chunks.clone())?;
        next.lexical.build(chunks);

        let units = next.len();
        self.commit(next).await?;

        tracing::info!("Index rebuilt with {} units", units);
        Ok(IngestReport {
            accepted: fresh.into_iter().map(|d| d.source).collect(),
            skipped,
            units,
        })
    }

    /// Rebuild from every supported file in the documents folder
    pub async fn rebuild_from_folder(&self) -> Result<IngestReport> {
        let docs_dir = self.config.docs_dir();
        let paths = list_doc_paths(&docs_dir).map_err(|e| RagError::Io {
            source: e,
            context: format!("Failed to list documents in {:?}", docs_dir),
        })?;

        let outcome = load_documents(&paths);
        let mut report = self.rebuild_documents(outcome.documents).await?;
        report.skipped.extend(outcome.skipped);
        Ok(report)
    }

    /// Append documents to both indexes
    ///
    /// Documents whose source is already indexed, or repeats within the
    /// batch, are skipped; everything else is chunked, embedded and appended
    /// in one step.
    pub async fn add_documents(&self, documents: Vec<Document>) -> Result<IngestReport> {
        let _guard = self.ingest_lock.lock().await;
        let current = self.snapshot().await;

        let (fresh, skipped) = split_new_sources(documents, &indexed_sources(&current));
        let chunks = self.chunk_documents(&fresh);
        let report = IngestReport {
            accepted: fresh.into_iter().map(|d| d.source).collect(),
            skipped,
            units: chunks.len(),
        };
        if chunks.is_empty() {
            return Ok(report);
        }

        let vectors = self.embed_chunks(&chunks).await?;

        let mut next = if current.is_empty() {
            IndexSnapshot::empty(self.embedder.dimension(), self.config.lexical)
        } else {
            (*current).clone()
        };
        next.dense.add(vectors, chunks.clone())?;
        next.lexical.add(chunks);

        self.commit(next).await?;

        tracing::info!(
            "Added {} documents ({} units)",
            report.accepted.len(),
            report.units
        );
        Ok(report)
    }

    /// Copy files into the documents folder and index them incrementally
    ///
    /// Files that are missing, fail to copy, or are not UTF-8 are reported as
    /// skipped and do not abort the rest of the batch. A file whose
    /// destination is already indexed is skipped before it is copied, so the
    /// documents folder keeps the indexed content.
    pub async fn add_files<P: AsRef<Path>>(&self, files: &[P]) -> Result<IngestReport> {
        let docs_dir = self.config.docs_dir();
        let indexed = indexed_sources(&*self.snapshot().await);

        let mut skipped = Vec::new();
        let mut batch = HashSet::new();
        let mut pending = Vec::with_capacity(files.len());
        for file in files {
            let path = file.as_ref();
            if let Some(dst) = import_destination(path, &docs_dir) {
                let dst = dst.display().to_string();
                let error = if indexed.contains(&dst) {
                    Some(CorpusLoadError::AlreadyIndexed(dst))
                } else if !batch.insert(dst.clone()) {
                    Some(CorpusLoadError::DuplicateSource(dst))
                } else {
                    None
                };
                if let Some(error) = error {
                    tracing::warn!("Skipping document {}: {}", path.display(), error);
                    skipped.push(SkippedDocument {
                        source: path.display().to_string(),
                        error,
                    });
                    continue;
                }
            }
            pending.push(path.to_path_buf());
        }

        let imported = import_files(&pending, &docs_dir).map_err(|e| RagError::Io {
            source: e,
            context: format!("Failed to create documents folder {:?}", docs_dir),
        })?;
        skipped.extend(imported.skipped);
        let outcome = load_documents(&imported.imported);
        skipped.extend(outcome.skipped);

        let mut report = self.add_documents(outcome.documents).await?;
        report.skipped.extend(skipped);
        Ok(report)
    }

    /// Ranked, de-duplicated citations for `text`
    ///
    /// Unknown strategy names fall back to MMR. `params` defaults to the
    /// configured retrieval parameters.
    pub async fn query(
        &self,
        text: &str,
        strategy_name: &str,
        top_k: usize,
        params: Option<RetrievalParams>,
    ) -> Result<Vec<Citation>> {
        let strategy = self.config.retrieval.strategy(strategy_name);
        let ctx = QueryContext::new(text, top_k, strategy)
            .with_params(params.unwrap_or_else(|| self.config.retrieval.params()));

        Ok(Citation::from_ranked(self.search(ctx).await?))
    }

    /// Run one retrieval call against the current snapshot
    pub async fn search(&self, ctx: QueryContext) -> Result<Vec<ScoredChunk>> {
        let snapshot = self.snapshot().await;
        let embedder = Arc::clone(&self.embedder);
        let scorer = self.scorer.clone();

        // Model inference blocks; keep it off the async workers
        let results = tokio::task::spawn_blocking(move || {
            Retriever::new(&snapshot, embedder.as_ref(), scorer.as_deref()).retrieve(&ctx)
        })
        .await
        .map_err(|e| RagError::Other(anyhow::anyhow!("Retrieval task failed: {}", e)))??;

        Ok(results)
    }

    /// Citations packed for the generator, with recent chat turns folded
    /// into the question
    pub async fn context(
        &self,
        question: &str,
        history: &[(String, String)],
        strategy_name: &str,
        top_k: usize,
        params: Option<RetrievalParams>,
    ) -> Result<ContextPack> {
        let question = fold_chat_history(question, history);
        let citations = self.query(&question, strategy_name, top_k, params).await?;
        Ok(ContextPack::new(question, citations))
    }

    pub async fn stats(&self) -> Result<IndexStats> {
        let snapshot = self.snapshot().await;
        Ok(IndexStats {
            dense_units: snapshot.dense.len(),
            lexical_units: snapshot.lexical.len(),
            dimension: snapshot.dense.dimension(),
            embedding_model: self.embedder.model_name().to_string(),
            manifest: IndexManifest::load(&self.paths.manifest)?,
        })
    }

    fn chunk_documents(&self, documents: &[Document]) -> Vec<Chunk> {
        documents
            .iter()
            .flat_map(|doc| chunk_text(&doc.text, &doc.source, &doc.title, self.config.chunking))
            .collect()
    }

    /// Embed chunk texts in configured batches, preserving order
    async fn embed_chunks(&self, chunks: &[Chunk]) -> Result<Vec<Vec<f32>>> {
        if chunks.is_empty() {
            return Ok(Vec::new());
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embedder = Arc::clone(&self.embedder);
        let batch_size = self.config.embedding.batch_size.max(1);

        let vectors = tokio::task::spawn_blocking(move || {
            let mut vectors = Vec::with_capacity(texts.len());
            for batch in texts.chunks(batch_size) {
                vectors.extend(embedder.embed_batch(batch)?);
            }
            Ok::<_, crate::embedding::EmbeddingError>(vectors)
        })
        .await
        .map_err(|e| RagError::Other(anyhow::anyhow!("Embedding task failed: {}", e)))??;

        tracing::debug!("Embedded {} units", vectors.len());
        Ok(vectors)
    }

    /// Verify, persist and publish a new snapshot
    async fn commit(&self, next: IndexSnapshot) -> Result<()> {
        next.check_consistency()?;

        let next = Arc::new(next);
        let to_save = Arc::clone(&next);
        let paths = self.paths.clone();
        let manifest = IndexManifest::new(self.embedder.model_name(), next.dense.dimension(), next.len());

        tokio::task::spawn_blocking(move || -> Result<()> {
            to_save.save(&paths)?;
            manifest.save(&paths.manifest)
        })
        .await
        .map_err(|e| RagError::Other(anyhow::anyhow!("Persistence task failed: {}", e)))??;

        *self.snapshot.write().await = next;
        tracing::debug!("Index persisted to {}", self.paths.dir.display());
        Ok(())
    }
}

fn indexed_sources(snapshot: &IndexSnapshot) -> HashSet<String> {
    snapshot
        .dense
        .chunks()
        .iter()
        .map(|c| c.source.clone())
        .collect()
}

/// Keep the first document per source that is not in `indexed`
fn split_new_sources(
    documents: Vec<Document>,
    indexed: &HashSet<String>,
) -> (Vec<Document>, Vec<SkippedDocument>) {
    let mut seen = HashSet::new();
    let mut fresh = Vec::with_capacity(documents.len());
    let mut skipped = Vec::new();

    for document in documents {
        let error = if indexed.contains(&document.source) {
            CorpusLoadError::AlreadyIndexed(document.source.clone())
        } else if seen.insert(document.source.clone()) {
            fresh.push(document);
            continue;
        } else {
            CorpusLoadError::DuplicateSource(document.source.clone())
        };
        tracing::warn!("Skipping {}: {}", document.source, error);
        skipped.push(SkippedDocument {
            source: document.source,
            error,
        });
    }

    (fresh, skipped)
}
