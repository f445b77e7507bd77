//! Retrieval strategy integration tests over a hand-built index pair

mod common;

use common::{test_config, OverlapScorer, VocabEmbedder};
use hybrag::chunking::{chunk_text, Chunk, ChunkingConfig};
use hybrag::corpus::Document;
use hybrag::embedding::{EmbeddingProvider, FastEmbedProvider};
use hybrag::index::{Bm25Params, IndexSnapshot};
use hybrag::manager::IndexManager;
use hybrag::retrieval::{
    QueryContext, RelevanceScorer, RetrievalParams, Retriever, ScoredChunk, Strategy,
};
use std::sync::Arc;
use tempfile::TempDir;

const CORPUS: [(&str, &str); 4] = [
    ("d0", "rust tokio async runtime"),
    ("d1", "rust rust borrow checker"),
    ("d2", "tokio tokio tokio channels"),
    ("d3", "python asyncio event loop"),
];

fn build(docs: &[(&str, &str)], embedder: &dyn EmbeddingProvider) -> IndexSnapshot {
    let chunks: Vec<Chunk> = docs
        .iter()
        .flat_map(|(source, text)| chunk_text(text, source, source, ChunkingConfig::default()))
        .collect();
    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let vectors = embedder.embed_batch(&texts).unwrap();

    let mut snapshot = IndexSnapshot::empty(embedder.dimension(), Bm25Params::default());
    snapshot.dense.reset(vectors, chunks.clone()).unwrap();
    snapshot.lexical.build(chunks);
    snapshot
}

fn corpus_embedder() -> VocabEmbedder {
    let texts: Vec<&str> = CORPUS.iter().map(|(_, t)| *t).collect();
    VocabEmbedder::from_texts(&texts)
}

fn run(
    snapshot: &IndexSnapshot,
    embedder: &dyn EmbeddingProvider,
    strategy: Strategy,
    query: &str,
    top_k: usize,
    params: RetrievalParams,
) -> Vec<ScoredChunk> {
    let ctx = QueryContext::new(query, top_k, strategy).with_params(params);
    let scorer: &dyn RelevanceScorer = &OverlapScorer;
    Retriever::new(snapshot, embedder, Some(scorer))
        .retrieve(&ctx)
        .unwrap()
}

fn sources(results: &[ScoredChunk]) -> Vec<String> {
    results.iter().map(|r| r.chunk.source.clone()).collect()
}

#[test]
fn test_similarity_orders_by_inner_product() {
    let embedder = corpus_embedder();
    let snapshot = build(&CORPUS, &embedder);

    let results = run(
        &snapshot,
        &embedder,
        Strategy::Similarity,
        "rust tokio",
        10,
        RetrievalParams::default(),
    );

    assert_eq!(results.len(), 4);
    assert_eq!(results[0].chunk.source, "d0");
    assert_eq!(results[3].chunk.source, "d3");
    assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
    assert!(results.iter().all(|r| r.score_dense.is_some()));
}

#[test]
fn test_mmr_with_lambda_one_matches_similarity() {
    let embedder = corpus_embedder();
    let snapshot = build(&CORPUS, &embedder);
    let params = RetrievalParams {
        mmr_lambda: 1.0,
        ..Default::default()
    };

    let similarity = run(&snapshot, &embedder, Strategy::Similarity, "rust tokio", 4, params);
    let mmr = run(&snapshot, &embedder, Strategy::Mmr, "rust tokio", 4, params);
    assert_eq!(sources(&mmr), sources(&similarity));
}

#[test]
fn test_mmr_with_lambda_zero_skips_duplicates() {
    let docs = [
        ("dup_a", "apple banana"),
        ("dup_b", "apple banana"),
        ("near", "apple cherry"),
        ("far", "zebra"),
    ];
    let embedder = VocabEmbedder::new(&["apple", "banana", "cherry", "zebra"]);
    let snapshot = build(&docs, &embedder);
    let params = RetrievalParams {
        mmr_lambda: 0.0,
        ..Default::default()
    };

    let similarity = run(&snapshot, &embedder, Strategy::Similarity, "apple banana", 2, params);
    assert_eq!(sources(&similarity), vec!["dup_a", "dup_b"]);

    let mmr = run(&snapshot, &embedder, Strategy::Mmr, "apple banana", 2, params);
    assert_eq!(mmr.len(), 2);
    assert_eq!(mmr[0].chunk.source, "dup_a");
    assert_ne!(mmr[1].chunk.text, mmr[0].chunk.text);
}

#[test]
fn test_hybrid_alpha_extremes_follow_single_channel() {
    let embedder = corpus_embedder();
    let snapshot = build(&CORPUS, &embedder);
    let query = "rust tokio";

    let dense_only = run(
        &snapshot,
        &embedder,
        Strategy::Hybrid,
        query,
        4,
        RetrievalParams {
            hybrid_alpha: 1.0,
            ..Default::default()
        },
    );
    let similarity = run(&snapshot, &embedder, Strategy::Similarity, query, 4, RetrievalParams::default());
    assert_eq!(sources(&dense_only), sources(&similarity));

    let sparse_only = run(
        &snapshot,
        &embedder,
        Strategy::Hybrid,
        query,
        4,
        RetrievalParams {
            hybrid_alpha: 0.0,
            ..Default::default()
        },
    );
    let lexical: Vec<String> = snapshot
        .lexical
        .search(query, 4)
        .iter()
        .map(|hit| snapshot.lexical.chunk(hit.position).unwrap().source.clone())
        .collect();
    assert_eq!(sources(&sparse_only), lexical);
    assert!(sparse_only.iter().all(|r| r.score_fused.is_some()));
}

#[test]
fn test_rrf_rewards_agreement_between_channels() {
    let embedder = corpus_embedder();
    let snapshot = build(&CORPUS, &embedder);

    let results = run(&snapshot, &embedder, Strategy::Rrf, "rust tokio", 4, RetrievalParams::default());

    // d0 ranks first in both channels
    assert_eq!(results[0].chunk.source, "d0");
    assert!(results[0].score > 1.0 / 61.0);
    assert!(results[0].score > results[1].score);
    assert_eq!(results[0].score_fused, Some(results[0].score));
}

#[test]
fn test_rerank_wraps_any_base_strategy() {
    let embedder = corpus_embedder();
    let snapshot = build(&CORPUS, &embedder);

    for base in [Strategy::Similarity, Strategy::Mmr, Strategy::Hybrid, Strategy::Rrf] {
        let results = run(
            &snapshot,
            &embedder,
            Strategy::Rerank(Box::new(base.clone())),
            "python event loop",
            1,
            RetrievalParams::default(),
        );
        assert_eq!(results[0].chunk.source, "d3", "base {}", base);
        assert_eq!(results[0].score_rerank, Some(3.0));
    }
}

#[test]
fn test_empty_index_and_zero_top_k_are_not_errors() {
    let embedder = corpus_embedder();
    let empty = build(&[], &embedder);
    let full = build(&CORPUS, &embedder);

    for strategy in [
        Strategy::Similarity,
        Strategy::Mmr,
        Strategy::Hybrid,
        Strategy::Rrf,
        Strategy::Rerank(Box::new(Strategy::Hybrid)),
    ] {
        assert!(run(&empty, &embedder, strategy.clone(), "rust", 5, RetrievalParams::default()).is_empty());
        assert!(run(&full, &embedder, strategy, "rust", 0, RetrievalParams::default()).is_empty());
    }
}

#[test]
fn test_huge_top_k_returns_whole_corpus() {
    let embedder = corpus_embedder();
    let snapshot = build(&CORPUS, &embedder);

    for strategy in [
        Strategy::Similarity,
        Strategy::Mmr,
        Strategy::Hybrid,
        Strategy::Rrf,
        Strategy::Rerank(Box::new(Strategy::Mmr)),
    ] {
        let results = run(
            &snapshot,
            &embedder,
            strategy.clone(),
            "rust tokio",
            usize::MAX,
            RetrievalParams::default(),
        );
        assert_eq!(results.len(), CORPUS.len(), "strategy {}", strategy);
    }
}

#[test]
fn test_invalid_parameters_are_rejected() {
    let embedder = corpus_embedder();
    let snapshot = build(&CORPUS, &embedder);
    let ctx = QueryContext::new("rust", 2, Strategy::Hybrid).with_params(RetrievalParams {
        hybrid_alpha: 3.0,
        ..Default::default()
    });

    assert!(Retriever::new(&snapshot, &embedder, None).retrieve(&ctx).is_err());
}

#[tokio::test]
#[ignore] // Requires model download
async fn test_fastembed_end_to_end() {
    let temp = TempDir::new().unwrap();
    let provider = Arc::new(FastEmbedProvider::with_default_model().expect("Failed to initialize embedding provider"));
    let manager = IndexManager::open(test_config(temp.path()), provider, None).unwrap();

    manager
        .rebuild(vec![
            Document::new("A", "A", "The sky is blue."),
            Document::new("B", "B", "Grass is green."),
        ])
        .await
        .unwrap();

    let sky = manager
        .query("What color is the sky?", "similarity", 1, None)
        .await
        .unwrap();
    assert_eq!(sky[0].source, "A");

    let grass = manager.query("green grass", "similarity", 1, None).await.unwrap();
    assert_eq!(grass[0].source, "B");

    for strategy in ["mmr", "hybrid", "rrf"] {
        let results = manager.query("green grass", strategy, 1, None).await.unwrap();
        println!("{}: {:?}", strategy, results);
        assert_eq!(results[0].source, "B");
    }
}
