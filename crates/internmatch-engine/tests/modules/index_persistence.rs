//! Index persistence across engine restarts.

use std::sync::Arc;

use internmatch_engine::{InternshipIndexManager, MemoryStore, WorkerPool};
use serde_json::json;

use crate::support::{CountingEmbedder, CountingStore, DIMENSION, catalogue, engine};

/// A second engine over the same cache directory loads the indices instead of
/// re-encoding the catalogue.
#[tokio::test]
async fn test_restart_reuses_persisted_indices() {
    let dir = tempfile::tempdir().unwrap();

    let first_provider = Arc::new(CountingEmbedder::new());
    let first = engine(
        dir.path(),
        Arc::new(MemoryStore::new(catalogue())),
        Arc::clone(&first_provider) as _,
    );
    assert!(first.initialize().await);
    assert_eq!(first_provider.batch_calls(), 1);
    let built = first.get_engine_stats().await.index;

    let second_provider = Arc::new(CountingEmbedder::new());
    let second = engine(
        dir.path(),
        Arc::new(MemoryStore::new(catalogue())),
        Arc::clone(&second_provider) as _,
    );
    assert!(second.initialize().await);
    assert_eq!(second_provider.batch_calls(), 0);

    let loaded = second.get_engine_stats().await.index;
    assert_eq!(loaded.indexed, built.indexed);
    assert_eq!(loaded.records, 4);
    assert_eq!(loaded.model_id, built.model_id);
}

/// Cached rows whose postings vanished from the store force a rebuild.
#[tokio::test]
async fn test_stale_cache_is_rebuilt() {
    let dir = tempfile::tempdir().unwrap();

    let first = engine(
        dir.path(),
        Arc::new(MemoryStore::new(catalogue())),
        Arc::new(CountingEmbedder::new()),
    );
    assert!(first.initialize().await);

    let mut shrunk = catalogue();
    shrunk.truncate(2);
    let provider = Arc::new(CountingEmbedder::new());
    let second = engine(
        dir.path(),
        Arc::new(MemoryStore::new(shrunk)),
        Arc::clone(&provider) as _,
    );
    assert!(second.initialize().await);

    assert_eq!(provider.batch_calls(), 1);
    assert_eq!(second.get_engine_stats().await.index.indexed, 2);
}

/// Precomputed embeddings of the right size are used as-is.
#[tokio::test]
async fn test_precomputed_embeddings_skip_encoding() {
    let dir = tempfile::tempdir().unwrap();
    let mut vector = vec![0.0f32; DIMENSION];
    vector[0] = 1.0;
    let store = Arc::new(CountingStore::new(vec![
        json!({"_id": "pre", "title": "Embedded Posting", "embedding": vector}),
        json!({"_id": "short", "title": "Wrong Size", "embedding": [1.0, 0.0]}),
    ]));
    let provider = Arc::new(CountingEmbedder::new());
    let engine = engine(dir.path(), Arc::clone(&store) as _, Arc::clone(&provider) as _);

    assert!(engine.initialize().await);
    assert_eq!(store.reads(), 1);
    // Only the posting with a mismatched vector needs the model.
    assert_eq!(provider.batch_calls(), 1);
    assert_eq!(engine.get_engine_stats().await.index.indexed, 2);
}

#[tokio::test]
async fn test_manager_without_cache_reports_miss() {
    let dir = tempfile::tempdir().unwrap();
    let manager = InternshipIndexManager::new(dir.path().join("empty"), WorkerPool::new(1));
    assert!(!manager.load_from_disk(DIMENSION, "any-model").await.unwrap());
    assert_eq!(manager.stats().await.indexed, 0);
}
