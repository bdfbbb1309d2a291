//! Initialization, refresh and failure handling.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use internmatch_core::{Error, StudentProfile};
use internmatch_engine::{
    EngineStatus, InternshipStore, JsonFileStore, MemoryStore, RecommendationFilters,
};
use serde_json::json;

use crate::support::{BrokenEmbedder, CountingEmbedder, CountingStore, catalogue, engine};

/// Concurrent callers share one initialization attempt.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_initialize_runs_once() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(CountingStore::new(catalogue()));
    let engine = engine(
        dir.path(),
        Arc::clone(&store) as _,
        Arc::new(CountingEmbedder::new()),
    );

    let outcomes = join_all((0..8).map(|_| {
        let engine = engine.clone();
        async move { engine.initialize().await }
    }))
    .await;

    assert!(outcomes.into_iter().all(|ready| ready));
    assert_eq!(store.reads(), 1);
    assert_eq!(engine.status(), EngineStatus::Ready);
}

#[tokio::test]
async fn test_model_failure_makes_engine_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(
        dir.path(),
        Arc::new(MemoryStore::new(catalogue())),
        Arc::new(BrokenEmbedder),
    );

    let result = engine
        .get_recommendations_for_student(
            &StudentProfile::new("s1").with_skills(["Python"]),
            5,
            &RecommendationFilters::default(),
            None,
        )
        .await;

    let error = result.unwrap_err();
    assert!(matches!(error, Error::Unavailable(_)), "{error}");
    assert!(error.is_retryable());
    assert!(matches!(engine.status(), EngineStatus::Failed(_)));
    assert!(!engine.get_engine_stats().await.ready);
}

/// An unreadable store still lets the engine start, with nothing to recommend.
#[tokio::test]
async fn test_missing_store_starts_empty() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileStore::new(dir.path().join("missing.json"));
    let engine = engine(dir.path(), Arc::new(store), Arc::new(CountingEmbedder::new()));

    assert!(engine.initialize().await);
    let results = engine
        .get_recommendations_for_student(
            &StudentProfile::new("s1").with_skills(["Python"]),
            5,
            &RecommendationFilters::default(),
            None,
        )
        .await
        .unwrap();
    assert!(results.is_empty());

    let trending = engine.get_trending_internships(5).await;
    assert!(matches!(trending, Err(Error::DataSource(_))));
}

/// A request noticing new documents triggers a background rebuild.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_document_drift_schedules_refresh() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::new(catalogue()));
    let engine = engine(
        dir.path(),
        Arc::clone(&store) as _,
        Arc::new(CountingEmbedder::new()),
    );
    assert!(engine.initialize().await);

    store.insert(json!({"_id": "ml", "title": "Machine Learning Intern", "skills": ["Python"]}));
    assert_eq!(store.count_documents().await.unwrap(), 5);

    engine
        .get_recommendations_for_student(
            &StudentProfile::new("s1").with_skills(["Python"]),
            3,
            &RecommendationFilters::default(),
            None,
        )
        .await
        .unwrap();

    let mut indexed = 0;
    for _ in 0..100 {
        indexed = engine.get_engine_stats().await.index.indexed;
        if indexed == 5 && !engine.is_refreshing() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(indexed, 5);
    assert!(engine.get_engine_stats().await.last_refresh.is_some());
}

#[tokio::test]
async fn test_refresh_data_picks_up_changes() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::new(catalogue()));
    let engine = engine(
        dir.path(),
        Arc::clone(&store) as _,
        Arc::new(CountingEmbedder::new()),
    );
    assert!(engine.initialize().await);

    store.replace(catalogue().into_iter().take(1).collect());
    assert!(engine.refresh_data().await);

    let stats = engine.get_engine_stats().await;
    assert_eq!(stats.index.indexed, 1);
    assert_eq!(stats.index.source_count, 1);
}

/// Refreshing an engine that was never initialized leaves it ready.
#[tokio::test]
async fn test_refresh_data_marks_ready() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(
        dir.path(),
        Arc::new(MemoryStore::new(catalogue())),
        Arc::new(CountingEmbedder::new()),
    );
    assert!(engine.refresh_data().await);
    assert!(engine.is_ready());
}

#[tokio::test]
async fn test_reset_clears_student_cache() {
    let dir = tempfile::tempdir().unwrap();
    let provider = Arc::new(CountingEmbedder::new());
    let engine = engine(
        dir.path(),
        Arc::new(MemoryStore::new(catalogue())),
        Arc::clone(&provider) as _,
    );
    let student = StudentProfile::new("s1").with_skills(["Python"]);
    let filters = RecommendationFilters::default();

    engine
        .get_recommendations_for_student(&student, 3, &filters, None)
        .await
        .unwrap();
    engine.reset();
    assert_eq!(engine.status(), EngineStatus::Uninitialized);
    assert_eq!(engine.get_engine_stats().await.student_cache.cached_profiles, 0);

    engine
        .get_recommendations_for_student(&student, 3, &filters, None)
        .await
        .unwrap();
    assert!(engine.is_ready());
    assert_eq!(provider.single_calls(), 2);
}

/// Overlapping refreshes leave a disk cache matching the installed snapshot.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_overlapping_refreshes_persist_installed_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::new(catalogue()));
    let running = engine(
        dir.path(),
        Arc::clone(&store) as _,
        Arc::new(CountingEmbedder::new()),
    );
    assert!(running.initialize().await);

    store.replace(catalogue().into_iter().take(2).collect());
    let (first, second) = tokio::join!(running.refresh_data(), running.refresh_data());
    assert!(first && second);
    assert_eq!(running.get_engine_stats().await.index.indexed, 2);

    let provider = Arc::new(CountingEmbedder::new());
    let restarted = engine(dir.path(), Arc::clone(&store) as _, Arc::clone(&provider) as _);
    assert!(restarted.initialize().await);
    assert_eq!(provider.batch_calls(), 0);

    let stats = restarted.get_engine_stats().await;
    assert_eq!(stats.index.indexed, 2);
    assert_eq!(stats.index.records, 2);
}
