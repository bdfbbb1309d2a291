//! Student vector caching across recommendation requests.

use std::sync::Arc;

use internmatch_core::StudentProfile;
use internmatch_engine::{MemoryStore, RecommendationEngine, RecommendationFilters};

use crate::support::{CountingEmbedder, catalogue, engine};

async fn recommend(engine: &RecommendationEngine, student: &StudentProfile) {
    engine
        .get_recommendations_for_student(student, 3, &RecommendationFilters::default(), None)
        .await
        .unwrap();
}

/// A repeated request reuses the cached vectors without encoding the profile again.
#[tokio::test]
async fn test_repeat_request_hits_cache() {
    let dir = tempfile::tempdir().unwrap();
    let provider = Arc::new(CountingEmbedder::new());
    let engine = engine(
        dir.path(),
        Arc::new(MemoryStore::new(catalogue())),
        Arc::clone(&provider) as _,
    );
    let student = StudentProfile::new("s1").with_skills(["Python", "SQL"]);

    recommend(&engine, &student).await;
    assert_eq!(provider.single_calls(), 1);

    recommend(&engine, &student).await;
    assert_eq!(provider.single_calls(), 1);

    let stats = engine.get_engine_stats().await.student_cache;
    assert_eq!(stats.cached_profiles, 1);
    assert_eq!(stats.hits, 1);
}

/// Changing where the student lives invalidates their vectors.
#[tokio::test]
async fn test_location_change_recomputes_vectors() {
    let dir = tempfile::tempdir().unwrap();
    let provider = Arc::new(CountingEmbedder::new());
    let engine = engine(
        dir.path(),
        Arc::new(MemoryStore::new(catalogue())),
        Arc::clone(&provider) as _,
    );
    let student = StudentProfile::new("s1").with_skills(["Python", "SQL"]);

    recommend(&engine, &student).await;
    let moved = student.clone().with_location("Pune", 18.52, 73.85);
    recommend(&engine, &moved).await;

    assert_eq!(provider.single_calls(), 2);
    assert_eq!(engine.get_engine_stats().await.student_cache.invalidations, 1);
}

#[tokio::test]
async fn test_explicit_invalidation() {
    let dir = tempfile::tempdir().unwrap();
    let provider = Arc::new(CountingEmbedder::new());
    let engine = engine(
        dir.path(),
        Arc::new(MemoryStore::new(catalogue())),
        Arc::clone(&provider) as _,
    );
    let student = StudentProfile::new("s1").with_skills(["React"]);

    recommend(&engine, &student).await;
    assert!(engine.invalidate_user_cache("s1"));
    assert!(!engine.invalidate_user_cache("s1"));
    assert!(!engine.invalidate_user_cache("unknown"));

    recommend(&engine, &student).await;
    assert_eq!(provider.single_calls(), 2);
}

/// A completely different skill set is not treated as an enhancement.
#[tokio::test]
async fn test_unrelated_skills_recompute_vectors() {
    let dir = tempfile::tempdir().unwrap();
    let provider = Arc::new(CountingEmbedder::new());
    let engine = engine(
        dir.path(),
        Arc::new(MemoryStore::new(catalogue())),
        Arc::clone(&provider) as _,
    );

    recommend(&engine, &StudentProfile::new("s1").with_skills(["Python"])).await;
    recommend(
        &engine,
        &StudentProfile::new("s1").with_skills(["Photoshop", "Illustrator"]),
    )
    .await;

    assert_eq!(provider.single_calls(), 2);
}
