//! End-to-end recommendation requests against the sample catalogue.

use std::sync::Arc;

use internmatch_core::{DimensionWeights, Skill, StudentProfile};
use internmatch_engine::scoring::MatchQuality;
use internmatch_engine::{MemoryStore, RecommendationEngine, RecommendationFilters};

use crate::support::{CountingEmbedder, PoisonedEmbedder, catalogue, config, engine};

fn data_student() -> StudentProfile {
    let mut student = StudentProfile::new("student-data");
    student.skills = vec![
        Skill::new("Python").with_level("Advanced"),
        Skill::new("Excel"),
    ];
    student
}

fn catalogue_engine(dir: &tempfile::TempDir) -> RecommendationEngine {
    engine(
        dir.path(),
        Arc::new(MemoryStore::new(catalogue())),
        Arc::new(CountingEmbedder::new()),
    )
}

/// The posting sharing the student's skills ranks first and is explained.
#[tokio::test]
async fn test_best_skill_match_ranks_first() {
    let dir = tempfile::tempdir().unwrap();
    let engine = catalogue_engine(&dir);

    let results = engine
        .get_recommendations_for_student(
            &data_student(),
            4,
            &RecommendationFilters::default(),
            None,
        )
        .await
        .unwrap();

    assert_eq!(results.len(), 4);
    assert!(
        results
            .windows(2)
            .all(|pair| pair[0].match_percentage >= pair[1].match_percentage),
        "results must be sorted by match percentage"
    );

    let top = &results[0];
    assert_eq!(top.internship.id, "data-analyst");
    assert!(!top.is_fallback);
    assert_eq!(top.internship.stipend, 15_000.0);
    assert!(top.internship.is_remote);

    let explanation = top.explanation.as_ref().unwrap();
    assert!((explanation.skill_analysis.match_percentage - 50.0).abs() < 1e-9);
    assert_eq!(explanation.skill_analysis.missing_skills, vec!["SQL"]);
    assert_eq!(explanation.skill_analysis.extra_skills, vec!["Excel"]);
    assert_eq!(top.match_reasons, explanation.recommendation_reasons);
    assert_eq!(
        explanation.match_quality,
        MatchQuality::from_percentage(top.match_percentage, &engine.config().matching)
    );
}

/// A candidate whose skills cannot be embedded keeps its place with a minimal explanation.
#[tokio::test]
async fn test_failed_explanation_keeps_candidate() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(
        dir.path(),
        Arc::new(MemoryStore::new(catalogue())),
        Arc::new(PoisonedEmbedder::new("sql")),
    );

    let results = engine
        .get_recommendations_for_student(
            &data_student(),
            4,
            &RecommendationFilters::default(),
            None,
        )
        .await
        .unwrap();
    assert_eq!(results.len(), 4);

    let analyst = results
        .iter()
        .find(|item| item.internship.id == "data-analyst")
        .unwrap();
    assert!(!analyst.is_fallback);
    assert_eq!(
        analyst.match_reasons,
        vec![format!("Match score: {:.0}%", analyst.match_percentage)]
    );
    let minimal = analyst.explanation.as_ref().unwrap();
    assert_eq!(minimal.summary, "Good match based on your profile");
    assert_eq!(minimal.skill_analysis.total_required, 0);

    let web = results
        .iter()
        .find(|item| item.internship.id == "web-dev")
        .unwrap();
    let full = web.explanation.as_ref().unwrap();
    assert_eq!(full.skill_analysis.total_required, 3);
    assert_ne!(web.match_reasons, vec![format!("Match score: {:.0}%", web.match_percentage)]);
}

/// Every result clears the configured threshold and `top_k` caps the list.
#[tokio::test]
async fn test_top_k_and_threshold() {
    let dir = tempfile::tempdir().unwrap();
    let engine = catalogue_engine(&dir);
    let threshold = engine.config().matching.min_match_threshold;

    let results = engine
        .get_recommendations_for_student(
            &data_student(),
            2,
            &RecommendationFilters::default(),
            None,
        )
        .await
        .unwrap();

    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|item| item.match_percentage >= threshold));
}

#[tokio::test]
async fn test_hard_filters_apply() {
    let dir = tempfile::tempdir().unwrap();
    let engine = catalogue_engine(&dir);
    let student = data_student();

    let remote = RecommendationFilters {
        work_type: Some("remote".to_owned()),
        ..RecommendationFilters::default()
    };
    let results = engine
        .get_recommendations_for_student(&student, 10, &remote, None)
        .await
        .unwrap();
    let mut ids: Vec<&str> = results.iter().map(|item| item.internship.id.as_str()).collect();
    ids.sort_unstable();
    assert_eq!(ids, vec!["data-analyst", "marketing"]);

    let city = RecommendationFilters {
        location: Some("bengaluru".to_owned()),
        ..RecommendationFilters::default()
    };
    let results = engine
        .get_recommendations_for_student(&student, 10, &city, None)
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].internship.id, "web-dev");
}

/// Filters nothing satisfies fall back to the unfiltered trending list.
#[tokio::test]
async fn test_unsatisfiable_filters_serve_unfiltered_trending() {
    let dir = tempfile::tempdir().unwrap();
    let engine = catalogue_engine(&dir);

    let rich = RecommendationFilters {
        min_stipend: Some(100_000.0),
        ..RecommendationFilters::default()
    };
    let results = engine
        .get_recommendations_for_student(&data_student(), 5, &rich, None)
        .await
        .unwrap();

    let ids: Vec<&str> = results.iter().map(|item| item.internship.id.as_str()).collect();
    assert_eq!(ids, vec!["designer", "web-dev", "data-analyst", "marketing"]);
    assert!(results.iter().all(|item| item.is_fallback));
    assert!(results.iter().all(|item| item.explanation.is_none()));
}

#[tokio::test]
async fn test_fallback_serves_trending() {
    let dir = tempfile::tempdir().unwrap();
    let mut strict = config(dir.path());
    strict.matching.min_match_threshold = 99.5;
    let engine = RecommendationEngine::new(
        strict,
        Arc::new(MemoryStore::new(catalogue())),
        Arc::new(CountingEmbedder::new()),
    )
    .unwrap();

    let results = engine
        .get_recommendations_for_student(
            &data_student(),
            3,
            &RecommendationFilters::default(),
            None,
        )
        .await
        .unwrap();

    let ids: Vec<&str> = results.iter().map(|item| item.internship.id.as_str()).collect();
    assert_eq!(ids, vec!["designer", "web-dev", "data-analyst"]);
    for item in &results {
        assert!(item.is_fallback);
        assert_eq!(item.match_percentage, 30.0);
        assert!(item.explanation.is_none());
        assert_eq!(item.match_reasons, vec!["Trending opportunity", "High engagement"]);
    }
}

/// Caller weights replace the defaults for that request.
#[tokio::test]
async fn test_custom_weights_override_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let engine = catalogue_engine(&dir);
    let location_only = DimensionWeights {
        skills: 0.0,
        location: 1.0,
        stipend: 0.0,
        timeline: 0.0,
    };

    let results = engine
        .get_recommendations_for_student(
            &data_student(),
            4,
            &RecommendationFilters::default(),
            Some(location_only),
        )
        .await
        .unwrap();

    assert_eq!(results.len(), 4);
    for item in &results {
        // No posting or student carries coordinates, so every location vector coincides.
        assert!((item.match_percentage - 100.0).abs() < 0.01, "{}", item.match_percentage);
    }
}

#[tokio::test]
async fn test_trending_listing() {
    let dir = tempfile::tempdir().unwrap();
    let engine = catalogue_engine(&dir);
    assert!(engine.initialize().await);

    let trending = engine.get_trending_internships(2).await.unwrap();
    let ids: Vec<&str> = trending.iter().map(|item| item.id.as_str()).collect();
    assert_eq!(ids, vec!["designer", "web-dev"]);
}

#[tokio::test]
async fn test_recommendation_json_shape() {
    let dir = tempfile::tempdir().unwrap();
    let engine = catalogue_engine(&dir);

    let results = engine
        .get_recommendations_for_student(
            &data_student(),
            1,
            &RecommendationFilters::default(),
            None,
        )
        .await
        .unwrap();
    let value = serde_json::to_value(&results[0]).unwrap();

    assert_eq!(value["id"], "data-analyst");
    assert_eq!(value["title"], "Data Analyst Intern");
    assert!(value["match_percentage"].is_number());
    assert!(value["score_breakdown"]["skills"].is_number());
    assert_eq!(value["is_fallback"], false);
    assert!(value["explanation"]["skill_analysis"].is_object());
}
