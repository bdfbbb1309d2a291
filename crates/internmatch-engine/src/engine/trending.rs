//! Popularity ranking used for trending listings and empty-result fallback.

use std::cmp::Ordering;
use std::sync::Arc;

use internmatch_core::Internship;
use internmatch_core::config::ScoringConfig;
use tracing::debug;

use super::Recommendation;
use super::filters::PreparedFilters;
use crate::scoring::ScoreBreakdown;

/// Featured first, then views, applications, saves and recency, all descending.
fn popularity(first: &Internship, second: &Internship) -> Ordering {
    second
        .is_featured
        .cmp(&first.is_featured)
        .then(second.views.cmp(&first.views))
        .then(second.applications.cmp(&first.applications))
        .then(second.saves.cmp(&first.saves))
        .then(second.created_at.cmp(&first.created_at))
        .then_with(|| first.id.cmp(&second.id))
}

/// Listed postings ordered by popularity, at most `limit`.
pub fn rank_trending<'rec, I>(records: I, limit: usize) -> Vec<Arc<Internship>>
where
    I: IntoIterator<Item = &'rec Arc<Internship>>,
{
    let mut listed: Vec<Arc<Internship>> = records
        .into_iter()
        .filter(|record| record.is_listed())
        .cloned()
        .collect();
    listed.sort_by(|first, second| popularity(first, second));
    listed.truncate(limit);
    listed
}

/// Trending postings shaped as fallback recommendations.
///
/// Postings that satisfy `filters` are preferred; when none do, the unfiltered
/// trending list is served so a non-empty collection never yields nothing.
pub fn fallback_recommendations<'rec, I>(
    records: I,
    filters: &PreparedFilters,
    limit: usize,
    scoring: &ScoringConfig,
) -> Vec<Recommendation>
where
    I: IntoIterator<Item = &'rec Arc<Internship>>,
{
    let records: Vec<&Arc<Internship>> = records.into_iter().collect();
    let mut ranked = rank_trending(
        records.iter().copied().filter(|record| filters.passes(record)),
        limit,
    );
    if ranked.is_empty() && !filters.is_empty() {
        debug!("No trending posting satisfies the filters, serving unfiltered trending");
        ranked = rank_trending(records, limit);
    }

    ranked
        .into_iter()
        .map(|internship| fallback_recommendation(&internship, scoring))
        .collect()
}

fn fallback_recommendation(internship: &Internship, scoring: &ScoringConfig) -> Recommendation {
    let percentage = scoring.fallback_match_percentage;
    Recommendation {
        internship: internship.clone(),
        match_percentage: percentage,
        score_breakdown: ScoreBreakdown::scaled(percentage, &scoring.default_weights),
        match_reasons: vec![
            "Trending opportunity".to_owned(),
            "High engagement".to_owned(),
        ],
        explanation: None,
        is_fallback: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::filters::RecommendationFilters;
    use chrono::{TimeZone as _, Utc};

    fn posting(id: &str, featured: bool, views: u64) -> Arc<Internship> {
        let mut internship = Internship::new(id, format!("Posting {id}"));
        internship.is_featured = featured;
        internship.views = views;
        Arc::new(internship)
    }

    #[test]
    fn test_featured_then_engagement() {
        let records = vec![
            posting("plain-popular", false, 500),
            posting("featured", true, 1),
            posting("plain", false, 10),
        ];
        let ranked: Vec<String> = rank_trending(&records, 10)
            .iter()
            .map(|record| record.id.clone())
            .collect();
        assert_eq!(ranked, vec!["featured", "plain-popular", "plain"]);
    }

    #[test]
    fn test_unlisted_are_skipped_and_limit_applies() {
        let mut closed = Internship::new("closed", "Closed");
        closed.is_active = false;
        closed.status = "closed".to_owned();
        let untitled = Internship::new("untitled", "");

        let records = vec![
            Arc::new(closed),
            Arc::new(untitled),
            posting("a", false, 3),
            posting("b", false, 2),
        ];
        let ranked = rank_trending(&records, 1);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].id, "a");
    }

    #[test]
    fn test_recency_breaks_ties() {
        let mut older = Internship::new("older", "Older");
        older.created_at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single();
        let mut newer = Internship::new("newer", "Newer");
        newer.created_at = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).single();

        let records = vec![Arc::new(older), Arc::new(newer)];
        assert_eq!(rank_trending(&records, 2)[0].id, "newer");
    }

    #[test]
    fn test_fallback_respects_filters() {
        let mut remote = Internship::new("remote", "Remote role");
        remote.is_remote = true;
        remote.work_type = "Remote".to_owned();
        let records = vec![Arc::new(remote), posting("office", true, 100)];

        let filters = RecommendationFilters {
            location: Some("remote".to_owned()),
            ..RecommendationFilters::default()
        };
        let scoring = ScoringConfig::default();
        let fallback = fallback_recommendations(&records, &filters.prepare(), 5, &scoring);

        assert_eq!(fallback.len(), 1);
        let item = &fallback[0];
        assert_eq!(item.internship.id, "remote");
        assert!(item.is_fallback);
        assert_eq!(item.match_percentage, 30.0);
        assert_eq!(item.score_breakdown.skills, 15.0);
        assert_eq!(item.match_reasons, vec!["Trending opportunity", "High engagement"]);
    }

    #[test]
    fn test_unsatisfiable_filters_serve_unfiltered_trending() {
        let records = vec![
            posting("quiet", false, 5),
            posting("featured", true, 1),
            posting("busy", false, 50),
        ];
        let filters = RecommendationFilters {
            min_stipend: Some(100_000.0),
            ..RecommendationFilters::default()
        };
        let scoring = ScoringConfig::default();
        let fallback = fallback_recommendations(&records, &filters.prepare(), 2, &scoring);

        let ids: Vec<&str> = fallback.iter().map(|item| item.internship.id.as_str()).collect();
        assert_eq!(ids, vec!["featured", "busy"]);
        assert!(fallback.iter().all(|item| item.is_fallback));
    }

    #[test]
    fn test_fallback_over_no_listed_postings_is_empty() {
        let mut closed = Internship::new("closed", "Closed");
        closed.is_active = false;
        closed.status = "closed".to_owned();
        let records = vec![Arc::new(closed)];
        let filters = RecommendationFilters {
            location: Some("remote".to_owned()),
            ..RecommendationFilters::default()
        };
        let fallback =
            fallback_recommendations(&records, &filters.prepare(), 5, &ScoringConfig::default());
        assert!(fallback.is_empty());
    }
}
