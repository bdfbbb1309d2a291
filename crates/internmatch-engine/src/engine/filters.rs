//! Caller-supplied recommendation filters.

use internmatch_core::Internship;
use internmatch_core::config::ScoringConfig;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::ingest::parse_duration;

/// Filter duration labels and the months they stand for.
const DURATION_MONTHS: [(&str, f64); 12] = [
    ("45 days", 1.5),
    ("45 day", 1.5),
    ("1 month", 1.0),
    ("1 months", 1.0),
    ("2 months", 2.0),
    ("2 month", 2.0),
    ("3 months", 3.0),
    ("3 month", 3.0),
    ("6 months", 6.0),
    ("6 month", 6.0),
    ("12 months", 12.0),
    ("12 month", 12.0),
];

/// Allowed distance in months between a duration filter and a posting.
const DURATION_TOLERANCE: f64 = 0.5;

const LOCATION_WILDCARDS: [&str; 2] = ["all", "all locations"];

/// Optional constraints on recommended postings.
///
/// Blank strings and zero stipends count as "not set".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommendationFilters {
    /// City, state or location text; `remote` and `all` are special
    pub location: Option<String>,
    /// Comma-separated list; a posting matching any entry passes
    pub work_type: Option<String>,
    /// Lowest acceptable stipend
    pub min_stipend: Option<f64>,
    /// Highest acceptable stipend
    pub max_stipend: Option<f64>,
    /// Duration label such as `3 months` or `45 days`
    pub duration: Option<String>,
    /// Substring of the posting category
    pub category: Option<String>,
    /// Free text matched against title, company, description, category and skills
    pub search: Option<String>,
}

fn set(value: Option<&String>) -> Option<String> {
    value
        .map(|value| value.trim().to_lowercase())
        .filter(|value| !value.is_empty())
}

fn set_amount(value: Option<f64>) -> Option<f64> {
    value.filter(|amount| amount.is_finite() && *amount > 0.0)
}

fn months_for(filter: &str) -> Option<f64> {
    DURATION_MONTHS
        .iter()
        .find(|(label, _)| *label == filter)
        .map(|(_, months)| *months)
        .or_else(|| parse_duration(filter))
}

fn months_close(filter: &str, internship: &Internship) -> bool {
    months_for(filter)
        .is_some_and(|months| (months - internship.duration_months).abs() <= DURATION_TOLERANCE)
}

/// Lowercased, non-empty location fields of a posting.
fn place_fields(internship: &Internship) -> Vec<String> {
    [&internship.location, &internship.city, &internship.state]
        .into_iter()
        .map(|field| field.trim().to_lowercase())
        .filter(|field| !field.is_empty())
        .collect()
}

/// Whether any comma-separated part of `filter` appears in `field`.
fn part_matches(filter: &str, field: &str) -> bool {
    filter
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .any(|part| field.contains(part))
}

impl RecommendationFilters {
    /// True when no filter is set.
    pub fn is_empty(&self) -> bool {
        self.prepare().is_empty()
    }

    /// Normalize every filter once so a request can test many postings.
    pub fn prepare(&self) -> PreparedFilters {
        let duration = set(self.duration.as_ref());
        let duration_pattern = duration
            .as_deref()
            .and_then(|label| Regex::new(&format!(r"\b{}\b", regex::escape(label))).ok());
        PreparedFilters {
            location: set(self.location.as_ref()),
            work_type: set(self.work_type.as_ref()),
            min_stipend: set_amount(self.min_stipend),
            max_stipend: set_amount(self.max_stipend),
            duration,
            duration_pattern,
            category: set(self.category.as_ref()),
            search: set(self.search.as_ref()),
        }
    }
}

/// Filters normalized for one request, see [`RecommendationFilters::prepare`].
///
/// Filters act twice: as a soft boost on the skill score while ranking, and as a
/// strict pass over the ranked candidates.
#[derive(Debug, Clone, Default)]
pub struct PreparedFilters {
    location: Option<String>,
    work_type: Option<String>,
    min_stipend: Option<f64>,
    max_stipend: Option<f64>,
    duration: Option<String>,
    /// Whole-word match of `duration`
    duration_pattern: Option<Regex>,
    category: Option<String>,
    search: Option<String>,
}

impl PreparedFilters {
    /// True when no filter is set.
    pub fn is_empty(&self) -> bool {
        self.location.is_none()
            && self.work_type.is_none()
            && self.min_stipend.is_none()
            && self.max_stipend.is_none()
            && self.duration.is_none()
            && self.category.is_none()
            && self.search.is_none()
    }

    /// Multiplier for the skill score from loosely matching the ranking filters.
    ///
    /// Location, work type, stipend bounds and duration take part; category and search
    /// only act in [`Self::passes`].
    pub fn filter_boost(&self, internship: &Internship, scoring: &ScoringConfig) -> f64 {
        let mut active = 0u32;
        let mut matched = 0u32;
        let mut check = |is_match: bool| {
            active += 1;
            if is_match {
                matched += 1;
            }
        };

        if let Some(location) = &self.location {
            check(if location == "remote" {
                internship.is_remote
            } else {
                place_fields(internship).iter().any(|field| {
                    field.contains(location.as_str())
                        || location.contains(field.as_str())
                        || part_matches(location, field)
                })
            });
        }
        if let Some(work_type) = &self.work_type {
            let posting = internship.work_type.to_lowercase();
            check(
                (!posting.is_empty()
                    && (posting.contains(work_type.as_str()) || work_type.contains(&posting)))
                    || (work_type.contains("remote") && internship.is_remote),
            );
        }
        if let Some(min) = self.min_stipend {
            check(internship.stipend >= min);
        }
        if let Some(max) = self.max_stipend {
            check(internship.stipend <= max);
        }
        if let Some(duration) = &self.duration {
            check(
                internship.duration.to_lowercase().contains(duration.as_str())
                    || months_close(duration, internship),
            );
        }

        if active == 0 {
            return 1.0;
        }
        let ratio = f64::from(matched) / f64::from(active);
        if ratio >= 0.75 {
            scoring.filter_match_boost
        } else if ratio >= 0.5 {
            scoring.filter_partial_boost
        } else {
            1.0
        }
    }

    /// Strict check of every set filter.
    pub fn passes(&self, internship: &Internship) -> bool {
        self.location_passes(internship)
            && self.work_type_passes(internship)
            && self.min_stipend.is_none_or(|min| internship.stipend >= min)
            && self.max_stipend.is_none_or(|max| internship.stipend <= max)
            && self.duration_passes(internship)
            && self.category.as_ref().is_none_or(|category| {
                internship.category.to_lowercase().contains(category.as_str())
            })
            && self.search_passes(internship)
    }

    fn location_passes(&self, internship: &Internship) -> bool {
        let Some(location) = &self.location else {
            return true;
        };
        if LOCATION_WILDCARDS.contains(&location.as_str()) {
            return true;
        }
        if location == "remote" {
            return internship.is_remote;
        }
        place_fields(internship)
            .iter()
            .any(|field| field.contains(location.as_str()) || part_matches(location, field))
    }

    fn work_type_passes(&self, internship: &Internship) -> bool {
        let Some(requested) = &self.work_type else {
            return true;
        };
        let posting = internship.work_type.trim().to_uppercase();

        requested
            .split(',')
            .map(|entry| entry.trim().to_uppercase())
            .filter(|entry| !entry.is_empty())
            .any(|entry| {
                let contains_any = |needles: &[&str]| needles.iter().any(|needle| posting.contains(needle));
                (!posting.is_empty() && (posting == entry || posting.contains(&entry)))
                    || match entry.as_str() {
                        "REMOTE" => internship.is_remote,
                        "WFH" | "WORK FROM HOME" => contains_any(&["WFH", "HOME"]),
                        "WFO" | "WORK FROM OFFICE" | "ONSITE" | "ON-SITE" => {
                            contains_any(&["WFO", "OFFICE", "ONSITE"])
                        }
                        "HYBRID" => contains_any(&["HYBRID"]),
                        _ => false,
                    }
            })
    }

    fn duration_passes(&self, internship: &Internship) -> bool {
        let Some(duration) = &self.duration else {
            return true;
        };
        let posting = internship.duration.trim().to_lowercase();
        if posting == *duration {
            return true;
        }
        let word_match = self
            .duration_pattern
            .as_ref()
            .is_some_and(|pattern| pattern.is_match(&posting));
        word_match || months_close(duration, internship)
    }

    fn search_passes(&self, internship: &Internship) -> bool {
        let Some(search) = &self.search else {
            return true;
        };
        [
            &internship.title,
            &internship.company,
            &internship.description,
            &internship.category,
        ]
        .into_iter()
        .chain(&internship.skills)
        .any(|field| field.to_lowercase().contains(search.as_str()))
    }
}
