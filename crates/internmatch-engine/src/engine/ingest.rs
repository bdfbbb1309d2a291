//! Raw store documents to normalized internships and their index vectors.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDateTime, Utc};
use internmatch_core::{GeoPoint, Internship, ProfileSnapshot, WorkType};
use regex::Regex;
use serde_json::{Map, Value};

use crate::embedding::{Embedding, l2_normalize};
use crate::profile_cache::StudentVectors;

/// Duration assumed when a posting does not state one.
pub const DEFAULT_DURATION_MONTHS: f64 = 3.0;
/// Stipend assumed for students without a stated preference.
pub const DEFAULT_STUDENT_STIPEND: f64 = 10_000.0;
/// Stipend mapped to the top of the stipend scale.
const STIPEND_SCALE: f64 = 50_000.0;
const STUDENT_TIMELINE_PREFERENCE: f32 = 0.3;
const DEFAULT_LOCATION: [f32; 2] = [0.5, 0.5];

/// First number in a duration string
static NUMBER: LazyLock<Regex> = LazyLock::new(|| match Regex::new(r"\d+\.?\d*") {
    Ok(regex) => regex,
    Err(err) => panic!("Duration regex is invalid: {err}"),
});

/// A normalized posting plus any embedding stored alongside it.
#[derive(Debug, Clone)]
pub struct NormalizedDocument {
    /// The resolved posting
    pub internship: Internship,
    /// Precomputed embedding, when the document carries one
    pub embedding: Option<Embedding>,
}

/// Convert free-form duration text into months.
///
/// The first number in the text is scaled by the unit it mentions (weeks, days,
/// months, years); text without a unit yields the bare number.
pub fn parse_duration(text: &str) -> Option<f64> {
    let lowered = text.trim().to_lowercase();
    if lowered.is_empty() {
        return None;
    }
    let value: f64 = NUMBER.find(&lowered)?.as_str().parse().ok()?;

    Some(if lowered.contains("week") {
        value / 4.0
    } else if lowered.contains("day") {
        value / 30.0
    } else if lowered.contains("month") {
        value
    } else if lowered.contains("year") {
        value * 12.0
    } else {
        value
    })
}

/// Normalized `(lat, lon)` pair on the grid the location index uses.
pub fn location_vector(coordinates: Option<&GeoPoint>) -> [f32; 2] {
    coordinates.map_or(DEFAULT_LOCATION, |point| {
        [
            ((point.lat() - 8.0) / 29.0) as f32,
            ((point.lon() - 68.0) / 29.0) as f32,
        ]
    })
}

/// Stipend on a `[0, 1]` scale.
pub fn stipend_value(stipend: f64) -> f32 {
    (stipend / STIPEND_SCALE).clamp(0.0, 1.0) as f32
}

/// Duration bucket: short, standard or long.
pub fn timeline_value(duration_months: f64) -> f32 {
    if duration_months <= 1.0 {
        0.2
    } else if duration_months <= 3.0 {
        0.5
    } else {
        0.8
    }
}

/// Query vectors for a student given the embedding of their profile text.
pub fn student_vectors(snapshot: &ProfileSnapshot, mut skill_vector: Embedding) -> StudentVectors {
    l2_normalize(&mut skill_vector);

    let mut location = location_vector(snapshot.details.location_coordinates.as_ref()).to_vec();
    l2_normalize(&mut location);

    let stipend = snapshot
        .details
        .preferred_stipend
        .filter(|amount| *amount > 0.0)
        .unwrap_or(DEFAULT_STUDENT_STIPEND);

    StudentVectors {
        skill_vector,
        location_vector: location,
        stipend_vector: vec![stipend_value(stipend)],
        timeline_vector: vec![STUDENT_TIMELINE_PREFERENCE],
    }
}

fn text<'doc>(doc: &'doc Map<String, Value>, key: &str) -> Option<&'doc str> {
    doc.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn flag(doc: &Map<String, Value>, key: &str) -> Option<bool> {
    doc.get(key).and_then(Value::as_bool)
}

fn count(doc: &Map<String, Value>, key: &str) -> u64 {
    match doc.get(key) {
        Some(Value::Number(number)) => number
            .as_u64()
            .or_else(|| number.as_f64().filter(|value| *value > 0.0).map(|value| value as u64))
            .unwrap_or(0),
        Some(Value::String(value)) => value.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

/// Document id from `_id` or `id`, as a plain string, number, or `{"$oid": ..}`.
fn document_id(doc: &Map<String, Value>) -> Option<String> {
    let raw = doc.get("_id").or_else(|| doc.get("id"))?;
    match raw {
        Value::String(id) if !id.trim().is_empty() => Some(id.trim().to_owned()),
        Value::Number(id) => Some(id.to_string()),
        Value::Object(object) => object
            .get("$oid")
            .and_then(Value::as_str)
            .map(str::to_owned),
        _ => None,
    }
}

/// Skills or requirements given as a list or a comma-separated string.
fn string_list(doc: &Map<String, Value>, key: &str) -> Vec<String> {
    match doc.get(key) {
        Some(Value::String(joined)) => joined
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_owned)
            .collect(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(name) => Some(name.trim().to_owned()),
                Value::Object(object) => object
                    .get("name")
                    .and_then(Value::as_str)
                    .map(|name| name.trim().to_owned()),
                _ => None,
            })
            .filter(|item| !item.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}

/// Stipend as a number or a string such as `"₹15,000"`.
fn stipend(doc: &Map<String, Value>) -> f64 {
    match doc.get("stipend") {
        Some(Value::Number(number)) => number.as_f64().unwrap_or(0.0),
        Some(Value::String(raw)) => raw
            .replace(['₹', ','], "")
            .trim()
            .parse()
            .unwrap_or(0.0),
        _ => 0.0,
    }
}

fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(raw) => DateTime::parse_from_rfc3339(raw)
            .map(|parsed| parsed.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                    .ok()
                    .map(|naive| naive.and_utc())
            }),
        Value::Number(millis) => millis.as_i64().and_then(DateTime::from_timestamp_millis),
        Value::Object(object) => object.get("$date").and_then(|date| match date {
            Value::Object(long) => long
                .get("$numberLong")
                .and_then(Value::as_str)
                .and_then(|millis| millis.parse().ok())
                .and_then(DateTime::from_timestamp_millis),
            other => parse_timestamp(other),
        }),
        _ => None,
    }
}

fn embedding(doc: &Map<String, Value>) -> Option<Embedding> {
    let values = doc.get("embedding")?.as_array()?;
    if values.is_empty() {
        return None;
    }
    values
        .iter()
        .map(|value| value.as_f64().map(|number| number as f32))
        .collect()
}

/// Resolve the field-name variants of a raw store document.
///
/// Returns `None` for documents that are not objects or have no usable id.
pub fn normalize_document(raw: &Value) -> Option<NormalizedDocument> {
    let doc = raw.as_object()?;
    let id = document_id(doc)?;

    let city = text(doc, "city").unwrap_or_default().to_owned();
    let state = text(doc, "state").unwrap_or_default().to_owned();
    let location = text(doc, "location").map_or_else(
        || {
            let parts: Vec<&str> = [city.as_str(), state.as_str()]
                .into_iter()
                .filter(|part| !part.is_empty())
                .collect();
            if parts.is_empty() {
                "Remote".to_owned()
            } else {
                parts.join(", ")
            }
        },
        str::to_owned,
    );

    let work_type = text(doc, "work_type").map_or_else(
        || {
            if flag(doc, "is_remote").unwrap_or(false) {
                "Remote"
            } else if flag(doc, "is_wfh").unwrap_or(false) {
                "WFH"
            } else {
                "WFO"
            }
            .to_owned()
        },
        str::to_owned,
    );
    let is_remote = WorkType::parse(&work_type) == Some(WorkType::Remote);

    let duration_months = doc
        .get("duration_months")
        .and_then(Value::as_f64)
        .or_else(|| text(doc, "duration").and_then(parse_duration))
        .filter(|months| *months > 0.0)
        .unwrap_or(DEFAULT_DURATION_MONTHS);
    let duration = text(doc, "duration")
        .map_or_else(|| format!("{duration_months} months"), str::to_owned);

    let sector = text(doc, "sector").map(str::to_owned);
    let category = text(doc, "category")
        .map(str::to_owned)
        .or_else(|| sector.clone())
        .unwrap_or_else(|| "General".to_owned());

    let mut internship = Internship::new(id, text(doc, "title").unwrap_or_default());
    internship.company = text(doc, "company")
        .or_else(|| text(doc, "organisation_name"))
        .unwrap_or("Unknown Company")
        .to_owned();
    internship.description = text(doc, "description").unwrap_or_default().to_owned();
    internship.skills = string_list(doc, "skills");
    internship.requirements = string_list(doc, "requirements");
    internship.location = location;
    internship.city = city;
    internship.state = state;
    internship.work_type = work_type;
    internship.is_remote = is_remote;
    internship.stipend = stipend(doc);
    internship.stipend_currency = text(doc, "stipend_currency").unwrap_or("INR").to_owned();
    internship.duration = duration;
    internship.duration_months = duration_months;
    internship.category = category;
    internship.sector = sector;
    internship.apply_url = text(doc, "apply_url")
        .or_else(|| text(doc, "application_link"))
        .unwrap_or("#")
        .to_owned();
    internship.is_active = flag(doc, "is_active").unwrap_or(true);
    internship.status = text(doc, "status").unwrap_or("active").to_owned();
    internship.is_featured = flag(doc, "is_featured").unwrap_or(false);
    internship.is_verified = flag(doc, "is_verified").unwrap_or(false);
    internship.views = count(doc, "views");
    internship.applications = count(doc, "applications");
    internship.saves = count(doc, "saves");
    internship.created_at = doc.get("created_at").and_then(parse_timestamp);
    internship.location_coordinates = doc
        .get("location_coordinates")
        .and_then(|coords| serde_json::from_value(coords.clone()).ok());
    internship.employer_uid = text(doc, "employer_uid").map(str::to_owned);

    Some(NormalizedDocument {
        internship,
        embedding: embedding(doc),
    })
}
