use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::GeoPoint;

/// Characters of the description included in the embedding text.
const DESCRIPTION_EMBED_CHARS: usize = 300;

/// Statuses that count as a live posting.
const OPEN_STATUSES: [&str; 3] = ["active", "open", "published"];

/// Normalized internship posting.
///
/// Produced from raw store documents by the engine's ingestion step; every field
/// variant has been resolved by the time a value of this type exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Internship {
    /// Store id, stringified
    pub id: String,
    /// Empty when the source document had no title
    pub title: String,
    /// Employer display name
    pub company: String,
    /// Free-text description
    pub description: String,
    /// Skills the posting asks for
    pub skills: Vec<String>,
    /// Looser requirement list, used when `skills` is empty
    pub requirements: Vec<String>,
    /// Display location, e.g. `"Pune, Maharashtra"`
    pub location: String,
    /// City name
    pub city: String,
    /// State or region name
    pub state: String,
    /// Work arrangement as written by the employer
    pub work_type: String,
    /// Whether the posting can be done remotely
    pub is_remote: bool,
    /// Monthly stipend, 0 when unpaid or unknown
    pub stipend: f64,
    /// ISO currency code of `stipend`
    pub stipend_currency: String,
    /// Duration as written, e.g. `"3 months"`
    pub duration: String,
    /// Parsed duration in months
    pub duration_months: f64,
    /// Category such as `"Data Science"`
    pub category: String,
    /// Industry sector
    pub sector: Option<String>,
    /// Where to apply
    pub apply_url: String,
    /// Whether the employer marked the posting active
    pub is_active: bool,
    /// Lifecycle status such as `"active"` or `"closed"`
    pub status: String,
    /// Promoted by the platform
    pub is_featured: bool,
    /// Employer identity has been verified
    pub is_verified: bool,
    /// Page views
    pub views: u64,
    /// Applications received
    pub applications: u64,
    /// Times saved by students
    pub saves: u64,
    /// Creation time, when known
    pub created_at: Option<DateTime<Utc>>,
    /// Geo position of the workplace
    pub location_coordinates: Option<GeoPoint>,
    /// Owning employer account
    pub employer_uid: Option<String>,
}

impl Internship {
    /// Minimal posting with defaults for everything but id and title.
    pub fn new<I: Into<String>, T: Into<String>>(id: I, title: T) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            company: "Unknown Company".to_owned(),
            description: String::new(),
            skills: Vec::new(),
            requirements: Vec::new(),
            location: "Remote".to_owned(),
            city: String::new(),
            state: String::new(),
            work_type: "WFO".to_owned(),
            is_remote: false,
            stipend: 0.0,
            stipend_currency: "INR".to_owned(),
            duration: "3 months".to_owned(),
            duration_months: 3.0,
            category: "General".to_owned(),
            sector: None,
            apply_url: "#".to_owned(),
            is_active: true,
            status: "active".to_owned(),
            is_featured: false,
            is_verified: false,
            views: 0,
            applications: 0,
            saves: 0,
            created_at: None,
            location_coordinates: None,
            employer_uid: None,
        }
    }

    /// Title for display, never empty.
    pub fn display_title(&self) -> &str {
        if self.title.trim().is_empty() {
            "Untitled Internship"
        } else {
            &self.title
        }
    }

    /// Classified work arrangement.
    pub fn work_kind(&self) -> WorkType {
        WorkType::parse(&self.work_type).unwrap_or(if self.is_remote {
            WorkType::Remote
        } else {
            WorkType::Office
        })
    }

    /// Whether this posting may appear in trending listings.
    pub fn is_listed(&self) -> bool {
        let status = self.status.trim().to_lowercase();
        let open = self.is_active || status.is_empty() || OPEN_STATUSES.contains(&status.as_str());
        open && !self.title.trim().is_empty()
    }

    /// Text embedded into the skill index.
    pub fn embedding_text(&self) -> String {
        let description: String = self
            .description
            .chars()
            .take(DESCRIPTION_EMBED_CHARS)
            .collect();
        let skills = self.skills.join(" ");

        let parts: Vec<&str> = [
            self.title.trim(),
            skills.trim(),
            description.trim(),
            self.category.trim(),
        ]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect();

        if parts.is_empty() {
            "internship opportunity".to_owned()
        } else {
            parts.join(" ")
        }
    }
}

/// Work arrangement of a posting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkType {
    /// Fully remote
    Remote,
    /// Split between home and office
    Hybrid,
    /// On site
    Office,
}

impl WorkType {
    /// Parse a free-form work type, accepting the common aliases.
    pub fn parse(value: &str) -> Option<Self> {
        let normalized = value.trim().to_lowercase().replace(['-', '_'], " ");
        match normalized.as_str() {
            "remote" | "wfh" | "work from home" => Some(Self::Remote),
            "hybrid" => Some(Self::Hybrid),
            "wfo" | "onsite" | "on site" | "office" | "in office" | "work from office" => {
                Some(Self::Office)
            }
            _ => None,
        }
    }
}
