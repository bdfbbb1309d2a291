//! Domain types shared by the engine and its callers.

mod internship;
mod student;

pub use internship::{Internship, WorkType};
pub use student::{
    DEFAULT_SKILL_LEVEL, Education, Experience, ProfileDetails, ProfileSnapshot, Project, Skill,
    StudentProfile,
};

use serde::{Deserialize, Serialize};

/// GeoJSON point. Coordinates are stored `[longitude, latitude]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// GeoJSON geometry type, always `"Point"`
    #[serde(rename = "type", default = "point_kind")]
    pub kind: String,
    /// `[longitude, latitude]`
    pub coordinates: [f64; 2],
}

fn point_kind() -> String {
    "Point".to_owned()
}

impl GeoPoint {
    /// Point at `lat`, `lon` in degrees.
    pub fn new(lat: f64, lon: f64) -> Self {
        Self {
            kind: point_kind(),
            coordinates: [lon, lat],
        }
    }

    /// Latitude in degrees.
    pub fn lat(&self) -> f64 {
        self.coordinates[1]
    }

    /// Longitude in degrees.
    pub fn lon(&self) -> f64 {
        self.coordinates[0]
    }
}
