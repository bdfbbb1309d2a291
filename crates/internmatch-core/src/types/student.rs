use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash as _, Hasher as _};

use super::GeoPoint;

/// Level assigned to a skill given without one.
pub const DEFAULT_SKILL_LEVEL: &str = "Beginner";

/// A named skill with a proficiency level.
///
/// Accepts either a bare string (`"Python"`) or an object
/// (`{"name": "Python", "level": "Advanced"}`) when deserializing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawSkill")]
pub struct Skill {
    /// Skill name as entered
    pub name: String,
    /// Proficiency such as `"Beginner"` or `"Advanced"`
    pub level: String,
}

impl Skill {
    /// Skill at the default level.
    pub fn new<T: Into<String>>(name: T) -> Self {
        Self {
            name: name.into(),
            level: DEFAULT_SKILL_LEVEL.to_owned(),
        }
    }

    /// Replace the level.
    #[must_use]
    pub fn with_level<T: Into<String>>(mut self, level: T) -> Self {
        self.level = level.into();
        self
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawSkill {
    Name(String),
    Detailed {
        name: String,
        #[serde(default)]
        level: Option<String>,
    },
}

impl From<RawSkill> for Skill {
    fn from(raw: RawSkill) -> Self {
        match raw {
            RawSkill::Name(name) => Self::new(name),
            RawSkill::Detailed { name, level } => Self {
                name,
                level: level
                    .filter(|level| !level.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_SKILL_LEVEL.to_owned()),
            },
        }
    }
}

/// One education entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Education {
    /// Degree name; entries without one are ignored
    #[serde(default)]
    pub degree: Option<String>,
    /// Major or field
    #[serde(default, alias = "field")]
    pub field_of_study: Option<String>,
    /// School or university
    #[serde(default)]
    pub institution: Option<String>,
}

/// One work experience entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Experience {
    /// Role held; entries without one are ignored
    #[serde(default)]
    pub role: Option<String>,
    /// Employer
    #[serde(default)]
    pub company: Option<String>,
}

/// One personal or academic project.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Project {
    /// Project name; entries without one are ignored
    #[serde(default)]
    pub title: Option<String>,
    /// Technologies used; a comma string in the input is kept as one entry.
    #[serde(default, deserialize_with = "string_or_list")]
    pub technologies: Vec<String>,
}

fn string_or_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrList {
        One(String),
        Many(Vec<String>),
        Missing(()),
    }

    Ok(match StringOrList::deserialize(deserializer)? {
        StringOrList::One(value) if value.trim().is_empty() => Vec::new(),
        StringOrList::One(value) => vec![value],
        StringOrList::Many(values) => values,
        StringOrList::Missing(()) => Vec::new(),
    })
}

/// Student profile as read from the student store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StudentProfile {
    /// Student id, also the vector cache key
    #[serde(alias = "_id")]
    pub id: String,
    /// Skills with levels
    #[serde(default)]
    pub skills: Vec<Skill>,
    /// Education history
    #[serde(default)]
    pub education: Vec<Education>,
    /// Work history
    #[serde(default)]
    pub experience: Vec<Experience>,
    /// Projects
    #[serde(default)]
    pub projects: Vec<Project>,
    /// Free-text career goal
    #[serde(default)]
    pub career_objective: String,
    /// Location the student searches in, e.g. a city name
    #[serde(default)]
    pub location_query: String,
    /// Geo position of the student
    #[serde(default)]
    pub location_coordinates: Option<GeoPoint>,
    /// Expected monthly stipend
    #[serde(default)]
    pub preferred_stipend: Option<f64>,
}

impl StudentProfile {
    /// Empty profile with only an id.
    pub fn new<T: Into<String>>(id: T) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Replace the skills with default-level skills named by `skills`.
    #[must_use]
    pub fn with_skills<I, S>(mut self, skills: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.skills = skills.into_iter().map(Skill::new).collect();
        self
    }

    /// Set the location query and coordinates.
    #[must_use]
    pub fn with_location<T: Into<String>>(mut self, query: T, lat: f64, lon: f64) -> Self {
        self.location_query = query.into();
        self.location_coordinates = Some(GeoPoint::new(lat, lon));
        self
    }

    /// Names of all non-blank skills, in input order.
    pub fn skill_names(&self) -> Vec<String> {
        self.skills
            .iter()
            .map(|skill| skill.name.trim())
            .filter(|name| !name.is_empty())
            .map(str::to_owned)
            .collect()
    }

    /// Extract the fields that drive vector generation.
    ///
    /// Entries without their identifying field (degree, role, project title) are dropped.
    pub fn snapshot(&self) -> ProfileSnapshot {
        let mut skills = Vec::new();
        let mut skill_levels = BTreeMap::new();
        for skill in &self.skills {
            let name = skill.name.trim();
            if name.is_empty() {
                continue;
            }
            skills.push(name.to_owned());
            skill_levels.insert(name.to_lowercase(), skill.level.clone());
        }

        let details = ProfileDetails {
            education: self
                .education
                .iter()
                .filter(|edu| edu.degree.as_deref().is_some_and(|degree| !degree.is_empty()))
                .cloned()
                .collect(),
            experience: self
                .experience
                .iter()
                .filter(|exp| exp.role.as_deref().is_some_and(|role| !role.is_empty()))
                .cloned()
                .collect(),
            projects: self
                .projects
                .iter()
                .filter(|proj| proj.title.as_deref().is_some_and(|title| !title.is_empty()))
                .cloned()
                .collect(),
            career_objective: self.career_objective.clone(),
            location_coordinates: self.location_coordinates.clone(),
            location_query: self.location_query.clone(),
            preferred_stipend: self.preferred_stipend,
        };

        ProfileSnapshot {
            skills,
            skill_levels,
            details,
        }
    }
}

/// Everything in a profile except its skills.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileDetails {
    /// Education entries that name a degree
    pub education: Vec<Education>,
    /// Experience entries that name a role
    pub experience: Vec<Experience>,
    /// Projects that have a title
    pub projects: Vec<Project>,
    /// Career objective text
    pub career_objective: String,
    /// Student coordinates
    pub location_coordinates: Option<GeoPoint>,
    /// Location search text
    pub location_query: String,
    /// Stipend expectation
    pub preferred_stipend: Option<f64>,
}

/// Point-in-time view of a profile used for caching and text generation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileSnapshot {
    /// Non-blank skill names, in input order
    pub skills: Vec<String>,
    /// Lowercased skill name to level
    pub skill_levels: BTreeMap<String, String>,
    /// Everything else that shapes the vectors
    pub details: ProfileDetails,
}

impl ProfileSnapshot {
    /// Stable hash over the non-skill portion of the profile.
    ///
    /// Any change to education, experience, projects, objective, location or stipend
    /// preference changes the hash; skill edits do not.
    pub fn non_skill_hash(&self) -> String {
        let encoded = serde_json::to_string(&self.details).unwrap_or_default();
        let mut hasher = DefaultHasher::new();
        encoded.hash(&mut hasher);
        format!("{:016x}", hasher.finish())
    }

    /// Free text describing the student, used for the skill embedding.
    pub fn embedding_text(&self) -> String {
        let mut parts: Vec<&str> = self.skills.iter().map(String::as_str).collect();

        for edu in &self.details.education {
            parts.extend(edu.degree.as_deref());
            parts.extend(edu.field_of_study.as_deref().filter(|field| !field.is_empty()));
        }
        for exp in &self.details.experience {
            parts.extend(exp.role.as_deref());
        }
        for proj in &self.details.projects {
            parts.extend(proj.title.as_deref());
            parts.extend(proj.technologies.iter().map(String::as_str));
        }
        if !self.details.career_objective.is_empty() {
            parts.push(&self.details.career_objective);
        }

        if parts.is_empty() {
            "student seeking internship".to_owned()
        } else {
            parts.join(" ")
        }
    }

    /// Level recorded for a skill, looked up case-insensitively.
    pub fn level_of(&self, skill: &str) -> Option<&str> {
        self.skill_levels
            .get(&skill.to_lowercase())
            .map(String::as_str)
    }
}
