//! Dimension scores, weights resolution, and quality tiers.

use std::path::Path;

use internmatch_core::config::MatchingConfig;
use internmatch_core::{DimensionWeights, Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::fs as async_fs;

/// Clamp a score into `[0, 1]`, mapping NaN to 0.
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Convert a unit score to a percentage rounded to `decimals` places.
pub fn to_percentage(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (clamp_unit(value) * 100.0 * scale).round() / scale
}

/// Per-dimension scores of one candidate, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DimensionScores {
    /// Skill similarity, floored and boosted
    pub skills: f64,
    /// Location similarity
    pub location: f64,
    /// Stipend fit
    pub stipend: f64,
    /// Timeline fit
    pub timeline: f64,
}

impl DimensionScores {
    /// `Σ score × weight`.
    pub fn weighted(&self, weights: &DimensionWeights) -> f64 {
        self.skills * weights.skills
            + self.location * weights.location
            + self.stipend * weights.stipend
            + self.timeline * weights.timeline
    }

    /// Percentages rounded to one decimal.
    pub fn breakdown(&self) -> ScoreBreakdown {
        ScoreBreakdown {
            skills: to_percentage(self.skills, 1),
            location: to_percentage(self.location, 1),
            stipend: to_percentage(self.stipend, 1),
            timeline: to_percentage(self.timeline, 1),
        }
    }
}

/// Dimension scores with their aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchScore {
    /// Unweighted per-dimension scores
    pub dimensions: DimensionScores,
    /// Weighted aggregate in `[0, 1]`
    pub weighted_score: f64,
}

impl MatchScore {
    /// Weigh `dimensions` with `weights`.
    pub fn new(dimensions: DimensionScores, weights: &DimensionWeights) -> Self {
        Self {
            dimensions,
            weighted_score: clamp_unit(dimensions.weighted(weights)),
        }
    }

    /// Aggregate as a percentage with two decimals.
    pub fn match_percentage(&self) -> f64 {
        to_percentage(self.weighted_score, 2)
    }
}

/// Per-dimension percentages shown to the student.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    /// Skill percentage
    pub skills: f64,
    /// Location percentage
    pub location: f64,
    /// Stipend percentage
    pub stipend: f64,
    /// Timeline percentage
    pub timeline: f64,
}

impl ScoreBreakdown {
    /// Breakdown that splits `percentage` across dimensions by weight.
    pub fn scaled(percentage: f64, weights: &DimensionWeights) -> Self {
        let round = |value: f64| (value * 10.0).round() / 10.0;
        Self {
            skills: round(percentage * weights.skills),
            location: round(percentage * weights.location),
            stipend: round(percentage * weights.stipend),
            timeline: round(percentage * weights.timeline),
        }
    }
}

/// Five-tier label over the match percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchQuality {
    /// At or above the excellent threshold
    Excellent,
    /// At or above the good threshold
    Good,
    /// At or above the moderate threshold
    Moderate,
    /// At or above the low threshold
    Low,
    /// Below every threshold
    Poor,
}

impl MatchQuality {
    /// Tier of `percentage` under `tiers`.
    pub fn from_percentage(percentage: f64, tiers: &MatchingConfig) -> Self {
        if percentage >= tiers.excellent_threshold {
            Self::Excellent
        } else if percentage >= tiers.good_threshold {
            Self::Good
        } else if percentage >= tiers.moderate_threshold {
            Self::Moderate
        } else if percentage >= tiers.low_threshold {
            Self::Low
        } else {
            Self::Poor
        }
    }
}

/// Read weights from a JSON value: flat, or nested under `weights` / `final_weights`.
///
/// # Errors
/// Returns [`Error::WeightsValidation`] if a weight is missing or the set is invalid
pub fn weights_from_json(value: &Value) -> Result<DimensionWeights> {
    let object = ["weights", "final_weights"]
        .into_iter()
        .find_map(|key| value.get(key).filter(|nested| nested.is_object()))
        .unwrap_or(value);

    let field = |name: &str| {
        object.get(name).and_then(Value::as_f64).ok_or_else(|| {
            Error::WeightsValidation(format!("missing or non-numeric weight '{name}'"))
        })
    };

    let weights = DimensionWeights {
        skills: field("skills")?,
        location: field("location")?,
        stipend: field("stipend")?,
        timeline: field("timeline")?,
    };
    weights.validate()?;
    Ok(weights)
}

/// Load and validate a weights artifact from disk.
///
/// # Errors
/// Returns an error if the file cannot be read, is not JSON, or holds invalid weights
pub async fn load_weights_artifact(path: &Path) -> Result<DimensionWeights> {
    let contents = async_fs::read(path).await?;
    let value: Value = serde_json::from_slice(&contents)?;
    weights_from_json(&value)
}

/// Pick the weights for one request.
///
/// Caller weights win when valid, then the artifact at `artifact` when present and
/// valid, then `defaults`.
pub async fn resolve_weights(
    requested: Option<DimensionWeights>,
    artifact: Option<&Path>,
    defaults: DimensionWeights,
) -> DimensionWeights {
    if let Some(weights) = requested {
        match weights.validate() {
            Ok(()) => return weights,
            Err(error) => tracing::warn!("Ignoring caller weights: {error}"),
        }
    }

    if let Some(path) = artifact.filter(|path| path.exists()) {
        match load_weights_artifact(path).await {
            Ok(weights) => {
                tracing::debug!("Using weights from {}", path.display());
                return weights;
            }
            Err(error) => tracing::warn!("Ignoring weights artifact {}: {error}", path.display()),
        }
    }

    defaults
}
