//! Configuration for matching thresholds, caching, scoring, embeddings, and storage.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Tolerance used when checking that dimension weights sum to one.
pub const WEIGHT_SUM_TOLERANCE: f64 = 0.01;

/// Longest accepted student vector TTL, one year.
pub const MAX_STUDENT_TTL_HOURS: u64 = 24 * 365;

/// Complete engine configuration.
#[derive(Default, Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Match thresholds and quality tiers
    pub matching: MatchingConfig,
    /// Skill similarity settings
    pub skills: SkillConfig,
    /// Student vector cache settings
    pub cache: CacheConfig,
    /// Ranking weights and score defaults
    pub scoring: ScoringConfig,
    /// Embedding model settings
    pub embedding: EmbeddingConfig,
    /// Worker pool and timeouts
    pub runtime: RuntimeConfig,
    /// On-disk locations
    pub storage: StorageConfig,
}

/// Match thresholds, in percent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Candidates below this match percentage are never returned as genuine matches
    pub min_match_threshold: f64,
    /// Number of recommendations returned when the caller does not specify one
    pub top_matches_default: usize,
    /// Lower bound of the excellent tier
    pub excellent_threshold: f64,
    /// Lower bound of the good tier
    pub good_threshold: f64,
    /// Lower bound of the moderate tier
    pub moderate_threshold: f64,
    /// Lower bound of the low tier
    pub low_threshold: f64,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            min_match_threshold: 25.0,
            top_matches_default: 5,
            excellent_threshold: 80.0,
            good_threshold: 60.0,
            moderate_threshold: 45.0,
            low_threshold: 35.0,
        }
    }
}

/// Skill similarity configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SkillConfig {
    /// Cosine similarity above which two skills are considered related
    pub similarity_threshold: f32,
    /// Maximum share of genuinely new skills that still counts as an enhancement
    pub enhancement_ratio: f32,
    /// Credit given to a semantic match relative to an exact one
    pub semantic_match_weight: f64,
    /// Maximum number of per-skill embeddings kept in memory
    pub embedding_cache_size: usize,
}

impl Default for SkillConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.75,
            enhancement_ratio: 0.3,
            semantic_match_weight: 0.8,
            embedding_cache_size: 5000,
        }
    }
}

/// Student vector cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Time-to-live for cached student vectors in hours
    pub student_ttl_hours: u64,
    /// Maximum number of cached student profiles
    pub max_student_profiles: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            student_ttl_hours: 24,
            max_student_profiles: 1000,
        }
    }
}

impl CacheConfig {
    /// Student cache TTL as a [`Duration`].
    pub fn student_ttl(&self) -> Duration {
        Duration::from_secs(self.student_ttl_hours.saturating_mul(3600))
    }
}

/// Weights of the four match dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DimensionWeights {
    /// Weight of the skill dimension
    pub skills: f64,
    /// Weight of the location dimension
    pub location: f64,
    /// Weight of the stipend dimension
    pub stipend: f64,
    /// Weight of the timeline dimension
    pub timeline: f64,
}

impl Default for DimensionWeights {
    fn default() -> Self {
        Self {
            skills: 0.50,
            location: 0.20,
            stipend: 0.15,
            timeline: 0.15,
        }
    }
}

impl DimensionWeights {
    /// Sum of all four weights.
    pub fn sum(&self) -> f64 {
        self.skills + self.location + self.stipend + self.timeline
    }

    /// Check that every weight lies in `[0, 1]` and that they sum to one.
    ///
    /// # Errors
    /// Returns [`Error::WeightsValidation`] describing the first violated constraint
    pub fn validate(&self) -> Result<()> {
        let named = [
            ("skills", self.skills),
            ("location", self.location),
            ("stipend", self.stipend),
            ("timeline", self.timeline),
        ];
        for (name, weight) in named {
            if !weight.is_finite() || !(0.0..=1.0).contains(&weight) {
                return Err(Error::WeightsValidation(format!(
                    "weight '{name}' must be within [0, 1], got {weight}"
                )));
            }
        }
        let total = self.sum();
        if (total - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(Error::WeightsValidation(format!(
                "weights must sum to 1.0, got {total:.4}"
            )));
        }
        Ok(())
    }
}

/// Ranking configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Weights used when neither the caller nor an artifact supplies valid ones
    pub default_weights: DimensionWeights,
    /// Skill boost when at least 75% of filter criteria match
    pub filter_match_boost: f64,
    /// Skill boost when at least 50% of filter criteria match
    pub filter_partial_boost: f64,
    /// Floor applied to candidate skill scores
    pub min_skill_score: f64,
    /// Location score used when no location signal is available
    pub default_location_score: f64,
    /// Fixed stipend score used during candidate discovery
    pub default_stipend_score: f64,
    /// Fixed timeline score used during candidate discovery
    pub default_timeline_score: f64,
    /// Over-fetch factor applied to `top_k` for nearest-neighbour search
    pub search_k_multiplier: usize,
    /// Match percentage assigned to trending fallback items
    pub fallback_match_percentage: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            default_weights: DimensionWeights::default(),
            filter_match_boost: 1.2,
            filter_partial_boost: 1.1,
            min_skill_score: 0.1,
            default_location_score: 0.5,
            default_stipend_score: 0.7,
            default_timeline_score: 0.6,
            search_k_multiplier: 5,
            fallback_match_percentage: 30.0,
        }
    }
}

/// Embedding backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// Local feature-hashing encoder, no external service required
    Hashing,
    /// Embeddings served by a local Ollama instance
    Ollama,
}

/// Embedding model configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Which backend produces embeddings
    pub backend: EmbeddingBackend,
    /// Model name (Ollama backend)
    pub model: String,
    /// Ollama host URL
    pub host: String,
    /// Ollama port
    pub port: u16,
    /// Vector dimension (hashing backend)
    pub dimension: usize,
    /// Number of texts encoded per batch during index builds
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::Hashing,
            model: "nomic-embed-text".to_owned(),
            host: "http://localhost".to_owned(),
            port: 11434,
            dimension: 384,
            batch_size: 32,
        }
    }
}

/// Worker pool and timeout configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Maximum number of concurrent CPU-bound jobs
    pub worker_threads: usize,
    /// Budget for a full engine initialization, in seconds
    pub init_timeout_secs: u64,
    /// Budget for initialization triggered from a recommendation request, in seconds
    pub request_init_timeout_secs: u64,
    /// Budget for reloading internship data on demand, in seconds
    pub reload_timeout_secs: u64,
    /// Budget for the document-count drift check, in milliseconds
    pub refresh_check_timeout_ms: u64,
    /// Budget for one recommendation call, in seconds
    pub request_timeout_secs: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            worker_threads: 4,
            init_timeout_secs: 120,
            request_init_timeout_secs: 20,
            reload_timeout_secs: 10,
            refresh_check_timeout_ms: 2000,
            request_timeout_secs: 30,
        }
    }
}

impl RuntimeConfig {
    /// Initialization budget.
    pub fn init_timeout(&self) -> Duration {
        Duration::from_secs(self.init_timeout_secs)
    }

    /// Initialization budget when triggered by a request.
    pub fn request_init_timeout(&self) -> Duration {
        Duration::from_secs(self.request_init_timeout_secs)
    }

    /// Data reload budget.
    pub fn reload_timeout(&self) -> Duration {
        Duration::from_secs(self.reload_timeout_secs)
    }

    /// Drift check budget.
    pub fn refresh_check_timeout(&self) -> Duration {
        Duration::from_millis(self.refresh_check_timeout_ms)
    }

    /// Whole-request budget.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Storage locations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding persisted vector indices (defaults to `{data_dir}/cache`)
    pub cache_dir: Option<PathBuf>,
    /// Optional weights artifact produced by offline training
    pub weights_path: Option<PathBuf>,
}

impl EngineConfig {
    /// Environment variable overriding the data folder.
    pub const FOLDER_ENV: &'static str = "INTERNMATCH_FOLDER";

    /// Get the data folder (`$INTERNMATCH_FOLDER` or `~/.internmatch`)
    ///
    /// # Errors
    /// Returns an error if the home directory cannot be determined
    pub fn data_dir() -> Result<PathBuf> {
        if let Ok(folder) = env::var(Self::FOLDER_ENV) {
            return Ok(PathBuf::from(folder));
        }
        let home = dirs::home_dir()
            .ok_or_else(|| Error::Config("Could not determine home directory".to_owned()))?;
        Ok(home.join(".internmatch"))
    }

    /// Get the default config file path (`{data_dir}/config.toml`)
    ///
    /// # Errors
    /// Returns an error if the home directory cannot be determined
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::data_dir()?.join("config.toml"))
    }

    /// Load config from the default location, creating it with defaults when missing
    ///
    /// # Errors
    /// Returns an error if the config cannot be read, parsed, or created
    pub fn load_or_create() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            Self::load_from_file(&config_path)
        } else {
            let config = Self::default();
            config.save_to_file(&config_path)?;
            Ok(config)
        }
    }

    /// Load config from a specific file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, parsed, or fails validation
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|error| Error::Config(format!("Failed to read config: {error}")))?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;

        tracing::debug!(
            "Loaded config from {}: backend={:?}, min_match_threshold={}",
            path.display(),
            config.embedding.backend,
            config.matching.min_match_threshold
        );

        Ok(config)
    }

    /// Save config to a specific file
    ///
    /// # Errors
    /// Returns an error if the file cannot be written
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|error| {
                Error::Config(format!("Failed to create config directory: {error}"))
            })?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|error| Error::Config(format!("Failed to serialize config: {error}")))?;

        let header = "# internmatch configuration\n\
                      # This file is automatically generated on first run\n\
                      # Edit this file to customize your settings\n\n";

        fs::write(path, format!("{header}{contents}"))
            .map_err(|error| Error::Config(format!("Failed to write config: {error}")))?;

        Ok(())
    }

    /// Validate cross-field constraints.
    ///
    /// # Errors
    /// Returns an error describing the first invalid setting
    pub fn validate(&self) -> Result<()> {
        self.scoring
            .default_weights
            .validate()
            .map_err(|error| Error::Config(format!("default_weights: {error}")))?;

        let tiers = &self.matching;
        let ordered = tiers.excellent_threshold >= tiers.good_threshold
            && tiers.good_threshold >= tiers.moderate_threshold
            && tiers.moderate_threshold >= tiers.low_threshold;
        if !ordered {
            return Err(Error::Config(
                "quality thresholds must be ordered excellent >= good >= moderate >= low"
                    .to_owned(),
            ));
        }
        if !(0.0..=100.0).contains(&tiers.min_match_threshold) {
            return Err(Error::Config(format!(
                "min_match_threshold must be within [0, 100], got {}",
                tiers.min_match_threshold
            )));
        }
        if !(1..=MAX_STUDENT_TTL_HOURS).contains(&self.cache.student_ttl_hours) {
            return Err(Error::Config(format!(
                "student_ttl_hours must be within [1, {MAX_STUDENT_TTL_HOURS}], got {}",
                self.cache.student_ttl_hours
            )));
        }
        if self.runtime.worker_threads == 0 {
            return Err(Error::Config("worker_threads must be positive".to_owned()));
        }
        if self.embedding.dimension == 0 || self.embedding.batch_size == 0 {
            return Err(Error::Config(
                "embedding dimension and batch_size must be positive".to_owned(),
            ));
        }
        if self.scoring.search_k_multiplier == 0 {
            return Err(Error::Config(
                "search_k_multiplier must be positive".to_owned(),
            ));
        }
        Ok(())
    }

    /// Resolve the index cache directory.
    ///
    /// # Errors
    /// Returns an error if no explicit directory is set and the data folder cannot be determined
    pub fn cache_dir(&self) -> Result<PathBuf> {
        match &self.storage.cache_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(Self::data_dir()?.join("cache")),
        }
    }
}
