//! Core types for the internship recommendation engine.
//!
//! This crate provides the domain model (students, internships), error handling,
//! and the TOML configuration shared by the engine and the command line tool.
#![cfg_attr(
    test,
    allow(
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::missing_panics_doc,
        clippy::float_cmp,
        clippy::absolute_paths,
        reason = "Test allows"
    )
)]

/// Engine configuration.
pub mod config;
/// Error types and result definitions.
pub mod error;
/// Student and internship data types.
pub mod types;

pub use config::{
    DimensionWeights, EmbeddingBackend, EmbeddingConfig, EngineConfig, MatchingConfig,
    ScoringConfig,
};
pub use error::{Error, Result};
pub use types::{GeoPoint, Internship, ProfileSnapshot, Skill, StudentProfile, WorkType};
