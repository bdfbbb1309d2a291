use core::result::Result as CoreResult;
use std::io::Error as IoError;

use serde_json::Error as SerdeJsonError;
use thiserror::Error;
use toml::de::Error as TomlError;

/// Result type for engine operations.
pub type Result<T> = CoreResult<T, Error>;

/// Errors that can occur while building or serving recommendations.
#[derive(Debug, Error)]
pub enum Error {
    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization or deserialization failed.
    #[error("JSON serialization error: {0}")]
    Json(#[from] SerdeJsonError),

    /// TOML deserialization failed.
    #[error("TOML deserialization error: {0}")]
    Toml(#[from] TomlError),

    /// Configuration is invalid or missing.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The embedding model could not be loaded.
    #[error("Model load error: {0}")]
    ModelLoad(String),

    /// The internship store is unreachable or returned malformed data.
    #[error("Data source error: {0}")]
    DataSource(String),

    /// A stage exceeded its time budget.
    #[error("Timeout in {stage} after {millis}ms")]
    Timeout {
        /// Name of the stage that timed out
        stage: &'static str,
        /// Budget that was exceeded, in milliseconds
        millis: u64,
    },

    /// Building a match explanation failed.
    #[error("Explanation generation failed: {0}")]
    ExplanationGeneration(String),

    /// An external weights artifact was rejected.
    #[error("Invalid weights: {0}")]
    WeightsValidation(String),

    /// Reading or writing the on-disk index cache failed.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Vector index inputs violate a shape invariant.
    #[error("Invalid index: {0}")]
    InvalidIndex(String),

    /// The engine is not able to serve requests right now.
    #[error("Engine unavailable: {0}")]
    Unavailable(String),

    /// A general error not covered by other variants.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Determines whether this error may succeed if retried.
    ///
    /// Returns `true` for transient conditions such as timeouts, an engine that is still
    /// starting up, or an unreachable store.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::Unavailable(_) | Self::DataSource(_)
        )
    }
}
