//! Command handlers for CLI operations

use std::fs::{self, OpenOptions};
use std::io::stderr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context as _, Result, bail};
use internmatch_core::{EngineConfig, StudentProfile};
use internmatch_engine::{JsonFileStore, Recommendation, RecommendationEngine, RecommendationFilters};
use serde::Serialize;
use tokio::fs as async_fs;
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Registry, fmt, layer::SubscriberExt as _, util::SubscriberInitExt as _,
};

const DEFAULT_LOG_FILTER: &str = "internmatch_engine=info,internmatch_cli=info";

#[derive(Serialize)]
struct RecommendOutput {
    student_id: String,
    count: usize,
    recommendations: Vec<Recommendation>,
}

/// Install the tracing subscriber, writing to stderr or to `debug.log` in the data folder.
///
/// # Errors
/// Returns an error if the log file cannot be created
pub fn init_logging(to_file: bool) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let registry = Registry::default().with(filter);

    if to_file {
        let data_dir = EngineConfig::data_dir()?;
        fs::create_dir_all(&data_dir)?;
        let log_file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(data_dir.join("debug.log"))?;
        registry
            .with(
                fmt::layer()
                    .with_writer(Arc::new(log_file))
                    .with_ansi(false)
                    .with_target(true)
                    .with_level(true),
            )
            .init();
    } else {
        registry
            .with(fmt::layer().with_writer(stderr).with_target(true))
            .init();
    }
    Ok(())
}

/// Load the configuration from `path`, or from the data folder when absent.
///
/// # Errors
/// Returns an error if an explicit file cannot be loaded
pub fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    if let Some(path) = path {
        return EngineConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()));
    }
    Ok(EngineConfig::load_or_create().unwrap_or_else(|error| {
        warn!("Failed to load config from the data folder: {error}");
        warn!("Using default configuration");
        EngineConfig::default()
    }))
}

fn build_engine(config: EngineConfig, internships: PathBuf) -> Result<RecommendationEngine> {
    let store = Arc::new(JsonFileStore::new(internships));
    Ok(RecommendationEngine::from_config(config, store)?)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    #[allow(clippy::print_stdout, reason = "Command output")]
    {
        println!("{json}");
    }
    Ok(())
}

/// Print recommendations for the student stored in `student`.
///
/// # Errors
/// Returns an error if the student file is unreadable or the engine cannot serve
pub async fn handle_recommend(
    config: EngineConfig,
    student: &Path,
    internships: PathBuf,
    top_k: Option<usize>,
    filters: RecommendationFilters,
) -> Result<()> {
    let contents = async_fs::read(student)
        .await
        .with_context(|| format!("Failed to read student profile {}", student.display()))?;
    let profile: StudentProfile = serde_json::from_slice(&contents)
        .with_context(|| format!("Invalid student profile in {}", student.display()))?;
    if profile.id.trim().is_empty() {
        bail!("Student profile in {} has no id", student.display());
    }

    let top_k = top_k.unwrap_or(config.matching.top_matches_default);
    let engine = build_engine(config, internships)?;
    info!("Recommending up to {top_k} internships for {}", profile.id);

    let recommendations = engine
        .get_recommendations_for_student(&profile, top_k, &filters, None)
        .await?;
    print_json(&RecommendOutput {
        student_id: profile.id,
        count: recommendations.len(),
        recommendations,
    })
}

/// Print the most popular postings.
///
/// # Errors
/// Returns an error if the internships cannot be read
pub async fn handle_trending(config: EngineConfig, internships: PathBuf, limit: usize) -> Result<()> {
    let engine = build_engine(config, internships)?;
    if !engine.initialize().await {
        warn!("Engine not ready, ranking straight from the internship file");
    }
    let trending = engine.get_trending_internships(limit).await?;
    print_json(&trending)
}

/// Rebuild the persisted indices and print the resulting statistics.
///
/// # Errors
/// Returns an error if the rebuild fails
pub async fn handle_refresh(config: EngineConfig, internships: PathBuf) -> Result<()> {
    let engine = build_engine(config, internships)?;
    if !engine.refresh_data().await {
        bail!("Refreshing internship data failed");
    }
    print_json(&engine.get_engine_stats().await)
}

/// Initialize the engine and print its statistics.
///
/// # Errors
/// Returns an error if the engine cannot be constructed
pub async fn handle_stats(config: EngineConfig, internships: PathBuf) -> Result<()> {
    let engine = build_engine(config, internships)?;
    if !engine.initialize().await {
        warn!("Engine failed to initialize");
    }
    print_json(&engine.get_engine_stats().await)
}
