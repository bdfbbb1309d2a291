//! internmatch - internship recommendations from the command line
#![cfg_attr(
    test,
    allow(
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::missing_panics_doc,
        clippy::missing_errors_doc,
        clippy::float_cmp,
        reason = "Allow for tests"
    )
)]

use anyhow::Result;
use clap::Parser as _;
use cli::{Cli, Commands};

mod cli;
mod handlers;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    handlers::init_logging(cli.log_file)?;
    let config = handlers::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Recommend {
            student,
            internships,
            top_k,
            filters,
        } => handlers::handle_recommend(config, &student, internships, top_k, filters.into()).await,
        Commands::Trending { internships, limit } => {
            handlers::handle_trending(config, internships, limit).await
        }
        Commands::Refresh { internships } => handlers::handle_refresh(config, internships).await,
        Commands::Stats { internships } => handlers::handle_stats(config, internships).await,
    }
}
