//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use internmatch_engine::RecommendationFilters;

/// Command-line arguments for the internship recommender
#[derive(Parser, Debug)]
#[command(name = "internmatch")]
#[command(about = "Embedding-based internship recommendations", long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to `~/.internmatch/config.toml`)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Write logs to `debug.log` in the data folder instead of stderr
    #[arg(long, global = true)]
    pub log_file: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(about = "Recommend internships for a student profile")]
    Recommend {
        #[arg(long, help = "Student profile JSON file")]
        student: PathBuf,

        #[arg(long, help = "JSON array of internship documents")]
        internships: PathBuf,

        #[arg(long, help = "Maximum number of recommendations")]
        top_k: Option<usize>,

        #[command(flatten)]
        filters: FilterArgs,
    },

    #[command(about = "List the most popular internships")]
    Trending {
        #[arg(long, help = "JSON array of internship documents")]
        internships: PathBuf,

        #[arg(long, default_value_t = 10, help = "Maximum number of internships")]
        limit: usize,
    },

    #[command(about = "Rebuild and persist the internship indices")]
    Refresh {
        #[arg(long, help = "JSON array of internship documents")]
        internships: PathBuf,
    },

    #[command(about = "Show engine statistics")]
    Stats {
        #[arg(long, help = "JSON array of internship documents")]
        internships: PathBuf,
    },
}

#[derive(Args, Debug, Default)]
pub struct FilterArgs {
    #[arg(long, help = "City, state, or \"remote\"")]
    pub location: Option<String>,

    #[arg(long, help = "Comma-separated work types (remote, wfh, wfo, hybrid)")]
    pub work_type: Option<String>,

    #[arg(long)]
    pub min_stipend: Option<f64>,

    #[arg(long)]
    pub max_stipend: Option<f64>,

    #[arg(long, help = "Duration such as \"3 months\"")]
    pub duration: Option<String>,

    #[arg(long)]
    pub category: Option<String>,

    #[arg(long, help = "Free text matched against title, company and skills")]
    pub search: Option<String>,
}

impl From<FilterArgs> for RecommendationFilters {
    fn from(args: FilterArgs) -> Self {
        Self {
            location: args.location,
            work_type: args.work_type,
            min_stipend: args.min_stipend,
            max_stipend: args.max_stipend,
            duration: args.duration,
            category: args.category,
            search: args.search,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory as _;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_recommend_flags_map_to_filters() {
        let cli = Cli::parse_from([
            "internmatch",
            "recommend",
            "--student",
            "student.json",
            "--internships",
            "internships.json",
            "--top-k",
            "3",
            "--work-type",
            "remote,hybrid",
            "--min-stipend",
            "5000",
        ]);
        let Commands::Recommend { top_k, filters, .. } = cli.command else {
            panic!("expected recommend");
        };
        assert_eq!(top_k, Some(3));

        let filters = RecommendationFilters::from(filters);
        assert_eq!(filters.work_type.as_deref(), Some("remote,hybrid"));
        assert_eq!(filters.min_stipend, Some(5000.0));
        assert!(filters.location.is_none());
    }
}
