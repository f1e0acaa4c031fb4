mod dataset;
mod diff;
mod duplicates;
mod inputs;
mod merge;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use nbdb_core::{AppConfig, BucketStrategy, InputEntry};
use nbdb_resolver::ResolverConfig;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "nbdb-cli")]
#[command(about = "Merge per-source restaurant exports into one deduplicated dataset")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Resolve source exports into canonical restaurant records
    Merge(merge::MergeArgs),
    /// Report likely duplicates left in a merged dataset
    Duplicates {
        /// Merged dataset to inspect
        merged: PathBuf,
        /// Also write the report as JSON to this file
        #[arg(long)]
        output: Option<PathBuf>,
        #[command(flatten)]
        matching: MatchArgs,
    },
    /// List source records that a merged dataset does not contain yet
    Diff {
        /// Source export as `<kind>=<path>`; repeatable
        #[arg(
            long = "input",
            value_name = "KIND=PATH",
            required = true,
            value_parser = inputs::parse_input_arg
        )]
        inputs: Vec<InputEntry>,
        /// Merged dataset to compare against
        #[arg(long)]
        against: PathBuf,
        /// Also write the missing records as JSON to this file
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

/// Matching overrides shared by the commands that compare records.
#[derive(Debug, Clone, Default, Args)]
pub(crate) struct MatchArgs {
    /// Minimum name similarity for a match (overrides `NBDB_NAME_THRESHOLD`)
    #[arg(long)]
    pub name_threshold: Option<f64>,
    /// Minimum address similarity for a match (overrides `NBDB_ADDRESS_THRESHOLD`)
    #[arg(long)]
    pub address_threshold: Option<f64>,
    /// Bucketing strategy: `first-char` or `skip-articles`
    #[arg(long)]
    pub bucket: Option<BucketStrategy>,
}

impl MatchArgs {
    pub(crate) fn resolver_config(&self, config: &AppConfig) -> ResolverConfig {
        let mut resolver = ResolverConfig::from_app_config(config);
        if let Some(threshold) = self.name_threshold {
            resolver.name_threshold = threshold;
        }
        if let Some(threshold) = self.address_threshold {
            resolver.address_threshold = threshold;
        }
        if let Some(bucket) = self.bucket {
            resolver.bucket_strategy = bucket;
        }
        resolver
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = nbdb_core::load_app_config()?;

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let mut status = 0;
    match cli.command {
        Some(Commands::Merge(args)) => {
            let outcome = merge::run_merge(&config, &args).await?;
            tracing::debug!(path = ?outcome.path, skipped = outcome.skipped_inputs, "merge finished");
            status = outcome.exit_status();
            if status != 0 {
                eprintln!(
                    "warning: {} input(s) skipped, exiting with status {status}",
                    outcome.skipped_inputs
                );
            }
        }
        Some(Commands::Duplicates {
            merged,
            output,
            matching,
        }) => {
            duplicates::run_duplicates(&config, &merged, &matching, output.as_deref()).await?;
        }
        Some(Commands::Diff {
            inputs,
            against,
            output,
        }) => {
            diff::run_diff(&config, &inputs, &against, output.as_deref()).await?;
        }
        None => println!("nbdb-cli: no command given (see --help)"),
    }

    Ok(ExitCode::from(status))
}

#[cfg(test)]
pub(crate) fn test_config(output_dir: &std::path::Path) -> AppConfig {
    AppConfig {
        log_level: "info".to_string(),
        name_threshold: 0.85,
        address_threshold: 0.85,
        geo_outlier_km: 5.0,
        bucket_strategy: BucketStrategy::FirstChar,
        output_dir: output_dir.to_path_buf(),
        output_prefix: "merged_restaurant_data".to_string(),
        max_concurrent_reads: 2,
    }
}
