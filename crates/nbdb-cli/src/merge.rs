//! The `merge` command: read every input, resolve it (optionally on top of a
//! previous run) and write one timestamped dataset. A run that had to skip
//! inputs still writes, but exits with [`PARTIAL_EXIT_STATUS`].

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::Args;
use nbdb_core::{
    load_manifest, AppConfig, Batch, InputEntry, InputSummary, MatchStatistics, MergedDocument,
    Metadata, SkippedInput,
};
use nbdb_resolver::{Resolution, Resolver};
use nbdb_sources::{latest_artifact, read_dataset, unused_artifact_path, StoredDataset};

use crate::inputs::{load_inputs, parse_input_arg, print_load_report};
use crate::output::{backup_existing, write_json_atomic};
use crate::MatchArgs;

#[derive(Debug, Clone, Default, Args)]
pub(crate) struct MergeArgs {
    /// Source export as `<kind>=<path>`; repeatable. Directories expand to
    /// their `*.json` files
    #[arg(long = "input", value_name = "KIND=PATH", value_parser = parse_input_arg)]
    pub inputs: Vec<InputEntry>,
    /// YAML manifest listing inputs and field preferences
    #[arg(long)]
    pub manifest: Option<PathBuf>,
    /// Previously merged dataset to fold the inputs into
    #[arg(long, conflicts_with = "onto_latest")]
    pub existing: Option<PathBuf>,
    /// Fold the inputs into the newest dataset in the output directory
    #[arg(long)]
    pub onto_latest: bool,
    /// Write to this file instead of a timestamped file in the output directory
    #[arg(long, conflicts_with = "output_dir")]
    pub output: Option<PathBuf>,
    /// Directory for timestamped output (overrides `NBDB_OUTPUT_DIR`)
    #[arg(long)]
    pub output_dir: Option<PathBuf>,
    #[command(flatten)]
    pub matching: MatchArgs,
    /// Print what would be merged without reading or writing anything
    #[arg(long)]
    pub dry_run: bool,
}

/// Exit status of a merge that wrote its dataset but skipped some inputs.
pub(crate) const PARTIAL_EXIT_STATUS: u8 = 2;

/// What a merge run did.
#[derive(Debug, Default)]
pub(crate) struct MergeOutcome {
    /// The dataset written; `None` for a dry run.
    pub path: Option<PathBuf>,
    /// Inputs that could not be read and were left out.
    pub skipped_inputs: usize,
}

impl MergeOutcome {
    /// 0 when every input was merged, [`PARTIAL_EXIT_STATUS`] otherwise.
    pub(crate) fn exit_status(&self) -> u8 {
        if self.skipped_inputs == 0 {
            0
        } else {
            PARTIAL_EXIT_STATUS
        }
    }
}

/// Run a merge.
///
/// Unreadable inputs are logged and skipped; the dataset is still written
/// and the outcome reports how many were left out.
///
/// # Errors
///
/// Returns an error if no inputs are given, none of them can be read, the
/// existing dataset cannot be read, the resolver reports an ambiguous match,
/// the result fails validation, or the output cannot be written. Nothing is
/// written in any of these cases.
pub(crate) async fn run_merge(config: &AppConfig, args: &MergeArgs) -> anyhow::Result<MergeOutcome> {
    let mut entries: Vec<InputEntry> = Vec::new();
    let mut resolver_config = args.matching.resolver_config(config);

    if let Some(path) = &args.manifest {
        let manifest = load_manifest(path)?;
        entries.extend(manifest.inputs);
        resolver_config
            .field_preferences
            .extend(manifest.field_preferences);
    }
    entries.extend(args.inputs.iter().cloned());

    if entries.is_empty() {
        anyhow::bail!("no inputs given; pass --input <kind>=<path> or --manifest <file>");
    }

    let resolver = Resolver::new(resolver_config)?;
    let output_dir = args
        .output_dir
        .clone()
        .unwrap_or_else(|| config.output_dir.clone());

    let existing_path = match (&args.existing, args.onto_latest) {
        (Some(path), _) => Some(path.clone()),
        (None, true) => {
            let latest = latest_artifact(&output_dir, &config.output_prefix).await?;
            if latest.is_none() {
                tracing::warn!(
                    dir = %output_dir.display(),
                    "no previous dataset found, starting fresh"
                );
            }
            latest
        }
        (None, false) => None,
    };

    if args.dry_run {
        println!("dry-run: would merge {} input(s):", entries.len());
        for entry in &entries {
            println!("  {:<14} {}", entry.kind.to_string(), entry.path.display());
        }
        if let Some(path) = &existing_path {
            println!("  onto {}", path.display());
        }
        let matching = resolver.config();
        println!(
            "  name threshold {:.2}, address threshold {:.2}, bucket {}",
            matching.name_threshold, matching.address_threshold, matching.bucket_strategy
        );
        return Ok(MergeOutcome::default());
    }

    let mut batches: Vec<Batch> = Vec::new();
    let existing = match &existing_path {
        Some(path) => match read_dataset(path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to read existing dataset: {e}"))?
        {
            StoredDataset::Merged(document) => {
                tracing::info!(
                    path = %path.display(),
                    records = document.restaurants.len(),
                    "merging onto existing dataset"
                );
                document.restaurants
            }
            StoredDataset::Legacy(legacy) => {
                // No record ids to keep; the entries are resolved with the inputs.
                tracing::info!(
                    path = %path.display(),
                    entries = legacy.len(),
                    "existing dataset is a legacy export, resolving its entries as input"
                );
                batches.push(Batch::new(
                    path.display().to_string(),
                    legacy.into_iter().flatten().collect(),
                ));
                Vec::new()
            }
        },
        None => Vec::new(),
    };

    println!("Reading {} input(s)...", entries.len());
    let report = load_inputs(&entries, config.max_concurrent_reads).await;
    print_load_report(&report);

    if report.loaded.is_empty() {
        anyhow::bail!(
            "none of the {} input file(s) could be read",
            report.skipped.len()
        );
    }

    let summaries: Vec<InputSummary> = report
        .loaded
        .iter()
        .map(|loaded| InputSummary {
            kind: loaded.kind.to_string(),
            path: loaded.path.display().to_string(),
            records: loaded.batch.records.len(),
        })
        .collect();
    let skipped = report.skipped;
    batches.extend(report.loaded.into_iter().map(|l| l.batch));

    let resolution = resolver
        .resolve_onto(&existing, &batches)
        .map_err(|e| anyhow::anyhow!("merge aborted, nothing written: {e}"))?;

    let now = Utc::now();
    let document = build_document(now, summaries, &batches, skipped, resolution);
    document
        .validate()
        .map_err(|e| anyhow::anyhow!("merge aborted, nothing written: {e}"))?;

    let path = match &args.output {
        Some(path) => {
            if let Some(backup) = backup_existing(path).await? {
                println!("Previous {} kept as {}", path.display(), backup.display());
            }
            path.clone()
        }
        None => unused_artifact_path(&output_dir, &config.output_prefix, now).await?,
    };

    write_json_atomic(&path, &serde_json::to_string_pretty(&document)?).await?;

    print_summary(&document.metadata.match_statistics, existing.len());
    println!(
        "Wrote {} restaurants to {}",
        document.restaurants.len(),
        path.display()
    );

    let skipped_inputs = document.metadata.skipped_inputs.len();
    if skipped_inputs > 0 {
        tracing::warn!(skipped = skipped_inputs, "some inputs were not merged");
        println!("{skipped_inputs} input(s) could not be read and were left out");
    }

    Ok(MergeOutcome {
        path: Some(path),
        skipped_inputs,
    })
}

/// Wrap a resolution and the run's bookkeeping into the output document.
pub(crate) fn build_document(
    timestamp: DateTime<Utc>,
    inputs: Vec<InputSummary>,
    batches: &[Batch],
    skipped_inputs: Vec<SkippedInput>,
    resolution: Resolution,
) -> MergedDocument {
    let mut source_counts = BTreeMap::new();
    for record in batches.iter().flat_map(|b| &b.records) {
        *source_counts.entry(record.source).or_insert(0) += 1;
    }

    MergedDocument {
        restaurants: resolution.records,
        metadata: Metadata {
            timestamp,
            source_counts,
            inputs,
            skipped_inputs,
            match_statistics: resolution.stats,
            conflicts: resolution.conflicts,
            geo_outliers: resolution.geo_outliers,
        },
    }
}

fn print_summary(stats: &MatchStatistics, existing: usize) {
    println!(
        "Merge complete: {} records in, {} restaurants out",
        stats.records_in, stats.canonical_out
    );
    if existing > 0 {
        println!(
            "  {:<18} {:>6} (onto {existing} existing)",
            "merged onto existing", stats.merged_onto_existing
        );
    }
    for (label, count) in [
        ("linked by id", stats.linked_by_id),
        ("exact matches", stats.exact_matches),
        ("fuzzy matches", stats.fuzzy_matches),
        ("convergence", stats.convergence_merges),
        ("singletons", stats.singletons),
        ("unmatchable", stats.unmatchable),
        ("field conflicts", stats.conflicts),
        ("geo outliers", stats.geo_outliers),
    ] {
        println!("  {label:<18} {count:>6}");
    }
}

#[cfg(test)]
#[path = "merge_test.rs"]
mod tests;
