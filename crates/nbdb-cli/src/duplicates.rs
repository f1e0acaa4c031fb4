use std::path::Path;

use nbdb_core::{AppConfig, CanonicalRecord};
use nbdb_resolver::{find_duplicate_groups, DuplicateGroup, Resolver};
use serde_json::{json, Value};

use crate::dataset::read_canonical;
use crate::output::write_json_atomic;
use crate::MatchArgs;

/// Print the likely duplicates left in a merged dataset, optionally writing
/// them to `output` as JSON. The dataset itself is never modified.
///
/// # Errors
///
/// Returns an error if the dataset cannot be read, the thresholds are out of
/// range, or the report cannot be written.
pub(crate) async fn run_duplicates(
    config: &AppConfig,
    merged: &Path,
    matching: &MatchArgs,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let resolver = Resolver::new(matching.resolver_config(config))?;
    let records = &read_canonical(merged, &resolver).await?;
    let groups = find_duplicate_groups(records, resolver.config());
    tracing::info!(records = records.len(), groups = groups.len(), "duplicate check finished");

    if groups.is_empty() {
        println!("No likely duplicates among {} restaurants", records.len());
    } else {
        println!(
            "Found {} duplicate group(s) among {} restaurants:",
            groups.len(),
            records.len()
        );
        for group in &groups {
            println!("  {}", describe(&records[group.original]));
            for duplicate in &group.duplicates {
                println!(
                    "    ~ {}  (name {:.3}, address {:.3})",
                    describe(&records[duplicate.index]),
                    duplicate.name_similarity,
                    duplicate.address_similarity,
                );
            }
        }
    }

    if let Some(path) = output {
        let report = duplicate_report(records, &groups);
        write_json_atomic(path, &serde_json::to_string_pretty(&report)?).await?;
        println!("Wrote duplicate report to {}", path.display());
    }

    Ok(())
}

fn describe(record: &CanonicalRecord) -> String {
    format!(
        "{} @ {} [{}]",
        record.name,
        record.address.as_deref().unwrap_or("-"),
        record.id
    )
}

fn record_summary(records: &[CanonicalRecord], index: usize) -> Value {
    let record = &records[index];
    json!({
        "index": index,
        "id": record.id,
        "name": record.name,
        "address": record.address,
    })
}

fn duplicate_report(records: &[CanonicalRecord], groups: &[DuplicateGroup]) -> Value {
    let groups: Vec<Value> = groups
        .iter()
        .map(|group| {
            let duplicates: Vec<Value> = group
                .duplicates
                .iter()
                .map(|d| {
                    json!({
                        "record": record_summary(records, d.index),
                        "name_similarity": d.name_similarity,
                        "address_similarity": d.address_similarity,
                    })
                })
                .collect();
            json!({
                "original": record_summary(records, group.original),
                "duplicates": duplicates,
            })
        })
        .collect();

    json!({
        "total_records": records.len(),
        "duplicate_groups": groups,
    })
}
