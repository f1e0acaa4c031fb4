use std::path::Path;

use nbdb_core::{AppConfig, InputEntry, RawRecord};
use nbdb_resolver::{differential, Resolver, ResolverConfig};

use crate::dataset::read_canonical;
use crate::inputs::{load_inputs, print_load_report};
use crate::output::write_json_atomic;

/// Print the source records whose name and address are not yet in the
/// merged dataset at `against`.
///
/// # Errors
///
/// Returns an error if the thresholds are out of range, the merged dataset
/// cannot be read, none of the inputs
/// can be read, or the output cannot be written.
pub(crate) async fn run_diff(
    config: &AppConfig,
    inputs: &[InputEntry],
    against: &Path,
    output: Option<&Path>,
) -> anyhow::Result<Vec<RawRecord>> {
    let resolver = Resolver::new(ResolverConfig::from_app_config(config))?;
    let merged = read_canonical(against, &resolver).await?;

    let report = load_inputs(inputs, config.max_concurrent_reads).await;
    print_load_report(&report);
    if report.loaded.is_empty() {
        anyhow::bail!(
            "none of the {} input file(s) could be read",
            report.skipped.len()
        );
    }

    let candidates: Vec<RawRecord> = report
        .loaded
        .into_iter()
        .flat_map(|loaded| loaded.batch.records)
        .collect();
    let missing = differential(&candidates, &merged);

    println!(
        "{} of {} source records are not in {} ({} restaurants)",
        missing.len(),
        candidates.len(),
        against.display(),
        merged.len()
    );
    for record in &missing {
        println!(
            "  + {} @ {}  [{}]",
            record.name,
            record.address.as_deref().unwrap_or("-"),
            record.source
        );
    }

    if let Some(path) = output {
        let document = serde_json::json!({
            "against": against.display().to_string(),
            "count": missing.len(),
            "restaurants": &missing,
        });
        write_json_atomic(path, &serde_json::to_string_pretty(&document)?).await?;
        println!("Wrote missing records to {}", path.display());
    }

    Ok(missing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nbdb_core::InputKind;

    #[tokio::test]
    async fn lists_only_records_missing_from_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let merged = dir.path().join("merged.json");
        std::fs::write(
            &merged,
            r#"{"restaurants": [{"id": "x", "name": "Main St Diner", "address": "5 Main St",
                "city": null, "state": null, "coordinates": null,
                "contributing_sources": ["osm"]}]}"#,
        )
        .unwrap();
        let osm = dir.path().join("osm.json");
        std::fs::write(
            &osm,
            r#"[{"city_name": "Chattanooga", "state": "TN", "restaurants": [
                {"osm_id": 1, "tags": {"name": "Main St Diner",
                 "addr:housenumber": "5", "addr:street": "Main St"}},
                {"osm_id": 2, "tags": {"name": "Sushi Nabe",
                 "addr:housenumber": "9", "addr:street": "Market St"}}
            ]}]"#,
        )
        .unwrap();
        let output = dir.path().join("diff.json");

        let missing = run_diff(
            &crate::test_config(dir.path()),
            &[InputEntry {
                kind: InputKind::Osm,
                path: osm,
            }],
            &merged,
            Some(&output),
        )
        .await
        .unwrap();

        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].name, "Sushi Nabe");
        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(written["count"], 1);
    }

    #[tokio::test]
    async fn compares_against_legacy_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let merged = dir.path().join("old.json");
        std::fs::write(
            &merged,
            r#"{"restaurants": [{"name": "Main St Diner", "address": "5 Main St",
                "city": "Chattanooga", "state": "TN", "google_data": null}]}"#,
        )
        .unwrap();
        let osm = dir.path().join("osm.json");
        std::fs::write(
            &osm,
            r#"[{"city_name": "Chattanooga", "state": "TN", "restaurants": [
                {"osm_id": 1, "tags": {"name": "Main St Diner",
                 "addr:housenumber": "5", "addr:street": "Main St"}},
                {"osm_id": 2, "tags": {"name": "Sushi Nabe",
                 "addr:housenumber": "9", "addr:street": "Market St"}}
            ]}]"#,
        )
        .unwrap();

        let missing = run_diff(
            &crate::test_config(dir.path()),
            &[InputEntry {
                kind: InputKind::Osm,
                path: osm,
            }],
            &merged,
            None,
        )
        .await
        .unwrap();

        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].name, "Sushi Nabe");
    }
}
