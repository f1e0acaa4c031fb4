//! Reading the source exports named on the command line or in a manifest.
//!
//! Unreadable inputs are logged and skipped; callers decide whether an empty
//! result is fatal.

use std::collections::HashSet;
use std::path::PathBuf;

use futures::stream::{self, StreamExt};
use nbdb_core::{InputEntry, InputKind, SkippedInput};
use nbdb_sources::{expand_input, load_file, LoadedInput, SourceError};

/// Parse a `--input <kind>=<path>` argument.
pub(crate) fn parse_input_arg(arg: &str) -> Result<InputEntry, String> {
    let (kind, path) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected <kind>=<path>, got '{arg}'"))?;
    let kind: InputKind = kind.parse()?;
    let path = path.trim();
    if path.is_empty() {
        return Err(format!("input '{arg}' has an empty path"));
    }
    Ok(InputEntry {
        kind,
        path: PathBuf::from(path),
    })
}

/// Outcome of reading a set of inputs.
#[derive(Debug, Default)]
pub(crate) struct LoadReport {
    /// Files that parsed, in the order their entries were given.
    pub loaded: Vec<LoadedInput>,
    pub skipped: Vec<SkippedInput>,
}

impl LoadReport {
    pub(crate) fn record_count(&self) -> usize {
        self.loaded.iter().map(|l| l.batch.records.len()).sum()
    }
}

/// Expand directories, then read every file with at most `max_concurrent`
/// reads in flight.
pub(crate) async fn load_inputs(entries: &[InputEntry], max_concurrent: usize) -> LoadReport {
    let mut report = LoadReport::default();
    let mut files: Vec<InputEntry> = Vec::new();
    let mut seen: HashSet<PathBuf> = HashSet::new();

    for entry in entries {
        match expand_input(entry).await {
            Ok(expanded) => {
                for file in expanded {
                    if seen.insert(file.path.clone()) {
                        files.push(file);
                    } else {
                        tracing::warn!(
                            path = %file.path.display(),
                            "input listed twice, reading it once"
                        );
                    }
                }
            }
            Err(e) => skip(&mut report, &entry.path, &e),
        }
    }

    let mut results: Vec<(usize, &InputEntry, Result<LoadedInput, SourceError>)> =
        stream::iter(files.iter().enumerate())
            .map(|(position, file)| {
                let fut = load_file(file);
                async move { (position, file, fut.await) }
            })
            .buffer_unordered(max_concurrent.max(1))
            .collect()
            .await;
    results.sort_by_key(|(position, _, _)| *position);

    for (_, file, result) in results {
        match result {
            Ok(loaded) => report.loaded.push(loaded),
            Err(e) => skip(&mut report, &file.path, &e),
        }
    }

    report
}

fn skip(report: &mut LoadReport, path: &std::path::Path, error: &SourceError) {
    tracing::warn!(path = %path.display(), error = %error, "skipping unreadable input");
    report.skipped.push(SkippedInput {
        path: path.display().to_string(),
        reason: error.to_string(),
    });
}

/// Print one line per input read or skipped.
pub(crate) fn print_load_report(report: &LoadReport) {
    for loaded in &report.loaded {
        println!(
            "  \u{2713} {:<14} {:>6} records  {}",
            loaded.kind.to_string(),
            loaded.batch.records.len(),
            loaded.path.display(),
        );
    }
    for skipped in &report.skipped {
        println!("  \u{2717} {}: {}", skipped.path, skipped.reason);
    }
}
