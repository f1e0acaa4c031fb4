//! Timestamped output file names: `<prefix>_<YYYYMMDD_HHMMSS>.json`, with a
//! `_2`, `_3`... suffix when a run lands in a second already taken.

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;

use crate::error::SourceError;

const STAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

#[must_use]
pub fn artifact_file_name(prefix: &str, at: DateTime<Utc>) -> String {
    format!("{prefix}_{}.json", at.format(STAMP_FORMAT))
}

/// The timestamp embedded in `file_name`, if it is an artifact of `prefix`.
#[must_use]
pub fn artifact_timestamp(prefix: &str, file_name: &str) -> Option<NaiveDateTime> {
    artifact_rank(prefix, file_name).map(|(stamp, _)| stamp)
}

/// Timestamp and collision suffix (1 when absent), ordering artifacts
/// written within the same second.
fn artifact_rank(prefix: &str, file_name: &str) -> Option<(NaiveDateTime, u32)> {
    let pattern = format!(
        r"^{}_(\d{{8}}_\d{{6}})(?:_(\d+))?\.json$",
        regex::escape(prefix)
    );
    let re = Regex::new(&pattern).ok()?;
    let captures = re.captures(file_name)?;
    let stamp = NaiveDateTime::parse_from_str(captures.get(1)?.as_str(), STAMP_FORMAT).ok()?;
    let suffix = match captures.get(2) {
        Some(n) => n.as_str().parse().ok()?,
        None => 1,
    };
    Some((stamp, suffix))
}

/// A path in `dir` for an artifact written at `at` that no existing file
/// occupies. The plain name is used when free, otherwise the first free
/// `<prefix>_<stamp>_<n>.json` from `n = 2`.
///
/// # Errors
///
/// Returns [`SourceError::Io`] if a candidate path cannot be checked.
pub async fn unused_artifact_path(
    dir: &Path,
    prefix: &str,
    at: DateTime<Utc>,
) -> Result<PathBuf, SourceError> {
    let stamp = at.format(STAMP_FORMAT).to_string();
    let mut candidate = dir.join(artifact_file_name(prefix, at));
    let mut suffix = 2;
    while tokio::fs::try_exists(&candidate)
        .await
        .map_err(|source| SourceError::Io {
            path: candidate.display().to_string(),
            source,
        })?
    {
        tracing::debug!(path = %candidate.display(), "artifact name taken");
        candidate = dir.join(format!("{prefix}_{stamp}_{suffix}.json"));
        suffix += 1;
    }
    Ok(candidate)
}

/// The most recent artifact of `prefix` in `dir`, or `None` when the
/// directory holds none (or does not exist yet).
///
/// # Errors
///
/// Returns [`SourceError::Io`] if the directory exists but cannot be listed.
pub async fn latest_artifact(dir: &Path, prefix: &str) -> Result<Option<PathBuf>, SourceError> {
    let io_error = |source| SourceError::Io {
        path: dir.display().to_string(),
        source,
    };

    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(io_error(e)),
    };

    let mut latest: Option<((NaiveDateTime, u32), PathBuf)> = None;
    while let Some(entry) = entries.next_entry().await.map_err(io_error)? {
        let name = entry.file_name();
        let Some(rank) = name.to_str().and_then(|n| artifact_rank(prefix, n)) else {
            continue;
        };
        if latest.as_ref().is_none_or(|(best, _)| rank > *best) {
            latest = Some((rank, entry.path()));
        }
    }

    Ok(latest.map(|(_, path)| path))
}
