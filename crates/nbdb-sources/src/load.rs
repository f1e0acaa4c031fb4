use std::path::{Path, PathBuf};

use nbdb_core::{Batch, InputEntry, InputKind, MergedDocument, RawRecord};

use crate::error::SourceError;
use crate::formats::{parse_kind, parse_legacy};

/// One export file read and adapted into a batch.
#[derive(Debug, Clone)]
pub struct LoadedInput {
    pub kind: InputKind,
    pub path: PathBuf,
    pub batch: Batch,
}

/// Parse the text of an export file of the given kind.
///
/// # Errors
///
/// Returns [`SourceError::Json`] for malformed JSON and
/// [`SourceError::Shape`] when the document is not laid out like `kind`.
pub fn parse_document(kind: InputKind, label: &str, text: &str) -> Result<Vec<RawRecord>, SourceError> {
    let document: serde_json::Value =
        serde_json::from_str(text).map_err(|source| SourceError::Json {
            path: label.to_string(),
            source,
        })?;
    parse_kind(kind, &document).ok_or_else(|| SourceError::Shape {
        path: label.to_string(),
        kind,
    })
}

/// Expand a directory entry into one entry per `*.json` file inside it,
/// sorted by file name. File entries are returned as they are.
///
/// # Errors
///
/// Returns [`SourceError::Io`] if the path cannot be inspected and
/// [`SourceError::EmptyDirectory`] if a directory holds no JSON files.
pub async fn expand_input(entry: &InputEntry) -> Result<Vec<InputEntry>, SourceError> {
    let io_error = |source| SourceError::Io {
        path: entry.path.display().to_string(),
        source,
    };

    let metadata = tokio::fs::metadata(&entry.path).await.map_err(io_error)?;
    if !metadata.is_dir() {
        return Ok(vec![entry.clone()]);
    }

    let mut files = Vec::new();
    let mut dir = tokio::fs::read_dir(&entry.path).await.map_err(io_error)?;
    while let Some(item) = dir.next_entry().await.map_err(io_error)? {
        let path = item.path();
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json && item.file_type().await.map_err(io_error)?.is_file() {
            files.push(path);
        }
    }

    if files.is_empty() {
        return Err(SourceError::EmptyDirectory {
            path: entry.path.display().to_string(),
        });
    }
    files.sort();
    tracing::debug!(dir = %entry.path.display(), files = files.len(), "expanded input directory");

    Ok(files
        .into_iter()
        .map(|path| InputEntry {
            kind: entry.kind,
            path,
        })
        .collect())
}

/// Read and adapt a single export file.
///
/// # Errors
///
/// Returns [`SourceError`] if the file cannot be read or parsed.
pub async fn load_file(entry: &InputEntry) -> Result<LoadedInput, SourceError> {
    let label = entry.path.display().to_string();
    let text = tokio::fs::read_to_string(&entry.path)
        .await
        .map_err(|source| SourceError::Io {
            path: label.clone(),
            source,
        })?;
    let records = parse_document(entry.kind, &label, &text)?;
    tracing::debug!(path = %label, kind = %entry.kind, records = records.len(), "loaded input");

    Ok(LoadedInput {
        kind: entry.kind,
        path: entry.path.clone(),
        batch: Batch::new(label, records),
    })
}

/// A dataset written by an earlier run.
#[derive(Debug, Clone)]
pub enum StoredDataset {
    /// Written by `nbdb-cli merge`.
    Merged(MergedDocument),
    /// Written by the earlier merge script: one group of observations per
    /// entry, still to be collapsed into canonical records.
    Legacy(Vec<Vec<RawRecord>>),
}

/// Read a dataset written by a previous merge run, in either layout.
///
/// # Errors
///
/// Returns [`SourceError`] if the file cannot be read or holds neither a
/// merged document nor a legacy dataset.
pub async fn read_dataset(path: &Path) -> Result<StoredDataset, SourceError> {
    let label = path.display().to_string();
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| SourceError::Io {
            path: label.clone(),
            source,
        })?;
    let document: serde_json::Value =
        serde_json::from_str(&text).map_err(|source| SourceError::Json {
            path: label.clone(),
            source,
        })?;

    match serde_json::from_value::<MergedDocument>(document.clone()) {
        Ok(merged) => Ok(StoredDataset::Merged(merged)),
        Err(source) => match parse_legacy(&document) {
            Some(entries) => {
                tracing::info!(path = %label, entries = entries.len(), "read legacy dataset");
                Ok(StoredDataset::Legacy(entries))
            }
            None => Err(SourceError::Json {
                path: label,
                source,
            }),
        },
    }
}
