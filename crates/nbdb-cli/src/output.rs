use std::path::{Path, PathBuf};

/// Write `contents` to `path` through a temp file in the same directory, so
/// readers never see a half-written dataset.
///
/// # Errors
///
/// Returns an error if the directory cannot be created or the file cannot be
/// written or moved into place. The temp file is removed on failure.
pub(crate) async fn write_json_atomic(path: &Path, contents: &str) -> anyhow::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let file_name = path
        .file_name()
        .ok_or_else(|| anyhow::anyhow!("output path {} has no file name", path.display()))?;

    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(|e| anyhow::anyhow!("failed to create {}: {e}", dir.display()))?;

    let temp = dir.join(format!(".{}.tmp", file_name.to_string_lossy()));
    let written = match tokio::fs::write(&temp, contents).await {
        Ok(()) => tokio::fs::rename(&temp, path).await,
        Err(e) => Err(e),
    };

    if let Err(e) = written {
        if let Err(cleanup) = tokio::fs::remove_file(&temp).await {
            tracing::debug!(path = %temp.display(), error = %cleanup, "temp file not removed");
        }
        anyhow::bail!("failed to write {}: {e}", path.display());
    }

    tracing::debug!(path = %path.display(), bytes = contents.len(), "wrote output");
    Ok(())
}

/// Copy an existing file at `path` to `<path>.bak` before it is replaced.
/// Returns the backup path, or `None` when there was nothing to keep.
///
/// # Errors
///
/// Returns an error if the existing file cannot be copied.
pub(crate) async fn backup_existing(path: &Path) -> anyhow::Result<Option<PathBuf>> {
    if !tokio::fs::try_exists(path).await.unwrap_or(false) {
        return Ok(None);
    }
    let mut name = path.as_os_str().to_os_string();
    name.push(".bak");
    let backup = PathBuf::from(name);

    tokio::fs::copy(path, &backup)
        .await
        .map_err(|e| anyhow::anyhow!("failed to back up {}: {e}", path.display()))?;
    tracing::info!(path = %path.display(), backup = %backup.display(), "kept previous output");
    Ok(Some(backup))
}
