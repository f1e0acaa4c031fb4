use std::path::Path;

use nbdb_core::CanonicalRecord;
use nbdb_resolver::Resolver;
use nbdb_sources::{read_dataset, StoredDataset};

/// Read the canonical records of a stored dataset. Entries of a legacy
/// export become one record each, so duplicates among them stay visible.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is neither a merged nor a
/// legacy dataset.
pub(crate) async fn read_canonical(
    path: &Path,
    resolver: &Resolver,
) -> anyhow::Result<Vec<CanonicalRecord>> {
    match read_dataset(path).await? {
        StoredDataset::Merged(document) => Ok(document.restaurants),
        StoredDataset::Legacy(entries) => {
            tracing::info!(path = %path.display(), entries = entries.len(), "reading legacy dataset");
            Ok(resolver.collapse(&entries))
        }
    }
}
