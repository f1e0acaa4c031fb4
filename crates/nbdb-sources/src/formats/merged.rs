//! Documents previously written by `nbdb-cli merge`, read back as
//! per-source observations. Datasets from the earlier merge script are
//! accepted too.

use nbdb_core::{CanonicalRecord, MergedDocument, RawRecord};
use serde_json::Value;

use super::legacy::parse_legacy;

pub(crate) fn parse_merged(document: &Value) -> Option<Vec<RawRecord>> {
    document.get("restaurants")?;
    match serde_json::from_value::<MergedDocument>(document.clone()) {
        Ok(merged) => Some(
            merged
                .restaurants
                .iter()
                .flat_map(CanonicalRecord::member_views)
                .collect(),
        ),
        Err(_) => parse_legacy(document).map(|entries| entries.into_iter().flatten().collect()),
    }
}
