//! The merged output document and its run metadata.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::record::{CanonicalRecord, FieldValue};
use crate::source::Source;

/// `{"restaurants": [...], "metadata": {...}}` as written by `nbdb-cli merge`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MergedDocument {
    pub restaurants: Vec<CanonicalRecord>,
    #[serde(default)]
    pub metadata: Metadata,
}

/// Why a document is unfit to be written.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DocumentError {
    #[error("restaurant #{index} has an empty id")]
    EmptyId { index: usize },

    #[error("restaurant id {id} appears more than once")]
    DuplicateId { id: String },

    #[error("restaurant {id} has an empty name")]
    EmptyName { id: String },

    #[error("restaurant {id} has invalid coordinates ({latitude}, {longitude})")]
    InvalidCoordinates {
        id: String,
        latitude: f64,
        longitude: f64,
    },
}

impl MergedDocument {
    /// Check every restaurant has a unique non-empty id, a non-empty name,
    /// and either valid coordinates or none.
    ///
    /// # Errors
    ///
    /// Returns the first [`DocumentError`] found, in restaurant order.
    pub fn validate(&self) -> Result<(), DocumentError> {
        let mut ids: HashSet<&str> = HashSet::new();
        for (index, record) in self.restaurants.iter().enumerate() {
            let id = record.id.trim();
            if id.is_empty() {
                return Err(DocumentError::EmptyId { index });
            }
            if !ids.insert(id) {
                return Err(DocumentError::DuplicateId { id: id.to_string() });
            }
            if record.name.trim().is_empty() {
                return Err(DocumentError::EmptyName { id: id.to_string() });
            }
            if let Some(point) = record.coordinates.filter(|c| !c.is_valid()) {
                return Err(DocumentError::InvalidCoordinates {
                    id: id.to_string(),
                    latitude: point.latitude,
                    longitude: point.longitude,
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Metadata {
    pub timestamp: DateTime<Utc>,
    /// Raw records read per source.
    pub source_counts: BTreeMap<Source, usize>,
    pub inputs: Vec<InputSummary>,
    pub skipped_inputs: Vec<SkippedInput>,
    pub match_statistics: MatchStatistics,
    pub conflicts: Vec<FieldConflict>,
    pub geo_outliers: Vec<GeoOutlier>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputSummary {
    pub kind: String,
    pub path: String,
    pub records: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedInput {
    pub path: String,
    pub reason: String,
}

/// Counters describing how a run collapsed its input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchStatistics {
    pub records_in: usize,
    pub canonical_out: usize,
    /// Joins made because two records shared a `(source, external_id)`.
    pub linked_by_id: usize,
    /// Joins made on identical normalized `name|address` keys.
    pub exact_matches: usize,
    /// Joins made by the similarity test between unmatched singletons.
    pub fuzzy_matches: usize,
    /// Joins made while reconciling already-formed groups.
    pub convergence_merges: usize,
    /// Input records that ended up attached to a pre-existing canonical record.
    pub merged_onto_existing: usize,
    /// Output records backed by a single observation.
    pub singletons: usize,
    /// Records lacking a name or address, so only identity linking applies.
    pub unmatchable: usize,
    pub conflicts: usize,
    pub geo_outliers: usize,
}

/// Two sources disagreed on a scalar; `kept` won the tie-break.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldConflict {
    pub record_id: String,
    pub name: String,
    pub field: String,
    pub kept: FieldValue,
    pub discarded: Vec<FieldValue>,
}

/// An observation whose coordinates sit far from its group's centroid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoOutlier {
    pub record_id: String,
    pub name: String,
    pub source: Source,
    pub external_id: Option<String>,
    pub distance_km: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Coordinates;

    fn restaurant(id: &str, name: &str) -> CanonicalRecord {
        serde_json::from_value(serde_json::json!({
            "id": id, "name": name, "address": null, "city": null, "state": null,
            "coordinates": null
        }))
        .unwrap()
    }

    #[test]
    fn valid_document_passes() {
        let mut located = restaurant("b", "Joe's");
        located.coordinates = Some(Coordinates::new(35.05, -85.31));
        let document = MergedDocument {
            restaurants: vec![restaurant("a", "Unknown"), located],
            ..MergedDocument::default()
        };
        assert_eq!(document.validate(), Ok(()));
    }

    #[test]
    fn invalid_documents_are_caught() {
        let cases = [
            (vec![restaurant(" ", "Joe's")], DocumentError::EmptyId { index: 0 }),
            (
                vec![restaurant("a", "Joe's"), restaurant("a", "Sushi Nabe")],
                DocumentError::DuplicateId { id: "a".to_string() },
            ),
            (vec![restaurant("a", "  ")], DocumentError::EmptyName { id: "a".to_string() }),
        ];
        for (restaurants, expected) in cases {
            let document = MergedDocument {
                restaurants,
                ..MergedDocument::default()
            };
            assert_eq!(document.validate(), Err(expected));
        }

        let mut stray = restaurant("a", "Joe's");
        stray.coordinates = Some(Coordinates::new(0.0, 0.0));
        let document = MergedDocument {
            restaurants: vec![stray],
            ..MergedDocument::default()
        };
        assert!(matches!(
            document.validate(),
            Err(DocumentError::InvalidCoordinates { .. })
        ));
    }

    #[test]
    fn document_without_metadata_parses() {
        let doc: MergedDocument = serde_json::from_str(r#"{"restaurants": []}"#).unwrap();
        assert!(doc.restaurants.is_empty());
        assert_eq!(doc.metadata.match_statistics, MatchStatistics::default());
    }

    #[test]
    fn partial_statistics_default_the_rest() {
        let stats: MatchStatistics =
            serde_json::from_str(r#"{"records_in": 4, "exact_matches": 1}"#).unwrap();
        assert_eq!(stats.records_in, 4);
        assert_eq!(stats.exact_matches, 1);
        assert_eq!(stats.fuzzy_matches, 0);
    }
}
