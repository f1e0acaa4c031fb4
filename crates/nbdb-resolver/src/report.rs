//! Read-only reports over an already merged dataset.

use std::collections::{BTreeMap, HashSet};

use nbdb_core::{CanonicalRecord, RawRecord};
use serde::{Deserialize, Serialize};

use crate::config::ResolverConfig;
use crate::normalize::{bucket_key, exact_key, lookup_key};
use crate::similarity::compare;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateMatch {
    /// Index of the duplicate in the input slice.
    pub index: usize,
    pub name_similarity: f64,
    pub address_similarity: f64,
}

/// A record and the later records that pass the duplicate test against it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateGroup {
    pub original: usize,
    pub duplicates: Vec<DuplicateMatch>,
}

/// Find likely duplicates in a merged dataset without changing it.
///
/// Records are bucketed like the resolver's fuzzy phase. Within a bucket the
/// first unclaimed record collects every later unclaimed record it matches.
/// Records without a usable name or address are skipped.
#[must_use]
pub fn find_duplicate_groups(
    records: &[CanonicalRecord],
    config: &ResolverConfig,
) -> Vec<DuplicateGroup> {
    let mut buckets: BTreeMap<char, Vec<usize>> = BTreeMap::new();
    for (index, record) in records.iter().enumerate() {
        if exact_key(&record.name, record.address.as_deref()).is_none() {
            continue;
        }
        if let Some(bucket) = bucket_key(&record.name, config.bucket_strategy) {
            buckets.entry(bucket).or_default().push(index);
        }
    }

    let mut processed: HashSet<usize> = HashSet::new();
    let mut groups = Vec::new();

    for bucket in buckets.values() {
        for (at, &original) in bucket.iter().enumerate() {
            if processed.contains(&original) {
                continue;
            }
            let a = &records[original];
            let mut duplicates = Vec::new();
            for &index in &bucket[at + 1..] {
                if processed.contains(&index) {
                    continue;
                }
                let b = &records[index];
                if let Some((name_similarity, address_similarity)) = compare(
                    (a.name.as_str(), a.address.as_deref().unwrap_or("")),
                    (b.name.as_str(), b.address.as_deref().unwrap_or("")),
                    config,
                ) {
                    processed.insert(index);
                    duplicates.push(DuplicateMatch {
                        index,
                        name_similarity,
                        address_similarity,
                    });
                }
            }
            if !duplicates.is_empty() {
                processed.insert(original);
                groups.push(DuplicateGroup {
                    original,
                    duplicates,
                });
            }
        }
    }

    groups.sort_by_key(|g| g.original);
    groups
}

/// Candidates whose `name|address` key is absent from `merged`, one per key,
/// sorted by key.
#[must_use]
pub fn differential(candidates: &[RawRecord], merged: &[CanonicalRecord]) -> Vec<RawRecord> {
    let known: HashSet<String> = merged
        .iter()
        .map(|r| lookup_key(&r.name, r.address.as_deref()))
        .collect();

    let mut missing: BTreeMap<String, &RawRecord> = BTreeMap::new();
    for candidate in candidates {
        let key = lookup_key(&candidate.name, candidate.address.as_deref());
        if !known.contains(&key) {
            missing.entry(key).or_insert(candidate);
        }
    }

    missing.into_values().cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    use nbdb_core::Source;

    fn canonical(id: &str, name: &str, address: Option<&str>) -> CanonicalRecord {
        CanonicalRecord {
            id: id.to_string(),
            name: name.to_string(),
            address: address.map(str::to_string),
            city: None,
            state: None,
            coordinates: None,
            categories: BTreeSet::new(),
            source_ids: BTreeMap::new(),
            fields: BTreeMap::new(),
            contributing_sources: BTreeSet::from([Source::Osm]),
        }
    }

    #[test]
    fn reports_each_duplicate_once() {
        let records = vec![
            canonical("1", "Main St Diner", Some("5 Main St")),
            canonical("2", "Sushi Nabe", Some("2 B St")),
            canonical("3", "Main Street Diner", Some("5 Main Street")),
            canonical("4", "Main St. Diner", Some("5 Main St")),
            canonical("5", "Unknown", Some("5 Main St")),
        ];
        let groups = find_duplicate_groups(&records, &ResolverConfig::default());

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].original, 0);
        let indices: Vec<usize> = groups[0].duplicates.iter().map(|d| d.index).collect();
        assert_eq!(indices, vec![2, 3]);
        assert!(groups[0]
            .duplicates
            .iter()
            .all(|d| d.name_similarity >= 0.85 && d.address_similarity >= 0.85));
    }

    #[test]
    fn clean_dataset_has_no_groups() {
        let records = vec![
            canonical("1", "Main St Diner", Some("5 Main St")),
            canonical("2", "Main St Pizza", Some("5 Main St")),
        ];
        assert!(find_duplicate_groups(&records, &ResolverConfig::default()).is_empty());
    }

    #[test]
    fn differential_keeps_unknown_keys_sorted_and_once() {
        let merged = vec![canonical("1", "Joe's", Some("1 A St"))];
        let candidates = vec![
            RawRecord::new(Source::Foursquare, "Taco Mamacita").with_address("3 C St"),
            RawRecord::new(Source::Foursquare, "JOE'S").with_address("1  A St"),
            RawRecord::new(Source::Osm, "Basil").with_address("4 D St"),
            RawRecord::new(Source::Osm, "taco mamacita").with_address("3 c st"),
        ];

        let missing = differential(&candidates, &merged);
        let names: Vec<&str> = missing.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Basil", "Taco Mamacita"]);
    }
}
