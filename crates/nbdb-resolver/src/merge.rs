//! Collapsing a matched group of observations into one canonical record.
//!
//! Scalars (name, address, locality, coordinates) come from the first member
//! holding a non-empty value, with members drawn from an existing canonical
//! record first and the rest ordered by source trust, then input order. The
//! `fields` bag follows the same trust order except where a field names a
//! preferred source. Every losing value is kept as an alternate.

use std::collections::{BTreeMap, BTreeSet};

use nbdb_core::{
    is_blank_value, CanonicalRecord, Coordinates, FieldConflict, FieldEntry, FieldValue,
    GeoOutlier, RawRecord, Source,
};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::config::ResolverConfig;
use crate::geo;
use crate::normalize::{is_placeholder_name, normalize, PLACEHOLDER_NAME};

/// One observation taking part in a resolver run.
#[derive(Debug, Clone)]
pub(crate) struct Member {
    pub(crate) record: RawRecord,
    /// Position across existing views and input batches.
    pub(crate) order: usize,
    /// Index of the existing canonical record this member was decomposed from.
    pub(crate) anchor: Option<usize>,
}

impl Member {
    fn trust_key(&self) -> (u8, usize) {
        (self.record.source.trust_rank(), self.order)
    }

    fn scalar_key(&self) -> (bool, u8, usize) {
        (
            self.anchor.is_none(),
            self.record.source.trust_rank(),
            self.order,
        )
    }
}

/// A canonical record before its id is assigned.
#[derive(Debug, Clone)]
pub(crate) struct Draft {
    pub(crate) record: CanonicalRecord,
    pub(crate) conflicts: Vec<FieldConflict>,
    pub(crate) outliers: Vec<GeoOutlier>,
    pub(crate) anchor: Option<usize>,
    pub(crate) first_order: usize,
    pub(crate) size: usize,
}

impl Draft {
    /// An existing record carried into the output as it is.
    pub(crate) fn unchanged(record: CanonicalRecord) -> Self {
        Self {
            record,
            conflicts: Vec::new(),
            outliers: Vec::new(),
            anchor: None,
            first_order: usize::MAX,
            size: 0,
        }
    }

    /// Set the final id on the record and everything reported against it.
    pub(crate) fn assign_id(&mut self, id: String) {
        for conflict in &mut self.conflicts {
            conflict.record_id.clone_from(&id);
        }
        for outlier in &mut self.outliers {
            outlier.record_id.clone_from(&id);
        }
        self.record.id = id;
    }
}

/// Stable id over the normalized name, normalized address and every
/// `source:id` pair.
#[must_use]
pub fn canonical_id(
    name: &str,
    address: Option<&str>,
    source_ids: &BTreeMap<Source, BTreeSet<String>>,
) -> String {
    let mut input = format!("{}\x00{}", normalize(name), normalize(address.unwrap_or("")));
    for (source, ids) in source_ids {
        for id in ids {
            input.push('\x00');
            input.push_str(source.as_str());
            input.push(':');
            input.push_str(id);
        }
    }
    format!("{:x}", Sha256::digest(input.as_bytes()))
}

/// Merge the candidate values of one field, given in trust order.
///
/// The first value from `preferred` wins when present, otherwise the first
/// candidate. Remaining values become alternates, each distinct value once.
#[must_use]
pub fn merge_field(candidates: &[FieldValue], preferred: Option<Source>) -> Option<FieldEntry> {
    let candidates: Vec<&FieldValue> = candidates
        .iter()
        .filter(|c| !is_blank_value(&c.value))
        .collect();

    let primary_at = preferred
        .and_then(|source| candidates.iter().position(|c| c.source == source))
        .unwrap_or(0);
    let primary = candidates.get(primary_at)?;

    let mut alternates: Vec<FieldValue> = Vec::new();
    for (at, candidate) in candidates.iter().enumerate() {
        if at == primary_at
            || candidate.value == primary.value
            || alternates.iter().any(|a| a.value == candidate.value)
        {
            continue;
        }
        alternates.push((*candidate).clone());
    }

    Some(FieldEntry {
        value: primary.value.clone(),
        source: primary.source,
        alternates,
    })
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// The record's name unless it is blank or the placeholder.
fn real_name(record: &RawRecord) -> Option<&str> {
    Some(record.name.as_str()).filter(|name| !is_placeholder_name(name))
}

fn pick<'a>(
    ordered: &[&'a Member],
    get: impl Fn(&'a RawRecord) -> Option<&'a str>,
) -> Option<(&'a str, Source)> {
    ordered
        .iter()
        .find_map(|m| non_empty(get(&m.record)).map(|v| (v, m.record.source)))
}

/// Name and address the group is represented by. A group with no real name
/// is reported under the placeholder.
pub(crate) fn representative(members: &[&Member]) -> (String, Option<String>) {
    let mut ordered = members.to_vec();
    ordered.sort_by_key(|m| m.scalar_key());
    let name = pick(&ordered, real_name).map_or(PLACEHOLDER_NAME, |(v, _)| v);
    let address = pick(&ordered, |r| r.address.as_deref()).map(|(v, _)| v.to_string());
    (name.to_string(), address)
}

/// Values disagreeing with `kept` after normalization, one per distinct value.
fn scalar_conflict(
    field: &str,
    name: &str,
    ordered: &[&Member],
    get: impl Fn(&RawRecord) -> Option<&str>,
    kept: Option<(&str, Source)>,
) -> Option<FieldConflict> {
    let (kept_value, kept_source) = kept?;
    let mut seen = BTreeSet::from([normalize(kept_value)]);
    let discarded: Vec<FieldValue> = ordered
        .iter()
        .filter_map(|m| non_empty(get(&m.record)).map(|v| (v, m.record.source)))
        .filter(|(v, _)| seen.insert(normalize(v)))
        .map(|(v, source)| FieldValue {
            value: Value::String(v.to_string()),
            source,
        })
        .collect();

    (!discarded.is_empty()).then(|| FieldConflict {
        record_id: String::new(),
        name: name.to_string(),
        field: field.to_string(),
        kept: FieldValue {
            value: Value::String(kept_value.to_string()),
            source: kept_source,
        },
        discarded,
    })
}

/// Collapse one group. `members` must be non-empty.
pub(crate) fn build(members: &[&Member], config: &ResolverConfig) -> Draft {
    let mut by_scalar = members.to_vec();
    by_scalar.sort_by_key(|m| m.scalar_key());
    let mut by_trust = members.to_vec();
    by_trust.sort_by_key(|m| m.trust_key());

    let name = pick(&by_scalar, real_name);
    let address = pick(&by_scalar, |r| r.address.as_deref());
    let city = pick(&by_scalar, |r| r.city.as_deref());
    let state = pick(&by_scalar, |r| r.state.as_deref());
    let coordinates = by_scalar
        .iter()
        .filter_map(|m| m.record.coordinates)
        .find(Coordinates::is_valid);

    let canonical_name = name.map_or(PLACEHOLDER_NAME, |(v, _)| v).to_string();

    let mut conflicts: Vec<FieldConflict> = [
        scalar_conflict("name", &canonical_name, &by_scalar, real_name, name),
        scalar_conflict("address", &canonical_name, &by_scalar, |r| r.address.as_deref(), address),
        scalar_conflict("city", &canonical_name, &by_scalar, |r| r.city.as_deref(), city),
        scalar_conflict("state", &canonical_name, &by_scalar, |r| r.state.as_deref(), state),
    ]
    .into_iter()
    .flatten()
    .collect();

    let mut categories = BTreeSet::new();
    let mut source_ids: BTreeMap<Source, BTreeSet<String>> = BTreeMap::new();
    let mut contributing_sources = BTreeSet::new();
    let mut candidates: BTreeMap<&str, Vec<FieldValue>> = BTreeMap::new();

    for member in &by_trust {
        let record = &member.record;
        contributing_sources.insert(record.source);
        if let Some(id) = record.identity() {
            source_ids
                .entry(record.source)
                .or_default()
                .insert(id.to_string());
        }
        categories.extend(
            record
                .categories
                .iter()
                .map(|c| c.trim())
                .filter(|c| !c.is_empty())
                .map(str::to_string),
        );
        for (key, value) in &record.extra {
            candidates.entry(key.as_str()).or_default().push(FieldValue {
                value: value.clone(),
                source: record.source,
            });
        }
    }

    let mut fields = BTreeMap::new();
    for (key, values) in candidates {
        let preferred = config.field_preferences.get(key).copied();
        let Some(entry) = merge_field(&values, preferred) else {
            continue;
        };
        if !entry.alternates.is_empty() {
            conflicts.push(FieldConflict {
                record_id: String::new(),
                name: canonical_name.clone(),
                field: key.to_string(),
                kept: FieldValue {
                    value: entry.value.clone(),
                    source: entry.source,
                },
                discarded: entry.alternates.clone(),
            });
        }
        fields.insert(key.to_string(), entry);
    }

    let outliers = geo::centroid(members.iter().filter_map(|m| m.record.coordinates.as_ref()))
        .map(|center| {
            members
                .iter()
                .filter_map(|m| {
                    let point = m.record.coordinates.as_ref()?;
                    let distance = geo::outlier_distance(point, &center, config.geo_outlier_km)?;
                    Some(GeoOutlier {
                        record_id: String::new(),
                        name: canonical_name.clone(),
                        source: m.record.source,
                        external_id: m.record.identity().map(str::to_string),
                        distance_km: distance,
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    Draft {
        record: CanonicalRecord {
            id: String::new(),
            name: canonical_name,
            address: address.map(|(v, _)| v.to_string()),
            city: city.map(|(v, _)| v.to_string()),
            state: state.map(|(v, _)| v.to_string()),
            coordinates,
            categories,
            source_ids,
            fields,
            contributing_sources,
        },
        conflicts,
        outliers,
        anchor: by_scalar.first().and_then(|m| m.anchor),
        first_order: members.iter().map(|m| m.order).min().unwrap_or(0),
        size: members.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn member(order: usize, record: RawRecord) -> Member {
        Member {
            record,
            order,
            anchor: None,
        }
    }

    fn value(value: Value, source: Source) -> FieldValue {
        FieldValue { value, source }
    }

    #[test]
    fn preferred_source_wins_field() {
        let entry = merge_field(
            &[
                value(json!("b.com"), Source::Foursquare),
                value(json!("a.com"), Source::GooglePlaces),
            ],
            Some(Source::GooglePlaces),
        )
        .unwrap();
        assert_eq!(entry.value, json!("a.com"));
        assert_eq!(entry.source, Source::GooglePlaces);
        assert_eq!(entry.alternates, vec![value(json!("b.com"), Source::Foursquare)]);
    }

    #[test]
    fn first_non_empty_wins_without_preference() {
        let entry = merge_field(
            &[
                value(json!(""), Source::GooglePlaces),
                value(json!("555-0100"), Source::Foursquare),
                value(json!("555-0100"), Source::Osm),
                value(Value::Null, Source::Osm),
            ],
            None,
        )
        .unwrap();
        assert_eq!(entry.value, json!("555-0100"));
        assert_eq!(entry.source, Source::Foursquare);
        assert!(entry.alternates.is_empty());
    }

    #[test]
    fn all_empty_field_is_dropped() {
        assert!(merge_field(&[value(json!([]), Source::Osm)], None).is_none());
    }

    #[test]
    fn build_prefers_trusted_scalars_and_unions_categories() {
        let osm = member(
            0,
            RawRecord::new(Source::Osm, "Main St Diner")
                .with_external_id("node/1")
                .with_address("5 Main St")
                .with_category("diner"),
        );
        let google = member(
            1,
            RawRecord::new(Source::GooglePlaces, "Main Street Diner")
                .with_external_id("ChIJ1")
                .with_address("5 Main Street")
                .with_locality("Chattanooga", "TN")
                .with_category("restaurant"),
        );
        let draft = build(&[&osm, &google], &ResolverConfig::default());
        let record = &draft.record;

        assert_eq!(record.name, "Main Street Diner");
        assert_eq!(record.address.as_deref(), Some("5 Main Street"));
        assert_eq!(record.city.as_deref(), Some("Chattanooga"));
        assert_eq!(record.categories.len(), 2);
        assert!(record.has_source_id(Source::Osm, "node/1"));
        assert!(record.has_source_id(Source::GooglePlaces, "ChIJ1"));
        assert_eq!(
            draft
                .conflicts
                .iter()
                .map(|c| c.field.as_str())
                .collect::<Vec<_>>(),
            vec!["name", "address"]
        );
    }

    #[test]
    fn anchored_member_keeps_its_name() {
        let mut existing = member(0, RawRecord::new(Source::Osm, "Joe's").with_address("1 A St"));
        existing.anchor = Some(0);
        let google = member(1, RawRecord::new(Source::GooglePlaces, "Joe's Cafe"));
        let draft = build(&[&existing, &google], &ResolverConfig::default());
        assert_eq!(draft.record.name, "Joe's");
        assert_eq!(draft.anchor, Some(0));
    }

    #[test]
    fn placeholder_name_never_beats_a_real_one() {
        let unnamed = member(
            0,
            RawRecord::new(Source::Foursquare, "Unknown")
                .with_external_id("fsq-2")
                .with_address("5 Main St"),
        );
        let blank = member(1, RawRecord::new(Source::GooglePlaces, " "));
        let named = member(
            2,
            RawRecord::new(Source::Foursquare, "Main St Diner")
                .with_external_id("fsq-2")
                .with_address("5 Main St"),
        );
        let group = [&unnamed, &blank, &named];

        let draft = build(&group, &ResolverConfig::default());
        assert_eq!(draft.record.name, "Main St Diner");
        assert!(draft.conflicts.iter().all(|c| c.field != "name"));
        assert_eq!(representative(&group).0, "Main St Diner");
    }

    #[test]
    fn anchored_placeholder_yields_to_a_real_name() {
        let mut existing = member(0, RawRecord::new(Source::Osm, "unknown"));
        existing.anchor = Some(0);
        let google = member(1, RawRecord::new(Source::GooglePlaces, "Joe's Cafe"));
        let draft = build(&[&existing, &google], &ResolverConfig::default());
        assert_eq!(draft.record.name, "Joe's Cafe");
        assert_eq!(draft.anchor, Some(0));
    }

    #[test]
    fn empty_name_becomes_placeholder() {
        let only = member(0, RawRecord::new(Source::Osm, "  "));
        let draft = build(&[&only], &ResolverConfig::default());
        assert_eq!(draft.record.name, PLACEHOLDER_NAME);
    }

    #[test]
    fn id_is_stable_and_order_free() {
        let mut ids = BTreeMap::new();
        ids.insert(Source::Osm, BTreeSet::from(["node/1".to_string()]));
        let a = canonical_id("Joe's", Some("1 A St"), &ids);
        let b = canonical_id(" joe's ", Some("1  a st"), &ids);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_ne!(a, canonical_id("Joe's", Some("1 A St"), &BTreeMap::new()));
    }
}
