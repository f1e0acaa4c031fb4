//! Raw observations and the canonical records they resolve into.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::source::Source;

/// Mean Earth radius in kilometres (IUGG).
const EARTH_RADIUS_KM: f64 = 6_371.008_8;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    #[must_use]
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Whether the pair is finite, in range, and not the `(0, 0)` placeholder
    /// some upstream geocoders emit for "unknown".
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
            && !(self.latitude == 0.0 && self.longitude == 0.0)
    }

    /// Great-circle distance in kilometres (haversine).
    #[must_use]
    pub fn distance_km(&self, other: &Coordinates) -> f64 {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let d_lat = lat2 - lat1;
        let d_lon = (other.longitude - self.longitude).to_radians();

        let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
    }
}

/// Whether a JSON value carries no information: null, a blank string, or an
/// empty array or object.
#[must_use]
pub fn is_blank_value(value: &serde_json::Value) -> bool {
    use serde_json::Value;
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

/// A single source's observation of a restaurant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub source: Source,
    /// Source-specific primary key (Places `id`, `fsq_id`, `node/123`, `recid`).
    /// Only comparable with ids of the same source.
    pub external_id: Option<String>,
    pub name: String,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub coordinates: Option<Coordinates>,
    #[serde(default)]
    pub categories: BTreeSet<String>,
    /// Source-specific attributes (phone, website, rating, hours, photos...).
    #[serde(default)]
    pub extra: BTreeMap<String, serde_json::Value>,
    /// Id of the canonical record this observation was decomposed from.
    /// Observations sharing an origin always resolve into one record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
}

impl RawRecord {
    #[must_use]
    pub fn new(source: Source, name: impl Into<String>) -> Self {
        Self {
            source,
            external_id: None,
            name: name.into(),
            address: None,
            city: None,
            state: None,
            coordinates: None,
            categories: BTreeSet::new(),
            extra: BTreeMap::new(),
            origin: None,
        }
    }

    #[must_use]
    pub fn with_external_id(mut self, id: impl Into<String>) -> Self {
        self.external_id = Some(id.into());
        self
    }

    #[must_use]
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    #[must_use]
    pub fn with_locality(mut self, city: impl Into<String>, state: impl Into<String>) -> Self {
        self.city = Some(city.into());
        self.state = Some(state.into());
        self
    }

    #[must_use]
    pub fn with_coordinates(mut self, latitude: f64, longitude: f64) -> Self {
        self.coordinates = Some(Coordinates::new(latitude, longitude));
        self
    }

    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.categories.insert(category.into());
        self
    }

    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// The trimmed external id, treating blank strings as absent.
    #[must_use]
    pub fn identity(&self) -> Option<&str> {
        self.external_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }
}

/// One ordered input collection, typically one JSON file.
#[derive(Debug, Clone, Default)]
pub struct Batch {
    /// Human-readable origin, usually the file path.
    pub label: String,
    pub records: Vec<RawRecord>,
}

impl Batch {
    #[must_use]
    pub fn new(label: impl Into<String>, records: Vec<RawRecord>) -> Self {
        Self {
            label: label.into(),
            records,
        }
    }
}

/// A value together with the source that supplied it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldValue {
    pub value: serde_json::Value,
    pub source: Source,
}

/// The merged value of one attribute plus every losing value, kept for audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldEntry {
    pub value: serde_json::Value,
    pub source: Source,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alternates: Vec<FieldValue>,
}

impl FieldEntry {
    /// Primary value first, then alternates in stored order.
    pub fn values(&self) -> impl Iterator<Item = FieldValue> + '_ {
        std::iter::once(FieldValue {
            value: self.value.clone(),
            source: self.source,
        })
        .chain(self.alternates.iter().cloned())
    }
}

/// The de-duplicated representation of one physical restaurant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub id: String,
    pub name: String,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub coordinates: Option<Coordinates>,
    #[serde(default)]
    pub categories: BTreeSet<String>,
    #[serde(default)]
    pub source_ids: BTreeMap<Source, BTreeSet<String>>,
    #[serde(default)]
    pub fields: BTreeMap<String, FieldEntry>,
    #[serde(default)]
    pub contributing_sources: BTreeSet<Source>,
}

impl CanonicalRecord {
    /// Primary value of an attribute in the `fields` bag.
    #[must_use]
    pub fn field(&self, key: &str) -> Option<&serde_json::Value> {
        self.fields.get(key).map(|entry| &entry.value)
    }

    /// Whether `(source, id)` is attached to this record.
    #[must_use]
    pub fn has_source_id(&self, source: Source, id: &str) -> bool {
        self.source_ids
            .get(&source)
            .is_some_and(|ids| ids.contains(id))
    }

    /// Decompose into per-source raw observations.
    ///
    /// Each view carries the canonical name, address, locality, coordinates
    /// and category union, plus the field values attributed to its source.
    /// A source with several ids or several values for one field yields one
    /// view per position; views past the last id reuse it. Every view names
    /// this record as its origin, so the views rejoin even when their ids
    /// differ. Resolving the views of a resolver output reproduces that
    /// output.
    #[must_use]
    pub fn member_views(&self) -> Vec<RawRecord> {
        let mut views = Vec::new();

        for &source in &self.contributing_sources {
            let ids: Vec<&String> = self
                .source_ids
                .get(&source)
                .map(|ids| ids.iter().collect())
                .unwrap_or_default();

            let mut values: BTreeMap<&str, Vec<serde_json::Value>> = BTreeMap::new();
            for (key, entry) in &self.fields {
                for field_value in entry.values().filter(|v| v.source == source) {
                    values
                        .entry(key.as_str())
                        .or_default()
                        .push(field_value.value);
                }
            }

            let depth = values
                .values()
                .map(Vec::len)
                .max()
                .unwrap_or(0)
                .max(ids.len())
                .max(1);

            for position in 0..depth {
                let external_id = ids
                    .get(position)
                    .or_else(|| ids.last())
                    .map(|id| (*id).clone());
                let extra = values
                    .iter()
                    .filter_map(|(key, vals)| {
                        vals.get(position).map(|v| ((*key).to_string(), v.clone()))
                    })
                    .collect();

                views.push(RawRecord {
                    source,
                    external_id,
                    name: self.name.clone(),
                    address: self.address.clone(),
                    city: self.city.clone(),
                    state: self.state.clone(),
                    coordinates: self.coordinates,
                    categories: self.categories.clone(),
                    extra,
                    origin: Some(self.id.clone()),
                });
            }
        }

        views
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn canonical() -> CanonicalRecord {
        let mut source_ids = BTreeMap::new();
        source_ids.insert(
            Source::Foursquare,
            BTreeSet::from(["fsq-1".to_string(), "fsq-2".to_string()]),
        );
        source_ids.insert(Source::GooglePlaces, BTreeSet::from(["ChIJ1".to_string()]));

        let mut fields = BTreeMap::new();
        fields.insert(
            "website".to_string(),
            FieldEntry {
                value: json!("a.com"),
                source: Source::GooglePlaces,
                alternates: vec![FieldValue {
                    value: json!("b.com"),
                    source: Source::Osm,
                }],
            },
        );
        fields.insert(
            "phone".to_string(),
            FieldEntry {
                value: json!("555-0100"),
                source: Source::Foursquare,
                alternates: vec![FieldValue {
                    value: json!("555-0199"),
                    source: Source::Foursquare,
                }],
            },
        );

        CanonicalRecord {
            id: "abc".to_string(),
            name: "Main St Diner".to_string(),
            address: Some("5 Main St".to_string()),
            city: Some("Chattanooga".to_string()),
            state: Some("TN".to_string()),
            coordinates: Some(Coordinates::new(35.05, -85.31)),
            categories: BTreeSet::from(["Diner".to_string()]),
            source_ids,
            fields,
            contributing_sources: BTreeSet::from([
                Source::GooglePlaces,
                Source::Foursquare,
                Source::Osm,
            ]),
        }
    }

    #[test]
    fn distance_between_downtown_and_airport() {
        let downtown = Coordinates::new(35.0456, -85.3097);
        let airport = Coordinates::new(35.0353, -85.2038);
        let km = downtown.distance_km(&airport);
        assert!((9.0..10.5).contains(&km), "got {km}");
    }

    #[test]
    fn null_island_is_invalid() {
        assert!(!Coordinates::new(0.0, 0.0).is_valid());
        assert!(!Coordinates::new(91.0, 10.0).is_valid());
        assert!(Coordinates::new(35.0, -85.0).is_valid());
    }

    #[test]
    fn identity_ignores_blank_ids() {
        let record = RawRecord::new(Source::Osm, "x").with_external_id("  ");
        assert_eq!(record.identity(), None);
        let record = RawRecord::new(Source::Osm, "x").with_external_id(" node/1 ");
        assert_eq!(record.identity(), Some("node/1"));
    }

    #[test]
    fn member_views_cover_every_source_and_id() {
        let record = canonical();
        let views = record.member_views();

        // google: 1 view, foursquare: 2 ids / 2 phones -> 2 views, osm: 1 view
        assert_eq!(views.len(), 4);
        assert!(views.iter().all(|v| v.name == "Main St Diner"));
        assert!(views
            .iter()
            .all(|v| v.address.as_deref() == Some("5 Main St")));

        let fsq: Vec<_> = views
            .iter()
            .filter(|v| v.source == Source::Foursquare)
            .collect();
        assert_eq!(fsq[0].external_id.as_deref(), Some("fsq-1"));
        assert_eq!(fsq[1].external_id.as_deref(), Some("fsq-2"));
        assert_eq!(fsq[0].extra.get("phone"), Some(&json!("555-0100")));
        assert_eq!(fsq[1].extra.get("phone"), Some(&json!("555-0199")));

        let osm = views.iter().find(|v| v.source == Source::Osm).unwrap();
        assert_eq!(osm.external_id, None);
        assert_eq!(osm.extra.get("website"), Some(&json!("b.com")));

        assert!(views.iter().all(|v| v.origin.as_deref() == Some("abc")));
    }

    #[test]
    fn origin_is_omitted_from_json_when_absent() {
        let record = RawRecord::new(Source::Osm, "Joe's");
        let text = serde_json::to_string(&record).unwrap();
        assert!(!text.contains("origin"));

        let view = record.with_origin("abc");
        let back: RawRecord = serde_json::from_str(&serde_json::to_string(&view).unwrap()).unwrap();
        assert_eq!(back.origin.as_deref(), Some("abc"));
    }

    #[test]
    fn blank_values() {
        for blank in [json!(null), json!("  "), json!([]), json!({})] {
            assert!(is_blank_value(&blank), "{blank}");
        }
        for kept in [json!(0), json!(false), json!("x"), json!([1]), json!({"a": 1})] {
            assert!(!is_blank_value(&kept), "{kept}");
        }
    }

    #[test]
    fn extra_views_reuse_last_id() {
        let mut record = canonical();
        record
            .source_ids
            .insert(Source::Foursquare, BTreeSet::from(["fsq-1".to_string()]));
        let views = record.member_views();
        let fsq: Vec<_> = views
            .iter()
            .filter(|v| v.source == Source::Foursquare)
            .collect();
        assert_eq!(fsq.len(), 2);
        assert!(fsq.iter().all(|v| v.external_id.as_deref() == Some("fsq-1")));
    }

    #[test]
    fn canonical_roundtrips_through_json() {
        let record = canonical();
        let text = serde_json::to_string(&record).unwrap();
        assert!(text.contains("\"google_places\":[\"ChIJ1\"]"));
        let back: CanonicalRecord = serde_json::from_str(&text).unwrap();
        assert_eq!(back, record);
    }
}
