//! Google Places API (v1) exports.
//!
//! Consolidated files are lists of `{"google_data": {...}, "foursquare_data": {...}}`
//! pairs; search progress files hold `{"places": [...]}`; some runs saved
//! `{"restaurants": [...]}` or a bare list of places.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use nbdb_core::{RawRecord, Source};
use regex::Regex;
use serde_json::Value;

use crate::json::{list, number_or_string, present, text, Fields};

/// Place types too generic to describe a restaurant.
const GENERIC_TYPES: [&str; 3] = ["point_of_interest", "establishment", "food"];

/// Place attributes stored under a field name of their own. The first key
/// present wins; later aliases are carried under their own name.
const RENAMED_FIELDS: [(&str, &str); 9] = [
    ("websiteUri", "website"),
    ("website", "website"),
    ("rating", "rating"),
    ("userRatingCount", "user_rating_count"),
    ("nationalPhoneNumber", "phone"),
    ("internationalPhoneNumber", "phone"),
    ("priceLevel", "price_level"),
    ("googleMapsUri", "google_maps_uri"),
    ("businessStatus", "business_status"),
];

/// Places found by several searches appear once per search. Only the copy
/// with the most photos is kept, at the position of the first copy.
pub(crate) fn parse_google_places(document: &Value) -> Option<Vec<RawRecord>> {
    let places = list(document, &["places", "restaurants", "results"])?;

    let mut records: Vec<RawRecord> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();
    for item in places {
        let place = item.get("google_data").unwrap_or(item);
        let Some(record) = place_to_record(place) else {
            continue;
        };
        let Some(id) = record.identity().map(str::to_string) else {
            records.push(record);
            continue;
        };
        match positions.entry(id) {
            Entry::Occupied(slot) => {
                let kept = &mut records[*slot.get()];
                if photo_count(&record) > photo_count(kept) {
                    tracing::debug!(id = %slot.key(), "keeping later copy with more photos");
                    *kept = record;
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(records.len());
                records.push(record);
            }
        }
    }
    Some(records)
}

fn photo_count(record: &RawRecord) -> usize {
    record
        .extra
        .get("photos")
        .and_then(Value::as_array)
        .map_or(0, Vec::len)
}

pub(crate) fn place_to_record(place: &Value) -> Option<RawRecord> {
    if place.as_object().is_none_or(serde_json::Map::is_empty) {
        return None;
    }
    let mut fields = Fields::new(place);

    // v1 `name` is the `places/<id>` resource path when `displayName` is set.
    let name = match fields.get("displayName") {
        Some(Value::String(s)) => {
            fields.skip(&["name"]);
            s.trim().to_string()
        }
        Some(display) => {
            fields.skip(&["name"]);
            text(display, "text").unwrap_or_default()
        }
        None => fields.text(&["name"]).unwrap_or_default(),
    };
    let mut record = RawRecord::new(Source::GooglePlaces, name);
    record.external_id = fields.identifier(&["id", "place_id"]);

    if let Some(formatted) = fields.text(&["formattedAddress", "formatted_address"]) {
        let parts = split_formatted_address(&formatted);
        record.address = Some(parts.street);
        record.city = parts.city;
        record.state = parts.state;
        if let Some(zip) = parts.zip {
            record = record.with_field("postcode", zip);
        }
    }

    let location = place
        .get("location")
        .or_else(|| place.get("geometry").and_then(|g| g.get("location")))
        .unwrap_or(&Value::Null);
    fields.skip(&["location", "geometry"]);
    let latitude = number_or_string(location, "latitude").or_else(|| number_or_string(location, "lat"));
    let longitude = number_or_string(location, "longitude").or_else(|| number_or_string(location, "lng"));
    if let (Some(latitude), Some(longitude)) = (latitude, longitude) {
        record = record.with_coordinates(latitude, longitude);
    }

    for kind in fields
        .get("types")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
        .filter(|t| !GENERIC_TYPES.contains(t))
    {
        record = record.with_category(kind);
    }

    for (key, field) in RENAMED_FIELDS {
        if record.extra.contains_key(field) {
            continue;
        }
        if let Some(value) = fields.present(key) {
            record = record.with_field(field, value);
        }
    }
    if let Some(hours) = fields
        .get("regularOpeningHours")
        .and_then(|h| present(h, "weekdayDescriptions"))
    {
        record = record.with_field("hours", hours);
    }

    fields.carry_rest(&mut record);
    Some(record)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AddressParts {
    pub(crate) street: String,
    pub(crate) city: Option<String>,
    pub(crate) state: Option<String>,
    pub(crate) zip: Option<String>,
}

/// Split `"123 Main St, Chattanooga, TN 37402, USA"` into its parts. When
/// no `STATE ZIP` segment is found the whole string is the street.
pub(crate) fn split_formatted_address(formatted: &str) -> AddressParts {
    let mut parts: Vec<&str> = formatted
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    if parts
        .last()
        .is_some_and(|p| matches!(*p, "USA" | "US" | "United States"))
    {
        parts.pop();
    }

    let whole = AddressParts {
        street: formatted.trim().to_string(),
        city: None,
        state: None,
        zip: None,
    };
    let Ok(state_zip) = Regex::new(r"^([A-Z]{2})(?:\s+(\d{5}(?:-\d{4})?))?$") else {
        return whole;
    };
    if parts.len() < 3 {
        return whole;
    }
    let Some(caps) = parts.last().and_then(|p| state_zip.captures(p)) else {
        return whole;
    };

    let state = caps.get(1).map(|m| m.as_str().to_string());
    let zip = caps.get(2).map(|m| m.as_str().to_string());
    let city = parts[parts.len() - 2].to_string();
    let street = parts[..parts.len() - 2].join(", ");

    AddressParts {
        street,
        city: Some(city),
        state,
        zip,
    }
}
