//! Datasets written by the earlier two-source merge script.
//!
//! `{"restaurants": [...]}` where each entry is a Foursquare listing
//! flattened to `name`, `categories`, `address`, `city`, `state`,
//! `latitude`, `longitude`, `phone`, `website`, `hours`, `rating` and
//! `price_level`, with the matched Google place (or `null`) under
//! `google_data`. Entries carry no id of their own.

use nbdb_core::{RawRecord, Source};
use serde_json::Value;

use super::google_places::place_to_record;
use crate::json::{text, Fields};

/// One group of observations per entry, or `None` for any other layout.
/// The listing and its Google place share an origin, so they stay together
/// when read back as plain observations.
pub(crate) fn parse_legacy(document: &Value) -> Option<Vec<Vec<RawRecord>>> {
    let entries = document.get("restaurants")?.as_array()?;
    if !entries.iter().all(is_legacy_entry) {
        return None;
    }
    Some(entries.iter().map(entry_records).collect())
}

fn is_legacy_entry(entry: &Value) -> bool {
    entry.is_object()
        && entry.get("id").is_none()
        && (entry.get("name").is_some() || entry.get("google_data").is_some())
}

fn entry_records(entry: &Value) -> Vec<RawRecord> {
    let mut fields = Fields::new(entry);
    let place = fields.get("google_data").and_then(place_to_record);

    let mut listing = RawRecord::new(Source::Foursquare, fields.text(&["name"]).unwrap_or_default());
    listing.address = fields.text(&["address"]);
    listing.city = fields.text(&["city"]);
    listing.state = fields.text(&["state"]);
    if let (Some(latitude), Some(longitude)) = (fields.number("latitude"), fields.number("longitude")) {
        listing = listing.with_coordinates(latitude, longitude);
    }
    for category in fields
        .get("categories")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
    {
        let name = category
            .as_str()
            .map(str::to_string)
            .or_else(|| text(category, "name"));
        if let Some(name) = name {
            listing = listing.with_category(name);
        }
    }
    fields.carry_rest(&mut listing);

    let origin = place
        .as_ref()
        .and_then(RawRecord::identity)
        .map(|id| format!("legacy:google_places:{id}"));
    let mut records: Vec<RawRecord> = std::iter::once(listing).chain(place).collect();
    if let Some(origin) = origin {
        for record in &mut records {
            record.origin = Some(origin.clone());
        }
    }
    records
}
