//! Foursquare Places v3 search exports.
//!
//! The collector writes `{"cities": [{"city", "state", "restaurants": [...]}]}`;
//! older runs wrote the raw `results` array or a flat list of places.

use nbdb_core::{RawRecord, Source};
use serde_json::Value;

use crate::json::{first_text, list, number_or_string, text, Fields};

pub(crate) fn parse_foursquare(document: &Value) -> Option<Vec<RawRecord>> {
    if let Some(cities) = document.get("cities").and_then(Value::as_array) {
        let records = cities
            .iter()
            .flat_map(|city| {
                let city_name = text(city, "city").or_else(|| text(city, "name"));
                let state = text(city, "state");
                city.get("restaurants")
                    .and_then(Value::as_array)
                    .into_iter()
                    .flatten()
                    .filter_map(move |place| place_to_record(place, city_name.as_deref(), state.as_deref()))
            })
            .collect();
        return Some(records);
    }

    let places = list(document, &["restaurants", "results", "places"])?;
    Some(
        places
            .iter()
            .filter_map(|place| place_to_record(place, None, None))
            .collect(),
    )
}

fn place_to_record(
    place: &Value,
    city_fallback: Option<&str>,
    state_fallback: Option<&str>,
) -> Option<RawRecord> {
    if !place.is_object() {
        return None;
    }
    let mut fields = Fields::new(place);
    let location = fields.get("location").unwrap_or(&Value::Null);

    let mut record = RawRecord::new(Source::Foursquare, fields.text(&["name"]).unwrap_or_default());
    record.external_id = fields.identifier(&["fsq_id", "id"]);

    let address = fields.text(&["address"]);
    let city = fields.text(&["city"]);
    let state = fields.text(&["state"]);
    record.address = first_text(location, &["address", "formatted_address"]).or(address);
    record.city = text(location, "locality")
        .or(city)
        .or_else(|| city_fallback.map(str::to_string));
    record.state = text(location, "region")
        .or(state)
        .or_else(|| state_fallback.map(str::to_string));

    let coordinates = match fields.get("geocodes").and_then(|g| g.get("main")) {
        Some(main) => (
            number_or_string(main, "latitude"),
            number_or_string(main, "longitude"),
        ),
        None => (fields.number("latitude"), fields.number("longitude")),
    };
    if let (Some(latitude), Some(longitude)) = coordinates {
        record = record.with_coordinates(latitude, longitude);
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
            record = record.with_category(name);
        }
    }

    if let Some(phone) = fields.text(&["tel", "phone"]) {
        record = record.with_field("phone", phone);
    }
    for (key, field) in [("website", "website"), ("rating", "rating"), ("price", "price"), ("price_level", "price")] {
        if record.extra.contains_key(field) {
            continue;
        }
        if let Some(value) = fields.present(key) {
            record = record.with_field(field, value);
        }
    }
    let hours = fields
        .get("hours")
        .and_then(|h| h.get("display").cloned().or_else(|| h.as_str().map(Value::from)));
    if let Some(hours) = hours {
        record = record.with_field("hours", hours);
    }
    if let Some(postcode) = text(location, "postcode") {
        record = record.with_field("postcode", postcode);
    }

    fields.carry_rest(&mut record);
    Some(record)
}
