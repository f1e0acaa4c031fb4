//! OpenStreetMap Overpass exports: a list of per-city objects, each holding
//! the `amenity=restaurant` nodes and ways found around that city.

use nbdb_core::{RawRecord, Source};
use serde_json::Value;

use crate::json::{identifier, list, number_or_string, text, Fields};

/// Tags stored under a field name shared with the other sources. Every other
/// tag is carried under its own key (`cuisine` excepted, it becomes
/// categories).
const RENAMED_TAGS: [(&[&str], &str); 4] = [
    (&["phone", "contact:phone"], "phone"),
    (&["website", "contact:website", "url"], "website"),
    (&["opening_hours"], "hours"),
    (&["addr:postcode"], "postcode"),
];

pub(crate) fn parse_osm(document: &Value) -> Option<Vec<RawRecord>> {
    let cities: Vec<&Value> = if document.get("restaurants").is_some() {
        vec![document]
    } else {
        list(document, &["cities"])?.iter().collect()
    };

    let records = cities
        .into_iter()
        .flat_map(|city| {
            let city_name = text(city, "city_name");
            let state = text(city, "state");
            city.get("restaurants")
                .and_then(Value::as_array)
                .into_iter()
                .flatten()
                .filter_map(move |element| {
                    element_to_record(element, city_name.as_deref(), state.as_deref())
                })
        })
        .collect();
    Some(records)
}

fn element_to_record(
    element: &Value,
    city_fallback: Option<&str>,
    state_fallback: Option<&str>,
) -> Option<RawRecord> {
    if !element.is_object() {
        return None;
    }
    let empty = Value::Null;
    let mut tags = Fields::new(element.get("tags").unwrap_or(&empty));

    let mut record = RawRecord::new(Source::Osm, tags.text(&["name", "name:en"]).unwrap_or_default());
    if let Some(id) = identifier(element, "osm_id") {
        let kind = text(element, "osm_type").unwrap_or_else(|| "node".to_string());
        record.external_id = Some(format!("{kind}/{id}"));
    }

    let street = tags.text(&["addr:street", "address:street"]);
    let number = tags.text(&["addr:housenumber", "house_number"]);
    let address = match (number, street) {
        (Some(number), Some(street)) => Some(format!("{number} {street}")),
        (None, Some(street)) => Some(street),
        (Some(number), None) => {
            record
                .extra
                .insert("addr:housenumber".to_string(), Value::from(number));
            None
        }
        (None, None) => None,
    };
    record.address = address;
    record.city = tags.text(&["addr:city"]).or_else(|| city_fallback.map(str::to_string));
    record.state = tags.text(&["addr:state"]).or_else(|| state_fallback.map(str::to_string));

    if let (Some(latitude), Some(longitude)) = (
        number_or_string(element, "latitude"),
        number_or_string(element, "longitude"),
    ) {
        record = record.with_coordinates(latitude, longitude);
    }

    if let Some(cuisine) = tags.text(&["cuisine"]) {
        for kind in cuisine.split(';').map(str::trim).filter(|c| !c.is_empty()) {
            record = record.with_category(kind.replace('_', " "));
        }
    }

    for (keys, field) in RENAMED_TAGS {
        if let Some(value) = tags.text(keys) {
            record = record.with_field(field, value);
        }
    }

    tags.carry_rest(&mut record);
    Some(record)
}
