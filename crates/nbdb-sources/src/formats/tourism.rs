//! Tourism directory (listing CMS) exports.
//!
//! Full runs are saved as `{"count", "restaurants": [...]}`; a raw API page
//! is `{"docs": {"count", "docs": [...]}}`.

use nbdb_core::{RawRecord, Source};
use serde_json::Value;

use crate::json::{list, number_or_string, text, Fields};

pub(crate) fn parse_tourism(document: &Value) -> Option<Vec<RawRecord>> {
    let listings = document
        .get("docs")
        .and_then(|docs| docs.get("docs"))
        .and_then(Value::as_array)
        .or_else(|| list(document, &["restaurants"]))?;

    Some(listings.iter().filter_map(listing_to_record).collect())
}

fn listing_to_record(listing: &Value) -> Option<RawRecord> {
    if !listing.is_object() {
        return None;
    }
    let mut fields = Fields::new(listing);

    let mut record = RawRecord::new(
        Source::TourismSite,
        fields.text(&["title", "name"]).unwrap_or_default(),
    );
    record.external_id = fields.identifier(&["recid", "id"]);
    record.address = match (fields.text(&["address1"]), fields.text(&["address2"])) {
        (Some(line1), Some(line2)) => Some(format!("{line1}, {line2}")),
        (line1, _) => line1,
    };
    record.city = fields.text(&["city"]);
    record.state = fields.text(&["state"]);

    let geo = fields.get("loc").unwrap_or(listing);
    let latitude = fields.number("latitude").or_else(|| number_or_string(geo, "lat"));
    let longitude = fields.number("longitude").or_else(|| number_or_string(geo, "lng"));
    if let (Some(latitude), Some(longitude)) = (latitude, longitude) {
        record = record.with_coordinates(latitude, longitude);
    }

    let primary = fields.get("primary_category").and_then(|c| {
        c.as_str()
            .map(str::to_string)
            .or_else(|| text(c, "catName"))
    });
    if let Some(category) = primary.filter(|c| !c.trim().is_empty()) {
        record = record.with_category(category.trim());
    }

    for (key, field) in [("weburl", "website"), ("zip", "postcode")] {
        if let Some(value) = fields.present(key) {
            record = record.with_field(field, value);
        }
    }

    fields.carry_rest(&mut record);
    Some(record)
}
