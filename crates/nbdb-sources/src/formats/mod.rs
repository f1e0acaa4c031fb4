//! One adapter per export format. Each maps a parsed JSON document to raw
//! observations, or `None` when the document has an unexpected shape.

mod foursquare;
mod google_places;
mod legacy;
mod merged;
mod osm;
mod tourism;

use nbdb_core::{InputKind, RawRecord};
use serde_json::Value;

pub(crate) use legacy::parse_legacy;

pub(crate) fn parse_kind(kind: InputKind, document: &Value) -> Option<Vec<RawRecord>> {
    match kind {
        InputKind::Foursquare => foursquare::parse_foursquare(document),
        InputKind::GooglePlaces => google_places::parse_google_places(document),
        InputKind::Osm => osm::parse_osm(document),
        InputKind::TourismSite => tourism::parse_tourism(document),
        InputKind::Merged => merged::parse_merged(document),
    }
}
