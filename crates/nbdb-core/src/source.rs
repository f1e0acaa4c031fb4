use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The upstream directory a restaurant observation came from.
///
/// Variant order is the trust ranking used to break ties between
/// conflicting values: Google Places data has been the most current, OSM the
/// least. `Ord` follows that ranking, so sorted collections of sources list
/// the most trusted first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    GooglePlaces,
    Foursquare,
    TourismSite,
    Osm,
}

impl Source {
    /// Every source, most trusted first.
    pub const ALL: [Source; 4] = [
        Source::GooglePlaces,
        Source::Foursquare,
        Source::TourismSite,
        Source::Osm,
    ];

    /// Trust rank, `0` being the most trusted.
    #[must_use]
    pub fn trust_rank(self) -> u8 {
        match self {
            Source::GooglePlaces => 0,
            Source::Foursquare => 1,
            Source::TourismSite => 2,
            Source::Osm => 3,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Source::GooglePlaces => "google_places",
            Source::Foursquare => "foursquare",
            Source::TourismSite => "tourism_site",
            Source::Osm => "osm",
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Source {
    type Err = String;

    /// Accepts the snake_case names plus the short aliases used in file
    /// names (`places`, `fsq`, `4square`, `tourism`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "google_places" | "google" | "places" => Ok(Source::GooglePlaces),
            "foursquare" | "fsq" | "4square" => Ok(Source::Foursquare),
            "tourism_site" | "tourism" | "visitchat" => Ok(Source::TourismSite),
            "osm" | "openstreetmap" => Ok(Source::Osm),
            other => Err(format!("unknown source '{other}'")),
        }
    }
}
