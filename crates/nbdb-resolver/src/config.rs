use std::collections::BTreeMap;

use nbdb_core::{AppConfig, BucketStrategy, Source};

use crate::error::ResolveError;

/// Tunables for a resolver run.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolverConfig {
    /// Minimum name similarity for a fuzzy match (inclusive).
    pub name_threshold: f64,
    /// Minimum address similarity for a fuzzy match (inclusive).
    pub address_threshold: f64,
    /// Distance from the group centroid beyond which an observation is flagged.
    pub geo_outlier_km: f64,
    pub bucket_strategy: BucketStrategy,
    /// Fields whose primary value is taken from a given source whenever
    /// that source supplied one, regardless of trust rank.
    pub field_preferences: BTreeMap<String, Source>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            name_threshold: 0.85,
            address_threshold: 0.85,
            geo_outlier_km: 5.0,
            bucket_strategy: BucketStrategy::FirstChar,
            field_preferences: default_field_preferences(),
        }
    }
}

impl ResolverConfig {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            name_threshold: config.name_threshold,
            address_threshold: config.address_threshold,
            geo_outlier_km: config.geo_outlier_km,
            bucket_strategy: config.bucket_strategy,
            field_preferences: default_field_preferences(),
        }
    }

    /// # Errors
    ///
    /// Returns [`ResolveError`] when a threshold is outside `[0, 1]` or the
    /// outlier distance is not a positive number.
    pub fn validate(&self) -> Result<(), ResolveError> {
        for (name, value) in [
            ("name", self.name_threshold),
            ("address", self.address_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ResolveError::InvalidThreshold { name, value });
            }
        }
        if !self.geo_outlier_km.is_finite() || self.geo_outlier_km <= 0.0 {
            return Err(ResolveError::InvalidOutlierDistance(self.geo_outlier_km));
        }
        Ok(())
    }
}

/// Google Places websites and ratings have been the most current.
fn default_field_preferences() -> BTreeMap<String, Source> {
    BTreeMap::from([
        ("website".to_string(), Source::GooglePlaces),
        ("rating".to_string(), Source::GooglePlaces),
    ])
}
