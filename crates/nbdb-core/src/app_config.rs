use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// How unmatched records are bucketed before pairwise fuzzy comparison.
///
/// Only records in the same bucket are ever compared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BucketStrategy {
    /// First character of the normalized name. "The Diner" and "Diner" land
    /// in different buckets and are never compared.
    #[default]
    FirstChar,
    /// First character after dropping a leading "the", "a" or "an".
    SkipArticles,
}

impl std::fmt::Display for BucketStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BucketStrategy::FirstChar => write!(f, "first_char"),
            BucketStrategy::SkipArticles => write!(f, "skip_articles"),
        }
    }
}

impl std::str::FromStr for BucketStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "first_char" => Ok(BucketStrategy::FirstChar),
            "skip_articles" => Ok(BucketStrategy::SkipArticles),
            other => Err(format!(
                "unknown bucket strategy '{other}' (expected first_char or skip_articles)"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub log_level: String,
    pub name_threshold: f64,
    pub address_threshold: f64,
    pub geo_outlier_km: f64,
    pub bucket_strategy: BucketStrategy,
    pub output_dir: PathBuf,
    pub output_prefix: String,
    pub max_concurrent_reads: usize,
}
