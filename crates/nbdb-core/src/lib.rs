//! Shared domain types and configuration for the restaurant merge pipeline.
//!
//! Source adapters produce [`RawRecord`]s, the resolver turns them into
//! [`CanonicalRecord`]s, and the CLI wraps the result in a
//! [`MergedDocument`]. Everything here is plain data; no I/O happens outside
//! of configuration and manifest loading.

pub mod app_config;
pub mod config;
pub mod document;
pub mod manifest;
pub mod record;
pub mod source;

pub use app_config::{AppConfig, BucketStrategy};
pub use config::{load_app_config, load_app_config_from_env};
pub use document::{
    DocumentError, FieldConflict, GeoOutlier, InputSummary, MatchStatistics, MergedDocument,
    Metadata, SkippedInput,
};
pub use manifest::{load_manifest, InputEntry, InputKind, Manifest};
pub use record::{
    is_blank_value, Batch, CanonicalRecord, Coordinates, FieldEntry, FieldValue, RawRecord,
};
pub use source::Source;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for environment variable {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read manifest file {path}: {source}")]
    ManifestIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse manifest: {0}")]
    ManifestParse(#[from] serde_yaml::Error),

    #[error("manifest validation error: {0}")]
    Validation(String),
}
