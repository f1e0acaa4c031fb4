//! Readers for the per-source restaurant exports.
//!
//! Each export format has an adapter that turns its JSON layout into
//! [`nbdb_core::RawRecord`]s. Records without a name are kept with an empty
//! name; nothing an export lists is dropped.

pub mod artifact;
pub mod error;
mod formats;
mod json;
pub mod load;

pub use artifact::{
    artifact_file_name, artifact_timestamp, latest_artifact, unused_artifact_path,
};
pub use error::SourceError;
pub use load::{expand_input, load_file, parse_document, read_dataset, LoadedInput, StoredDataset};
