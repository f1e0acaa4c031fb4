//! Entity resolution for multi-source restaurant listings.
//!
//! Records are joined in four passes: shared source identity, identical
//! normalized `name|address` keys, similarity between still-unmatched
//! singletons, and a convergence pass over the formed groups. Each group
//! collapses into one [`nbdb_core::CanonicalRecord`] under the field merge
//! policy in [`merge`].

pub mod config;
pub mod error;
pub mod merge;
pub mod normalize;
pub mod report;
pub mod resolve;
pub mod similarity;

mod geo;
mod groups;

pub use config::ResolverConfig;
pub use error::ResolveError;
pub use merge::{canonical_id, merge_field};
pub use normalize::{bucket_key, exact_key, lookup_key, normalize, PLACEHOLDER_NAME};
pub use report::{differential, find_duplicate_groups, DuplicateGroup, DuplicateMatch};
pub use resolve::{Resolution, Resolver};
pub use similarity::{is_duplicate, ratio, similarity};
