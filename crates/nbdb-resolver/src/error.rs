use nbdb_core::Source;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResolveError {
    /// One `(source, external_id)` belongs to two different canonical
    /// records. Either the existing dataset is corrupt or the resolver
    /// joined something it should not have; nothing may be written.
    #[error("{provider} id {external_id} is attached to both {first} and {second}")]
    MatchAmbiguity {
        provider: Source,
        external_id: String,
        first: String,
        second: String,
    },

    #[error("invalid {name} threshold {value}: must lie in [0, 1]")]
    InvalidThreshold { name: &'static str, value: f64 },

    #[error("invalid geo outlier distance {0}: must be positive")]
    InvalidOutlierDistance(f64),
}
