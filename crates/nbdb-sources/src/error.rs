use nbdb_core::InputKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{path} does not look like a {kind} export")]
    Shape { path: String, kind: InputKind },

    #[error("no .json files in directory {path}")]
    EmptyDirectory { path: String },
}
