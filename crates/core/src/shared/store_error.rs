use std::path::PathBuf;

use thiserror::Error;

/// Failure of an external store (database, gallery file).
///
/// Callers in the pipeline log these and carry on with the feature
/// temporarily unavailable.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("invalid stored value: {0}")]
    Invalid(String),
}
