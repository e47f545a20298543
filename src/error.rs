use std::path::PathBuf;

use thiserror::Error;

/// Failures raised by a media store collaborator.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The SQLite catalog rejected a statement
    #[error("catalog database error: {0}")]
    Database(#[from] rusqlite::Error),
    /// Another thread panicked while holding the catalog connection
    #[error("catalog connection lock poisoned")]
    Poisoned,
    /// The blocking task running a catalog query did not complete
    #[error("store task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
    /// Requested media item does not exist
    #[error("media item {0} not found")]
    NotFound(i64),
    /// Store could not be reached at all
    #[error("store unavailable: {0}")]
    Unavailable(String),
    /// Catalog file or directory could not be created
    #[error("catalog io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors surfaced by the facet/query engine to its caller.
///
/// Facet ranking and timeline aggregation never fail; only store calls,
/// configuration loading and parsing of user supplied values do.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("media store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),

    #[error("invalid month key `{0}`, expected YYYY-MM")]
    InvalidMonthKey(String),

    #[error("invalid {kind} `{value}`")]
    InvalidValue { kind: &'static str, value: String },

    #[error("failed to read config {path}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("could not determine a data directory for the catalog")]
    NoDataDir,
}

impl EngineError {
    pub(crate) fn invalid(kind: &'static str, value: &str) -> Self {
        EngineError::InvalidValue {
            kind,
            value: value.to_string(),
        }
    }
}
