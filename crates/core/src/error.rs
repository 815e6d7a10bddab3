//! Unified error types for subrelay.
//!
//! Every terminal failure of a request maps onto one of these variants, and
//! each variant knows the HTTP status it is reported with.

use tokio_rusqlite::rusqlite;

/// Unified error types for the subscription relay.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed encoding or a missing required reference.
    #[error("BAD_INPUT: {0}")]
    BadInput(String),

    /// Unknown cache key.
    #[error("NOT_FOUND: {0}")]
    NotFound(String),

    /// A fetched source answered with a non-200 status.
    #[error("UPSTREAM_FAILURE: {url} returned status {status}")]
    Upstream { url: String, status: u16 },

    /// Timeout, connection failure or an unreadable body.
    #[error("TRANSPORT_ERROR: {0}")]
    Transport(String),

    /// A document is not the shape the pipeline requires.
    #[error("MALFORMED_DOCUMENT: {0}")]
    MalformedDocument(String),

    /// A cache entry exists but is missing its document.
    #[error("CACHE_CORRUPT: {0}")]
    CacheCorrupt(String),

    /// YAML emission failed.
    #[error("SERIALIZE_FAILED: {0}")]
    Serialize(String),

    /// Database operation failed.
    #[error("CACHE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("CACHE_ERROR: migration failed: {0}")]
    MigrationFailed(String),
}

impl Error {
    /// HTTP status this error is reported with.
    ///
    /// Upstream failures propagate the remote status unchanged.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::BadInput(_) => 400,
            Error::NotFound(_) => 404,
            Error::Upstream { status, .. } => *status,
            Error::MalformedDocument(_) => 422,
            Error::Transport(_)
            | Error::CacheCorrupt(_)
            | Error::Serialize(_)
            | Error::Database(_)
            | Error::MigrationFailed(_) => 500,
        }
    }
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::Serialize(err.to_string())
    }
}
