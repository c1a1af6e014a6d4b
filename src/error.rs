//! Error types for syncing and reading stored timelines.

use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the store, the remote source and configuration loading.
#[derive(Error, Debug)]
pub enum Error {
    /// The SQLite store is unreachable, corrupt or violates the schema.
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// The remote timeline could not be read (network, auth, bad payload).
    #[error("source unavailable: {message}")]
    SourceUnavailable { message: String, transient: bool },

    /// The remote timeline refused the request because the rate limit was hit.
    #[error("rate limited by source (reset at {reset_at:?})")]
    RateLimited { reset_at: Option<i64> },

    /// Missing or malformed config/credentials, or an invalid target.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV export error.
    #[error("export error: {0}")]
    Export(#[from] csv::Error),
}

impl Error {
    /// A source failure that will not go away by retrying.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Error::SourceUnavailable {
            message: message.into(),
            transient: false,
        }
    }

    /// A source failure worth retrying (transport error, 5xx).
    pub fn transient(message: impl Into<String>) -> Self {
        Error::SourceUnavailable {
            message: message.into(),
            transient: true,
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Error::Configuration(message.into())
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::SourceUnavailable {
                transient: true,
                ..
            } | Error::RateLimited { .. }
        )
    }
}
