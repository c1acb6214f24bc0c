//! Error types for watchlog-core

use thiserror::Error;

/// Main error type for the watchlog-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Malformed explorer request (bad sort spec, page size, ...)
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// A background query task panicked or was cancelled
    #[error("query task failed: {0}")]
    Task(String),

    /// Import/enrichment error
    #[error("ingest error: {0}")]
    Ingest(String),
}

impl Error {
    /// Whether the error was caused by caller input rather than the store.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::InvalidQuery(_))
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        Error::Task(err.to_string())
    }
}

/// Result type alias for watchlog-core
pub type Result<T> = std::result::Result<T, Error>;
