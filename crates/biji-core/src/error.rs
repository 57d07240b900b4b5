//! Error types for bijicrawl.

use thiserror::Error;

/// Result type alias using bijicrawl's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for bijicrawl operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Authentication failed: the refresh endpoint reported an API error,
    /// or the current credentials cannot be refreshed.
    #[error("Auth error: {0}")]
    Auth(String),

    /// A success envelope was malformed or missing an expected field.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// HTTP/network request failed (timeout, connection refused, non-2xx).
    #[error("Request error: {0}")]
    Request(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Storage operation failed
    #[error("Store error: {0}")]
    Store(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}
