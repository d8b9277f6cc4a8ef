//! Error types for wfpt

use thiserror::Error;

/// wfpt error type
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Validation error (malformed inputs, empty vectors, bad response codes)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration error (unknown method names, incompatible pairings)
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
