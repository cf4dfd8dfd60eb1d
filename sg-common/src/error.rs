//! Common error types for the street gender workspace

use thiserror::Error;

/// Common result type for street gender operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the workspace
///
/// Only `SourceUnavailable` and `Config` are expected to stop a run; per-name
/// classification problems never surface here.
#[derive(Error, Debug)]
pub enum Error {
    /// A name/gender source could not be loaded while building the registry
    #[error("Name source '{source_name}' unavailable: {reason}")]
    SourceUnavailable { source_name: String, reason: String },

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding error (cache files, reports)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Build a `SourceUnavailable` error from any displayable reason
    pub fn source_unavailable(source_name: impl Into<String>, reason: impl ToString) -> Self {
        Error::SourceUnavailable {
            source_name: source_name.into(),
            reason: reason.to_string(),
        }
    }
}
