//! Common error types for Spotwatch

use thiserror::Error;

/// Common result type for Spotwatch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy shared by the registries, the reconciler and the store adapters
#[derive(Error, Debug)]
pub enum Error {
    /// Required payload field missing or empty
    #[error("Invalid payload: missing required field '{field}'")]
    Validation { field: String },

    /// Strict create against an id that is already present
    #[error("{0} already exists")]
    AlreadyExists(String),

    /// Referenced sensor, spot or plate is absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// Payload carried no `key` field
    #[error("Missing authentication key")]
    MissingAuth,

    /// Credential present but rejected by the authenticator
    #[error("Authentication failed for sensor {0}")]
    AuthFailed(String),

    /// Underlying store call failed
    #[error("Store error: {0}")]
    Store(String),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Credential cache error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Record could not be (de)serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn validation(field: impl Into<String>) -> Self {
        Error::Validation {
            field: field.into(),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Store(err.to_string())
    }
}
