//! Error types for the photo calendar backend.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while serving calendar and upload requests.
#[derive(Error, Debug)]
pub enum Error {
    /// A field is out of range or could not be parsed
    #[error("Invalid field: {0}")]
    InvalidField(String),

    /// A calendar identifier is malformed
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// Not found error
    #[error("Not found: {0}")]
    NotFound(String),

    /// The document store is not configured, not reachable, or returned garbage
    #[error("Document store unavailable: {0}")]
    StoreUnavailable(String),

    /// Upload was not an image
    #[error("Invalid media type: {0}")]
    InvalidMediaType(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Get HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::InvalidField(_) | Error::InvalidIdentifier(_) | Error::InvalidMediaType(_) => 400,
            Error::NotFound(_) => 404,
            _ => 500,
        }
    }

    /// Short reason suitable for an API error body.
    ///
    /// Store and I/O details stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            Error::InvalidField(message)
            | Error::InvalidIdentifier(message)
            | Error::NotFound(message)
            | Error::InvalidMediaType(message) => message.clone(),
            Error::StoreUnavailable(_) => "Database not available".to_string(),
            _ => "Internal error".to_string(),
        }
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(errors: validator::ValidationErrors) -> Self {
        Error::InvalidField(errors.to_string())
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Error::StoreUnavailable(err.to_string())
    }
}
