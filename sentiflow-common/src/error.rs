//! Common error types for sentiflow

use thiserror::Error;

use crate::channel::ChannelError;

/// Common result type for sentiflow operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across sentiflow services
#[derive(Error, Debug)]
pub enum Error {
    /// Broker unreachable or publish could not be buffered
    #[error("Channel unavailable: {0}")]
    ChannelUnavailable(String),

    /// Payload could not be serialized to the wire format
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Message body on a result stream could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// Requested correlation is unknown (or not resolved yet)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Database operation error (wraps sqlx::Error)
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

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

impl From<ChannelError> for Error {
    fn from(err: ChannelError) -> Self {
        match err {
            ChannelError::Serialization(msg) => Error::Serialization(msg),
            other => Error::ChannelUnavailable(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
