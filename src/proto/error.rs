use std::io;

use thiserror::Error;

/// Result type alias for submux operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced to callers of subscription and connection operations.
///
/// Transport failures from a pub/sub connection are translated into this
/// type before they reach the caller, so subscribers only ever need to
/// handle one error type.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// An IO error occurred.
    #[error("IO error: {source}")]
    Io {
        /// The underlying IO error.
        #[from]
        source: io::Error,
    },

    /// A protocol error occurred.
    #[error("protocol error: {message}")]
    Protocol {
        /// Description of the error.
        message: String,
    },

    /// The server returned an error.
    #[error("server error: {message}")]
    Server {
        /// Error message from server.
        message: String,
    },

    /// Authentication failed.
    #[error("authentication failed")]
    Auth,

    /// Invalid argument provided.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of invalid argument.
        message: String,
    },

    /// Decoding failed.
    #[error("decode error: {source}")]
    Decode {
        /// Underlying decode error.
        #[from]
        source: DecodeError,
    },

    /// The connection to the server was lost or shut down.
    #[error("connection closed")]
    ConnectionClosed,

    /// The subscription session was cancelled and accepts no new subscriptions.
    #[error("subscription cancelled")]
    Cancelled,
}

/// Error returned when frame decoding fails.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct DecodeError {
    message: String,
}

impl DecodeError {
    /// Creates a new decode error with a description of the malformed input.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the description of the malformed input.
    pub fn message(&self) -> &str {
        &self.message
    }
}
