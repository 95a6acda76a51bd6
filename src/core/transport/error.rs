//! Transport error types.

use thiserror::Error;

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Errors that can occur in transport operations.
///
/// A transport error only ever affects the session (or connection) it
/// occurred on, never the whole process.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Failed to bind to address.
    #[error("Failed to bind to {address}: {source}")]
    BindError {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// IO error during transport.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Protocol error (malformed request, bad headers).
    #[error("Protocol error: {0}")]
    ProtocolError(String),

    /// The referenced session does not exist or has expired.
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// The session was torn down while the request was being handled.
    #[error("Session closed: {0}")]
    SessionClosed(String),

    /// A request with this id is already in flight on the session.
    #[error("Request {0} is already in flight")]
    DuplicateRequest(String),

    /// HTTP-specific error.
    #[error("HTTP error: {0}")]
    HttpError(String),
}

impl TransportError {
    /// Create a bind error.
    pub fn bind(address: impl Into<String>, source: std::io::Error) -> Self {
        Self::BindError {
            address: address.into(),
            source,
        }
    }

    /// Create a protocol error.
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::ProtocolError(msg.into())
    }

    /// Create an HTTP error.
    pub fn http(msg: impl Into<String>) -> Self {
        Self::HttpError(msg.into())
    }
}
