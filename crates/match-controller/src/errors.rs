//! Match controller error types.
//!
//! Error types map onto the wire `ErrorCode` values for client responses.
//! Internal details are logged server-side but never exposed to clients.
//! All of these are recoverable, connection-local errors: a rejection is
//! reported back to the originating connection as an `error` frame and
//! never affects other connections or the process.

use chat_protocol::{ErrorCode, ProtocolError};
use thiserror::Error;

/// Match controller error type.
#[derive(Debug, Error)]
pub enum SbError {
    /// Registration reused a live connection id.
    #[error("duplicate connection: {0}")]
    DuplicateConnection(String),

    /// Join/find requested while already waiting in a queue.
    #[error("connection already queued")]
    AlreadyQueued,

    /// Join/find requested while already paired.
    #[error("connection already paired")]
    AlreadyPaired,

    /// The referenced connection id is no longer tracked.
    #[error("connection not found: {0}")]
    NotFound(String),

    /// A file-transfer frame exceeded the configured limit.
    #[error("payload of {size} bytes exceeds limit of {limit} bytes")]
    PayloadTooLarge { size: usize, limit: usize },

    /// Inbound frame failed to decode.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The controller is shutting down and not accepting new work.
    #[error("controller is draining")]
    Draining,

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl SbError {
    /// Returns the wire `ErrorCode` for this error.
    #[must_use]
    pub fn error_code(&self) -> ErrorCode {
        match self {
            SbError::DuplicateConnection(_) => ErrorCode::DuplicateConnection,
            SbError::AlreadyQueued => ErrorCode::AlreadyQueued,
            SbError::AlreadyPaired => ErrorCode::AlreadyPaired,
            SbError::NotFound(_) => ErrorCode::NotFound,
            SbError::PayloadTooLarge { .. } => ErrorCode::PayloadTooLarge,
            SbError::Protocol(e) => e.error_code(),
            SbError::Draining | SbError::Config(_) | SbError::Internal(_) => ErrorCode::Internal,
        }
    }

    /// Returns a client-safe error message (no internal details).
    #[must_use]
    pub fn client_message(&self) -> String {
        match self {
            SbError::DuplicateConnection(_) => "connection id already in use".to_string(),
            SbError::AlreadyQueued => "already waiting for a partner".to_string(),
            SbError::AlreadyPaired => {
                "already in a chat; send disconnect first".to_string()
            }
            SbError::NotFound(_) => "connection not found".to_string(),
            SbError::PayloadTooLarge { limit, .. } => {
                format!("file payload exceeds the {limit} byte limit")
            }
            SbError::Protocol(_) => "unrecognized or malformed frame".to_string(),
            SbError::Draining => "server is shutting down, please reconnect".to_string(),
            SbError::Config(_) | SbError::Internal(_) => "an internal error occurred".to_string(),
        }
    }
}
