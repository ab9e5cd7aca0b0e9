//! Protocol-level errors and the machine-readable wire error codes.
//!
//! `ErrorCode` is the closed set of codes a client can receive in an
//! `error` frame. Services map their richer internal errors onto these
//! codes before anything reaches the wire.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced while decoding an inbound frame.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The `type` field was missing, unrecognized, or the frame was not
    /// valid JSON at all.
    #[error("unknown or malformed frame type")]
    UnknownFrameType,

    /// The frame had a recognized `type` but its control fields failed to
    /// parse (e.g. `join` without a valid `mode`).
    #[error("malformed {frame_type} frame: {reason}")]
    Malformed {
        frame_type: &'static str,
        reason: String,
    },
}

impl ProtocolError {
    /// The wire error code reported back for this decode failure.
    #[must_use]
    pub fn error_code(&self) -> ErrorCode {
        // Both decode failures surface as unknown-frame-type: the client
        // sent something the protocol does not define.
        ErrorCode::UnknownFrameType
    }
}

/// Machine-readable error codes carried in `error` frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorCode {
    /// Registration reused a live connection id.
    DuplicateConnection,
    /// Join/find requested while already waiting in a queue.
    AlreadyQueued,
    /// Join/find requested while already paired.
    AlreadyPaired,
    /// The referenced connection is no longer tracked.
    NotFound,
    /// A file-transfer frame exceeded the configured limit.
    PayloadTooLarge,
    /// Malformed or unrecognized `type` field.
    UnknownFrameType,
    /// Unexpected server-side failure.
    Internal,
}

impl ErrorCode {
    /// Returns the code as its wire string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::DuplicateConnection => "duplicate-connection",
            ErrorCode::AlreadyQueued => "already-queued",
            ErrorCode::AlreadyPaired => "already-paired",
            ErrorCode::NotFound => "not-found",
            ErrorCode::PayloadTooLarge => "payload-too-large",
            ErrorCode::UnknownFrameType => "unknown-frame-type",
            ErrorCode::Internal => "internal",
        }
    }
}
