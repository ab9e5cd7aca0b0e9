//! Frame types, chat modes and envelope classification.
//!
//! Inbound frames are classified by deserializing only a small probe
//! struct containing the `type` field. Relay frames are then forwarded as
//! the original text, byte for byte; only control frames get a full parse.

use crate::error::{ErrorCode, ProtocolError};

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque identifier for one live client connection.
///
/// Stable for the connection's lifetime; this is the only identity a
/// partner ever learns about the other side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Generate a fresh random connection id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Chat mode a connection is matched in.
///
/// Peers are only ever paired within the same mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatMode {
    /// Text-only chat.
    Text,
    /// Video chat (WebRTC signaling relayed through the server).
    Video,
}

impl ChatMode {
    /// Returns the mode as its wire string (also used as a metric label).
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ChatMode::Text => "text",
            ChatMode::Video => "video",
        }
    }
}

impl fmt::Display for ChatMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The closed set of frame types on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FrameType {
    /// Client requests matching (first request; carries mode + interest).
    Join,
    /// Client re-requests matching after a voluntary leave.
    Find,
    /// Server notifies a client it has been paired.
    Paired,
    /// Relayed chat text.
    Message,
    /// Relayed typing-state toggle.
    Typing,
    /// Relayed file transfer payload (size-capped).
    File,
    /// Relayed WebRTC offer.
    Offer,
    /// Relayed WebRTC answer.
    Answer,
    /// Relayed ICE candidate.
    IceCandidate,
    /// Client voluntarily leaves its current pair (or the queue).
    Disconnect,
    /// Server notifies the survivor that its partner is gone.
    PartnerDisconnected,
    /// Server reports a rejected request.
    Error,
}

impl FrameType {
    /// Whether this frame is forwarded opaquely between paired peers.
    #[must_use]
    pub const fn is_relay(&self) -> bool {
        matches!(
            self,
            FrameType::Message
                | FrameType::Typing
                | FrameType::File
                | FrameType::Offer
                | FrameType::Answer
                | FrameType::IceCandidate
        )
    }

    /// Whether a client is allowed to send this frame.
    #[must_use]
    pub const fn is_client_initiated(&self) -> bool {
        self.is_relay()
            || matches!(self, FrameType::Join | FrameType::Find | FrameType::Disconnect)
    }

    /// Returns the type as its wire string (also used as a metric label).
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            FrameType::Join => "join",
            FrameType::Find => "find",
            FrameType::Paired => "paired",
            FrameType::Message => "message",
            FrameType::Typing => "typing",
            FrameType::File => "file",
            FrameType::Offer => "offer",
            FrameType::Answer => "answer",
            FrameType::IceCandidate => "ice-candidate",
            FrameType::Disconnect => "disconnect",
            FrameType::PartnerDisconnected => "partner-disconnected",
            FrameType::Error => "error",
        }
    }
}

impl fmt::Display for FrameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Minimal probe for classification: only the `type` field is examined.
#[derive(Deserialize)]
struct FrameProbe {
    #[serde(rename = "type")]
    frame_type: FrameType,
}

/// Classify an inbound text frame by its `type` field.
///
/// Relay frames are intentionally not parsed beyond this probe - the
/// original text is forwarded verbatim to preserve payload opacity.
///
/// # Errors
///
/// `UnknownFrameType` if the text is not JSON, lacks a `type` field, or
/// carries a type outside the closed set.
pub fn classify(text: &str) -> Result<FrameType, ProtocolError> {
    serde_json::from_str::<FrameProbe>(text)
        .map(|probe| probe.frame_type)
        .map_err(|_| ProtocolError::UnknownFrameType)
}

/// Parsed `join` frame.
#[derive(Debug, Clone, Deserialize)]
pub struct JoinFrame {
    /// Chat mode to match in (required on `join`).
    pub mode: ChatMode,
    /// Interest tag; empty string is the wildcard.
    #[serde(default)]
    pub interest: String,
}

/// Parsed `find` frame.
///
/// `find` re-requests matching; omitted fields fall back to the values
/// stored when the connection first joined.
#[derive(Debug, Clone, Deserialize)]
pub struct FindFrame {
    /// Optional mode override.
    #[serde(default)]
    pub mode: Option<ChatMode>,
    /// Optional interest override.
    #[serde(default)]
    pub interest: Option<String>,
}

/// Fully parse a `join` frame.
///
/// # Errors
///
/// `Malformed` if required control fields are missing or invalid.
pub fn parse_join(text: &str) -> Result<JoinFrame, ProtocolError> {
    serde_json::from_str(text).map_err(|e| ProtocolError::Malformed {
        frame_type: "join",
        reason: e.to_string(),
    })
}

/// Fully parse a `find` frame.
///
/// # Errors
///
/// `Malformed` if present control fields are invalid.
pub fn parse_find(text: &str) -> Result<FindFrame, ProtocolError> {
    serde_json::from_str(text).map_err(|e| ProtocolError::Malformed {
        frame_type: "find",
        reason: e.to_string(),
    })
}

/// Server-initiated control frames.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerFrame {
    /// The connection has been matched; carries the partner's opaque id.
    Paired {
        partner: ConnectionId,
        mode: ChatMode,
    },
    /// The former partner disconnected or left the pair.
    PartnerDisconnected,
    /// A request was rejected; the connection's state is unchanged.
    Error { code: ErrorCode, message: String },
}

/// Emitted if serializing a control frame ever fails; kept valid JSON so
/// clients can still parse it.
const FALLBACK_ERROR_JSON: &str = r#"{"type":"error","code":"internal","message":"internal error"}"#;

impl ServerFrame {
    /// Serialize to the wire representation.
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| FALLBACK_ERROR_JSON.to_string())
    }
}
