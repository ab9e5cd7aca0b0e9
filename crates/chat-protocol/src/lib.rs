//! Switchboard wire protocol.
//!
//! Every message on the wire is a JSON text frame with a discriminated
//! `type` field. Frames fall into two groups:
//!
//! - **Control frames** are interpreted by the server: `join`, `find` and
//!   `disconnect` from clients; `paired`, `partner-disconnected` and
//!   `error` from the server.
//! - **Relay frames** (`message`, `typing`, `file`, `offer`, `answer`,
//!   `ice-candidate`) are forwarded verbatim between paired connections.
//!   The server classifies them by the `type` field alone and never
//!   deserializes their payloads, so any future payload schema change
//!   requires no server change.
//!
//! # Modules
//!
//! - [`frame`] - frame types, chat modes, classification and parsing
//! - [`error`] - protocol errors and machine-readable wire error codes

pub mod error;
pub mod frame;

pub use error::{ErrorCode, ProtocolError};
pub use frame::{
    classify, parse_find, parse_join, ChatMode, ConnectionId, FindFrame, FrameType, JoinFrame,
    ServerFrame,
};
