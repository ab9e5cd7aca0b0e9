//! Message types for actor communication.
//!
//! All inter-actor communication uses strongly-typed message passing via
//! `tokio::sync::mpsc`. Request-reply operations carry a `tokio::sync::oneshot`
//! responder; fire-and-forget notifications carry none.

use crate::errors::SbError;

use chat_protocol::{ChatMode, ConnectionId, FrameType, ServerFrame};
use tokio::sync::oneshot;

/// Messages sent to the `MatchmakerActor`.
#[derive(Debug)]
pub enum MatchmakerMessage {
    /// A connection announced itself with a join frame and entered
    /// matchmaking. Also used for re-join with new parameters while idle.
    Join {
        connection_id: ConnectionId,
        mode: ChatMode,
        interest: String,
        /// Mailbox of the connection's writer task.
        outbound: tokio::sync::mpsc::Sender<Outbound>,
        /// Response channel for the matchmaking result.
        respond_to: oneshot::Sender<Result<FindResult, SbError>>,
    },

    /// A registered connection asked to be matched.
    Find {
        connection_id: ConnectionId,
        /// Optional mode change carried on the find frame.
        mode: Option<ChatMode>,
        /// Optional interest change carried on the find frame.
        interest: Option<String>,
        /// Response channel for the matchmaking result.
        respond_to: oneshot::Sender<Result<FindResult, SbError>>,
    },

    /// Forward an opaque frame to the sender's current partner.
    Relay {
        connection_id: ConnectionId,
        frame_type: FrameType,
        /// Original frame text, forwarded byte-for-byte.
        raw: String,
        /// Response channel for the relay result.
        respond_to: oneshot::Sender<Result<(), SbError>>,
    },

    /// A connection sent an explicit disconnect frame. The pair (if any) is
    /// torn down but the connection stays registered and may find again.
    LeavePair {
        connection_id: ConnectionId,
        /// Response channel for confirmation.
        respond_to: oneshot::Sender<Result<(), SbError>>,
    },

    /// The underlying transport closed. The connection is removed entirely.
    /// No reply; the socket task is already unwinding.
    ConnectionClosed { connection_id: ConnectionId },

    /// Get current matchmaker status (for health checks and the status page).
    GetStatus {
        /// Response channel for the status snapshot.
        respond_to: oneshot::Sender<MatchmakerStatus>,
    },
}

/// Frame kinds a connection writer task delivers to its client.
#[derive(Debug)]
pub enum Outbound {
    /// A server-originated control frame, serialized at write time.
    Control(ServerFrame),
    /// A relayed partner frame, forwarded verbatim.
    Relay(String),
}

// ----------------------------------------------------------------------------
// Supporting Types
// ----------------------------------------------------------------------------

/// Result of a find request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FindResult {
    /// Matched immediately; both sides have been notified.
    Paired {
        partner: ConnectionId,
        mode: ChatMode,
    },
    /// No compatible peer yet; the connection now waits in the queue.
    Waiting,
}

/// Snapshot of matchmaker state.
#[derive(Debug, Clone)]
pub struct MatchmakerStatus {
    /// Total registered connections.
    pub connection_count: usize,
    /// Connections waiting in any queue.
    pub waiting_count: usize,
    /// Active pairs.
    pub pair_count: usize,
    /// Whether the matchmaker is draining.
    pub is_draining: bool,
    /// Current mailbox depth.
    pub mailbox_depth: usize,
}
