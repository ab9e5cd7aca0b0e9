//! Actor-based concurrency model.
//!
//! The actor hierarchy mirrors the ownership of state:
//!
//! - `MatchmakerActor` - singleton, owns the connection registry and the
//!   matchmaking queues; every pairing decision passes through it
//! - `ConnectionWriter` - one per WebSocket connection, owns the write
//!   half of the socket and drains that connection's outbound mailbox
//!
//! Communication is strictly message-passing over bounded channels; no
//! state is shared behind locks. Cancellation propagates from the
//! matchmaker's root token to child tokens held by writer tasks.

pub mod matchmaker;
pub mod messages;
pub mod metrics;
pub mod writer;

pub use matchmaker::MatchmakerHandle;
pub use messages::{FindResult, MatchmakerMessage, MatchmakerStatus, Outbound};
pub use metrics::{ActorMetrics, ActorType, MailboxMonitor};
pub use writer::{ConnectionWriter, OUTBOUND_CHANNEL_BUFFER};
