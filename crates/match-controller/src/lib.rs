//! Match Controller Service Library
//!
//! This library provides the core functionality for Switchboard's match
//! controller - a stateful WebSocket matchmaking and relay server
//! responsible for:
//!
//! - Anonymous peer matchmaking with per-mode FIFO queues and
//!   interest-based affinity
//! - Opaque relay of chat, typing, file and WebRTC signaling frames
//!   between paired peers
//! - Idempotent pair teardown on voluntary leave or transport loss
//! - Graceful shutdown with partner notification
//!
//! # Architecture
//!
//! The service uses a small actor hierarchy:
//!
//! ```text
//! MatchmakerActor (singleton per instance)
//! ├── owns the ConnectionRegistry and MatchQueues
//! └── pushes frames to N ConnectionWriter tasks
//!     └── ConnectionWriter (one per WebSocket connection)
//! ```
//!
//! # Key Design Decisions
//!
//! - **Single serialization point**: every pairing decision passes through
//!   the matchmaker actor, so no two connections can concurrently claim
//!   the same waiting peer
//! - **Opaque relay**: relay frames are classified by their `type` field
//!   only and forwarded byte-for-byte; the server never parses payloads
//! - **Backpressure by mailbox**: the matchmaker uses `try_send` toward
//!   writer mailboxes, so one stalled client cannot block matchmaking
//!
//! # Modules
//!
//! - [`actors`] - Actor model implementation
//! - [`config`] - Service configuration from environment
//! - [`errors`] - Error types with wire error codes
//! - [`matchmaking`] - Per-mode FIFO queues with interest affinity
//! - [`registry`] - Connection records and the pairing state machine
//! - [`ws`] - WebSocket transport surface
//! - [`observability`] - Health probes, status surface and metrics

pub mod actors;
pub mod config;
pub mod errors;
pub mod matchmaking;
pub mod observability;
pub mod registry;
pub mod ws;
