//! Connection registry - the single source of truth for live connections.
//!
//! Maps connection id -> connection record. Every record is in exactly one
//! of three states: `Idle` (registered, not queued), `Waiting` (in exactly
//! one matchmaking queue) or `Paired` (linked to a partner, in no queue).
//! Partner links are strictly symmetric: `set_partner` and `clear_partner`
//! always update both directions in one call, so no observer can see a
//! half-updated pair.
//!
//! The registry is owned and mutated exclusively by the matchmaker actor;
//! it never leaves that task.

use crate::actors::messages::Outbound;
use crate::errors::SbError;

use chat_protocol::{ChatMode, ConnectionId};
use std::collections::HashMap;
use tokio::sync::mpsc;

/// Lifecycle state of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    /// Registered but neither queued nor paired.
    Idle,
    /// Present in its mode's matchmaking queue.
    Waiting,
    /// Linked to a partner; not present in any queue.
    Paired(ConnectionId),
}

/// One live client connection.
#[derive(Debug)]
pub struct Connection {
    mode: ChatMode,
    interest: String,
    state: PeerState,
    /// Transport handle; frames pushed here are written to the socket by
    /// the connection's writer task.
    outbound: mpsc::Sender<Outbound>,
}

impl Connection {
    /// Chat mode this connection is matched in.
    #[must_use]
    pub fn mode(&self) -> ChatMode {
        self.mode
    }

    /// Interest tag; empty string is the wildcard.
    #[must_use]
    pub fn interest(&self) -> &str {
        &self.interest
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> PeerState {
        self.state
    }

    /// Current partner id, if paired.
    #[must_use]
    pub fn partner(&self) -> Option<ConnectionId> {
        match self.state {
            PeerState::Paired(partner) => Some(partner),
            PeerState::Idle | PeerState::Waiting => None,
        }
    }

    /// Clone of the outbound transport handle.
    #[must_use]
    pub fn outbound(&self) -> mpsc::Sender<Outbound> {
        self.outbound.clone()
    }
}

/// Registry of all live connections on this instance.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: HashMap<ConnectionId, Connection>,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new connection in the `Idle` state.
    ///
    /// # Errors
    ///
    /// `DuplicateConnection` if the id is already live.
    pub fn register(
        &mut self,
        id: ConnectionId,
        mode: ChatMode,
        interest: String,
        outbound: mpsc::Sender<Outbound>,
    ) -> Result<(), SbError> {
        if self.connections.contains_key(&id) {
            return Err(SbError::DuplicateConnection(id.to_string()));
        }
        self.connections.insert(
            id,
            Connection {
                mode,
                interest,
                state: PeerState::Idle,
                outbound,
            },
        );
        Ok(())
    }

    /// Look up a connection record.
    ///
    /// # Errors
    ///
    /// `NotFound` if the id is not tracked.
    pub fn lookup(&self, id: ConnectionId) -> Result<&Connection, SbError> {
        self.connections
            .get(&id)
            .ok_or_else(|| SbError::NotFound(id.to_string()))
    }

    /// Whether the id is currently tracked.
    #[must_use]
    pub fn contains(&self, id: ConnectionId) -> bool {
        self.connections.contains_key(&id)
    }

    /// Update mode/interest for an `Idle` connection (re-join with new
    /// parameters).
    ///
    /// # Errors
    ///
    /// `NotFound` if untracked; `AlreadyQueued`/`AlreadyPaired` if the
    /// connection is not idle.
    pub fn set_profile(
        &mut self,
        id: ConnectionId,
        mode: ChatMode,
        interest: String,
    ) -> Result<(), SbError> {
        let conn = self
            .connections
            .get_mut(&id)
            .ok_or_else(|| SbError::NotFound(id.to_string()))?;
        match conn.state {
            PeerState::Idle => {
                conn.mode = mode;
                conn.interest = interest;
                Ok(())
            }
            PeerState::Waiting => Err(SbError::AlreadyQueued),
            PeerState::Paired(_) => Err(SbError::AlreadyPaired),
        }
    }

    /// Transition an `Idle` connection to `Waiting` (it has been placed in
    /// its mode's queue).
    ///
    /// # Errors
    ///
    /// `NotFound` if untracked; `AlreadyQueued`/`AlreadyPaired` if the
    /// connection is not idle.
    pub fn mark_waiting(&mut self, id: ConnectionId) -> Result<(), SbError> {
        let conn = self
            .connections
            .get_mut(&id)
            .ok_or_else(|| SbError::NotFound(id.to_string()))?;
        match conn.state {
            PeerState::Idle => {
                conn.state = PeerState::Waiting;
                Ok(())
            }
            PeerState::Waiting => Err(SbError::AlreadyQueued),
            PeerState::Paired(_) => Err(SbError::AlreadyPaired),
        }
    }

    /// Transition a `Waiting` connection back to `Idle` (its queue entry
    /// has been purged). No-op for `Idle`; rejects `Paired`.
    ///
    /// # Errors
    ///
    /// `NotFound` if untracked; `AlreadyPaired` if the connection holds a
    /// partner link.
    pub fn clear_waiting(&mut self, id: ConnectionId) -> Result<(), SbError> {
        let conn = self
            .connections
            .get_mut(&id)
            .ok_or_else(|| SbError::NotFound(id.to_string()))?;
        match conn.state {
            PeerState::Idle | PeerState::Waiting => {
                conn.state = PeerState::Idle;
                Ok(())
            }
            PeerState::Paired(_) => Err(SbError::AlreadyPaired),
        }
    }

    /// Atomically link two connections as partners.
    ///
    /// Both sides transition to `Paired` in one call; the symmetry
    /// invariant holds the moment this returns. Callers must already have
    /// removed both ids from any queue.
    ///
    /// # Errors
    ///
    /// `NotFound` if either id is untracked; `AlreadyPaired` if either
    /// side already has a partner. On error neither side is modified.
    pub fn set_partner(&mut self, a: ConnectionId, b: ConnectionId) -> Result<(), SbError> {
        if a == b {
            return Err(SbError::Internal(
                "cannot pair a connection with itself".to_string(),
            ));
        }
        // Validate both sides before touching either.
        for id in [a, b] {
            let conn = self
                .connections
                .get(&id)
                .ok_or_else(|| SbError::NotFound(id.to_string()))?;
            if matches!(conn.state, PeerState::Paired(_)) {
                return Err(SbError::AlreadyPaired);
            }
        }
        if let Some(conn) = self.connections.get_mut(&a) {
            conn.state = PeerState::Paired(b);
        }
        if let Some(conn) = self.connections.get_mut(&b) {
            conn.state = PeerState::Paired(a);
        }
        Ok(())
    }

    /// Atomically clear the partner link on both sides.
    ///
    /// Returns the former partner id, or `None` if `id` is untracked or
    /// unpaired (no-op). Both sides transition back to `Idle`.
    pub fn clear_partner(&mut self, id: ConnectionId) -> Option<ConnectionId> {
        let partner = self.connections.get(&id).and_then(Connection::partner)?;
        if let Some(conn) = self.connections.get_mut(&id) {
            conn.state = PeerState::Idle;
        }
        // The partner record exists while the link does; a missing record
        // must not leave a dangling back-link.
        if let Some(conn) = self.connections.get_mut(&partner) {
            if conn.state == PeerState::Paired(id) {
                conn.state = PeerState::Idle;
            }
        }
        Some(partner)
    }

    /// Delete a connection record.
    ///
    /// Callers must have cleared any partner link and purged any queue
    /// entry first. Returns the removed record, or `None` if untracked.
    pub fn remove(&mut self, id: ConnectionId) -> Option<Connection> {
        self.connections.remove(&id)
    }

    /// Number of tracked connections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Ids of all currently-paired connections (each pair contributes
    /// both ids).
    #[must_use]
    pub fn paired_ids(&self) -> Vec<ConnectionId> {
        self.connections
            .iter()
            .filter(|(_, c)| matches!(c.state, PeerState::Paired(_)))
            .map(|(id, _)| *id)
            .collect()
    }

    /// Number of active pairs (paired connections / 2).
    #[must_use]
    pub fn pair_count(&self) -> usize {
        self.connections
            .values()
            .filter(|c| matches!(c.state, PeerState::Paired(_)))
            .count()
            / 2
    }
}
