//! Matchmaking queues - one FIFO waiting line per chat mode.
//!
//! A new arrival scans the queue for its mode from the head and takes the
//! first compatible candidate (equal interest, or either side wildcard).
//! Earliest-enqueued wins, which keeps matching fair and starvation-free.
//! If nothing is compatible the arrival is appended to the tail.
//!
//! A connection id appears in at most one queue at any time, and never
//! while paired; the matchmaker actor enforces the latter through the
//! registry state machine.

use crate::errors::SbError;

use chat_protocol::{ChatMode, ConnectionId};
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

/// Whether two interest tags are compatible. Empty string is the wildcard
/// and matches anything.
#[must_use]
pub fn interests_compatible(a: &str, b: &str) -> bool {
    a.is_empty() || b.is_empty() || a == b
}

/// One waiting connection.
#[derive(Debug, Clone)]
struct QueueEntry {
    id: ConnectionId,
    interest: String,
    enqueued_at: Instant,
}

/// Outcome of an enqueue attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// A compatible candidate was found and removed from the queue; the
    /// arrival was not inserted.
    Matched {
        candidate: ConnectionId,
        /// How long the candidate sat in the queue.
        waited: Duration,
    },
    /// No compatible candidate; the arrival now waits at the tail.
    Enqueued,
}

/// Per-mode FIFO matchmaking queues.
#[derive(Debug, Default)]
pub struct MatchQueues {
    queues: HashMap<ChatMode, VecDeque<QueueEntry>>,
}

impl MatchQueues {
    /// Create empty queues.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Scan the queue for `mode` head-first and either take the first
    /// compatible candidate or append the arrival to the tail.
    ///
    /// # Errors
    ///
    /// `AlreadyQueued` if `id` is already present in any queue.
    pub fn enqueue(
        &mut self,
        mode: ChatMode,
        id: ConnectionId,
        interest: &str,
    ) -> Result<EnqueueOutcome, SbError> {
        if self.contains(id) {
            return Err(SbError::AlreadyQueued);
        }

        let queue = self.queues.entry(mode).or_default();
        if let Some(pos) = queue
            .iter()
            .position(|entry| interests_compatible(&entry.interest, interest))
        {
            // First compatible match wins; untouched entries keep their order.
            match queue.remove(pos) {
                Some(candidate) => {
                    return Ok(EnqueueOutcome::Matched {
                        candidate: candidate.id,
                        waited: candidate.enqueued_at.elapsed(),
                    })
                }
                None => {
                    return Err(SbError::Internal(
                        "queue entry vanished during scan".to_string(),
                    ))
                }
            }
        }

        queue.push_back(QueueEntry {
            id,
            interest: interest.to_string(),
            enqueued_at: Instant::now(),
        });
        Ok(EnqueueOutcome::Enqueued)
    }

    /// Purge a possibly-stale queue entry. Idempotent; returns whether an
    /// entry was removed.
    pub fn remove_if_present(&mut self, mode: ChatMode, id: ConnectionId) -> bool {
        let Some(queue) = self.queues.get_mut(&mode) else {
            return false;
        };
        match queue.iter().position(|entry| entry.id == id) {
            Some(pos) => queue.remove(pos).is_some(),
            None => false,
        }
    }

    /// Whether `id` is present in any queue.
    #[must_use]
    pub fn contains(&self, id: ConnectionId) -> bool {
        self.queues
            .values()
            .any(|queue| queue.iter().any(|entry| entry.id == id))
    }

    /// Number of connections waiting in `mode`.
    #[must_use]
    pub fn waiting(&self, mode: ChatMode) -> usize {
        self.queues.get(&mode).map_or(0, VecDeque::len)
    }

    /// Number of connections waiting across all modes.
    #[must_use]
    pub fn total_waiting(&self) -> usize {
        self.queues.values().map(VecDeque::len).sum()
    }
}
