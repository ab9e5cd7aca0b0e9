//! `MatchmakerActor` - singleton owner of the registry and queues.
//!
//! The `MatchmakerActor` is the top-level actor in the instance hierarchy:
//!
//! - Singleton per instance
//! - Exclusively owns the `ConnectionRegistry` and `MatchQueues`, so every
//!   pairing decision is serialized through one task and no locks are needed
//! - Pushes outbound frames to per-connection writer mailboxes with
//!   `try_send`, so a slow client can never stall matchmaking
//! - Owns the root `CancellationToken` for graceful shutdown
//!
//! # Graceful Shutdown
//!
//! On SIGTERM, the matchmaker:
//! 1. Sets `accepting_new = false` (new joins are rejected as draining)
//! 2. Notifies every paired connection's partner
//! 3. Exits; connection writer tasks observe their child tokens and close

use crate::errors::SbError;
use crate::matchmaking::{EnqueueOutcome, MatchQueues};
use crate::observability::metrics as obs;
use crate::registry::{ConnectionRegistry, PeerState};

use super::messages::{FindResult, MatchmakerMessage, MatchmakerStatus, Outbound};
use super::metrics::{ActorMetrics, ActorType, MailboxMonitor};

use chat_protocol::{ChatMode, ConnectionId, FrameType, ServerFrame};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Default channel buffer size for the matchmaker mailbox.
const MATCHMAKER_CHANNEL_BUFFER: usize = 1000;

/// Handle to the `MatchmakerActor`.
///
/// This is the public interface for interacting with the matchmaker.
/// All request-reply methods are async and return results via oneshot
/// channels.
#[derive(Clone)]
pub struct MatchmakerHandle {
    sender: mpsc::Sender<MatchmakerMessage>,
    cancel_token: CancellationToken,
}

impl MatchmakerHandle {
    /// Create a new `MatchmakerActor` and return a handle to it.
    ///
    /// This spawns the actor task and returns immediately.
    #[must_use]
    pub fn new(instance_id: String, metrics: Arc<ActorMetrics>, auto_requeue: bool) -> Self {
        let (sender, receiver) = mpsc::channel(MATCHMAKER_CHANNEL_BUFFER);
        let cancel_token = CancellationToken::new();

        let actor = MatchmakerActor::new(
            instance_id,
            receiver,
            cancel_token.clone(),
            Arc::clone(&metrics),
            auto_requeue,
        );

        tokio::spawn(actor.run());

        Self {
            sender,
            cancel_token,
        }
    }

    /// Register a connection (or revise an idle one) and enter matchmaking.
    ///
    /// # Errors
    ///
    /// `AlreadyQueued`/`AlreadyPaired` if the connection is not idle,
    /// `Draining` during shutdown, `Internal` if the actor is gone.
    pub async fn join(
        &self,
        connection_id: ConnectionId,
        mode: ChatMode,
        interest: String,
        outbound: mpsc::Sender<Outbound>,
    ) -> Result<FindResult, SbError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(MatchmakerMessage::Join {
                connection_id,
                mode,
                interest,
                outbound,
                respond_to: tx,
            })
            .await
            .map_err(|e| SbError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| SbError::Internal(format!("response receive failed: {e}")))?
    }

    /// Re-request matching after a voluntary leave, optionally changing
    /// mode or interest first.
    pub async fn find(
        &self,
        connection_id: ConnectionId,
        mode: Option<ChatMode>,
        interest: Option<String>,
    ) -> Result<FindResult, SbError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(MatchmakerMessage::Find {
                connection_id,
                mode,
                interest,
                respond_to: tx,
            })
            .await
            .map_err(|e| SbError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| SbError::Internal(format!("response receive failed: {e}")))?
    }

    /// Forward an opaque frame to the sender's partner.
    pub async fn relay(
        &self,
        connection_id: ConnectionId,
        frame_type: FrameType,
        raw: String,
    ) -> Result<(), SbError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(MatchmakerMessage::Relay {
                connection_id,
                frame_type,
                raw,
                respond_to: tx,
            })
            .await
            .map_err(|e| SbError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| SbError::Internal(format!("response receive failed: {e}")))?
    }

    /// Tear down the sender's pair (or waiting entry) without closing the
    /// connection. Idempotent.
    pub async fn leave_pair(&self, connection_id: ConnectionId) -> Result<(), SbError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(MatchmakerMessage::LeavePair {
                connection_id,
                respond_to: tx,
            })
            .await
            .map_err(|e| SbError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| SbError::Internal(format!("response receive failed: {e}")))?
    }

    /// Notify the matchmaker that the transport closed. Fire-and-forget
    /// and idempotent; safe to call for an id that was never registered.
    pub async fn connection_closed(&self, connection_id: ConnectionId) {
        // Ignore send failure: the actor is already gone during shutdown.
        let _ = self
            .sender
            .send(MatchmakerMessage::ConnectionClosed { connection_id })
            .await;
    }

    /// Get the current matchmaker status.
    pub async fn get_status(&self) -> Result<MatchmakerStatus, SbError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(MatchmakerMessage::GetStatus { respond_to: tx })
            .await
            .map_err(|e| SbError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| SbError::Internal(format!("response receive failed: {e}")))
    }

    /// Cancel the actor (initiates shutdown).
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    /// Check if the actor is cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Get a child token for spawning connection writer tasks.
    #[must_use]
    pub fn child_token(&self) -> CancellationToken {
        self.cancel_token.child_token()
    }
}

/// The `MatchmakerActor` implementation.
///
/// This struct owns the actor state and runs the message loop.
struct MatchmakerActor {
    /// Instance ID for log correlation.
    instance_id: String,
    /// Message receiver.
    receiver: mpsc::Receiver<MatchmakerMessage>,
    /// Cancellation token (root).
    cancel_token: CancellationToken,
    /// All live connections.
    registry: ConnectionRegistry,
    /// Per-mode FIFO queues.
    queues: MatchQueues,
    /// Whether departures put the surviving partner back in the queue.
    auto_requeue: bool,
    /// Whether new joins are accepted.
    accepting_new: bool,
    /// Shared metrics.
    metrics: Arc<ActorMetrics>,
    /// Mailbox monitor.
    mailbox: MailboxMonitor,
}

impl MatchmakerActor {
    fn new(
        instance_id: String,
        receiver: mpsc::Receiver<MatchmakerMessage>,
        cancel_token: CancellationToken,
        metrics: Arc<ActorMetrics>,
        auto_requeue: bool,
    ) -> Self {
        let mailbox = MailboxMonitor::new(ActorType::Matchmaker, &instance_id);

        Self {
            instance_id,
            receiver,
            cancel_token,
            registry: ConnectionRegistry::new(),
            queues: MatchQueues::new(),
            auto_requeue,
            accepting_new: true,
            metrics,
            mailbox,
        }
    }

    /// Run the actor message loop.
    #[instrument(skip_all, name = "sb.actor.matchmaker", fields(instance_id = %self.instance_id))]
    async fn run(mut self) {
        info!(
            target: "sb.actor.matchmaker",
            instance_id = %self.instance_id,
            auto_requeue = self.auto_requeue,
            "MatchmakerActor started"
        );

        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    info!(
                        target: "sb.actor.matchmaker",
                        instance_id = %self.instance_id,
                        "MatchmakerActor received cancellation signal"
                    );
                    self.graceful_shutdown();
                    break;
                }

                msg = self.receiver.recv() => {
                    match msg {
                        Some(message) => {
                            self.mailbox.record_enqueue();
                            self.handle_message(message);
                            self.mailbox.record_dequeue();
                            self.metrics.record_message_processed();
                            obs::set_actor_mailbox_depth(
                                ActorType::Matchmaker.as_str(),
                                self.mailbox.current_depth(),
                            );
                        }
                        None => {
                            info!(
                                target: "sb.actor.matchmaker",
                                instance_id = %self.instance_id,
                                "MatchmakerActor channel closed, exiting"
                            );
                            break;
                        }
                    }
                }
            }
        }

        info!(
            target: "sb.actor.matchmaker",
            instance_id = %self.instance_id,
            connections_remaining = self.registry.len(),
            messages_processed = self.mailbox.messages_processed(),
            "MatchmakerActor stopped"
        );
    }

    /// Handle a single message.
    fn handle_message(&mut self, message: MatchmakerMessage) {
        match message {
            MatchmakerMessage::Join {
                connection_id,
                mode,
                interest,
                outbound,
                respond_to,
            } => {
                let result = self.handle_join(connection_id, mode, interest, outbound);
                let _ = respond_to.send(result);
            }

            MatchmakerMessage::Find {
                connection_id,
                mode,
                interest,
                respond_to,
            } => {
                let result = self.handle_find(connection_id, mode, interest);
                let _ = respond_to.send(result);
            }

            MatchmakerMessage::Relay {
                connection_id,
                frame_type,
                raw,
                respond_to,
            } => {
                let result = self.handle_relay(connection_id, frame_type, &raw);
                let _ = respond_to.send(result);
            }

            MatchmakerMessage::LeavePair {
                connection_id,
                respond_to,
            } => {
                let result = self.handle_leave_pair(connection_id);
                let _ = respond_to.send(result);
            }

            MatchmakerMessage::ConnectionClosed { connection_id } => {
                self.handle_connection_closed(connection_id);
            }

            MatchmakerMessage::GetStatus { respond_to } => {
                let _ = respond_to.send(self.status());
            }
        }
    }

    /// Register a new connection (or revise an idle one) and run
    /// matchmaking for it.
    fn handle_join(
        &mut self,
        connection_id: ConnectionId,
        mode: ChatMode,
        interest: String,
        outbound: mpsc::Sender<Outbound>,
    ) -> Result<FindResult, SbError> {
        if !self.accepting_new {
            return Err(SbError::Draining);
        }

        if self.registry.contains(connection_id) {
            // Re-join after a voluntary leave; rejected unless idle.
            self.registry.set_profile(connection_id, mode, interest)?;
        } else {
            self.registry
                .register(connection_id, mode, interest, outbound)?;
            self.metrics.connection_registered();
            obs::set_connections_active(self.registry.len());

            info!(
                target: "sb.actor.matchmaker",
                instance_id = %self.instance_id,
                connection_id = %connection_id,
                mode = mode.as_str(),
                total_connections = self.registry.len(),
                "Connection registered"
            );
        }

        self.run_matchmaking(connection_id)
    }

    /// Re-request matching for an already-registered connection.
    fn handle_find(
        &mut self,
        connection_id: ConnectionId,
        mode: Option<ChatMode>,
        interest: Option<String>,
    ) -> Result<FindResult, SbError> {
        // Reject non-idle callers up front so a find while paired cannot
        // corrupt an existing pair.
        let conn = self.registry.lookup(connection_id)?;
        match conn.state() {
            PeerState::Idle => {}
            PeerState::Waiting => return Err(SbError::AlreadyQueued),
            PeerState::Paired(_) => return Err(SbError::AlreadyPaired),
        }

        // A find frame may revise the join parameters.
        if mode.is_some() || interest.is_some() {
            let new_mode = mode.unwrap_or_else(|| conn.mode());
            let new_interest = interest.unwrap_or_else(|| conn.interest().to_string());
            self.registry
                .set_profile(connection_id, new_mode, new_interest)?;
        }

        self.run_matchmaking(connection_id)
    }

    /// Place an idle connection in its mode's queue, pairing immediately
    /// when a compatible peer is already waiting.
    fn run_matchmaking(&mut self, connection_id: ConnectionId) -> Result<FindResult, SbError> {
        let conn = self.registry.lookup(connection_id)?;
        let (mode, interest) = (conn.mode(), conn.interest().to_string());

        match self.queues.enqueue(mode, connection_id, &interest)? {
            EnqueueOutcome::Matched { candidate, waited } => {
                self.form_pair(connection_id, candidate, mode)?;
                obs::record_match_wait(mode.as_str(), waited);
                Ok(FindResult::Paired {
                    partner: candidate,
                    mode,
                })
            }
            EnqueueOutcome::Enqueued => {
                self.registry.mark_waiting(connection_id)?;
                obs::set_waiting_active(mode.as_str(), self.queues.waiting(mode));
                debug!(
                    target: "sb.actor.matchmaker",
                    instance_id = %self.instance_id,
                    connection_id = %connection_id,
                    mode = mode.as_str(),
                    waiting = self.queues.waiting(mode),
                    "Connection waiting for a match"
                );
                Ok(FindResult::Waiting)
            }
        }
    }

    /// Link two connections and notify both sides.
    fn form_pair(
        &mut self,
        a: ConnectionId,
        b: ConnectionId,
        mode: ChatMode,
    ) -> Result<(), SbError> {
        self.registry.set_partner(a, b)?;
        self.metrics.pair_formed();
        obs::record_pair_formed(mode.as_str());
        obs::set_pairs_active(self.registry.pair_count());
        obs::set_waiting_active(mode.as_str(), self.queues.waiting(mode));

        self.push_control(a, ServerFrame::Paired { partner: b, mode });
        self.push_control(b, ServerFrame::Paired { partner: a, mode });

        info!(
            target: "sb.actor.matchmaker",
            instance_id = %self.instance_id,
            connection_a = %a,
            connection_b = %b,
            mode = mode.as_str(),
            "Pair formed"
        );

        Ok(())
    }

    /// Forward an opaque frame to the sender's partner, verbatim.
    ///
    /// An unpaired sender is not an error: the frame raced a disconnect
    /// and is silently dropped.
    fn handle_relay(
        &mut self,
        connection_id: ConnectionId,
        frame_type: FrameType,
        raw: &str,
    ) -> Result<(), SbError> {
        let conn = self.registry.lookup(connection_id)?;
        let Some(partner) = conn.partner() else {
            debug!(
                target: "sb.actor.matchmaker",
                instance_id = %self.instance_id,
                connection_id = %connection_id,
                frame_type = frame_type.as_str(),
                "Relay from unpaired connection dropped"
            );
            return Ok(());
        };

        let Ok(partner_conn) = self.registry.lookup(partner) else {
            // A dangling link means the partner's teardown never ran;
            // finish it now and drop the frame.
            warn!(
                target: "sb.actor.matchmaker",
                instance_id = %self.instance_id,
                connection_id = %connection_id,
                partner = %partner,
                "Partner record missing, clearing stale pair"
            );
            if self.registry.clear_partner(connection_id).is_some() {
                self.metrics.pair_dissolved();
                obs::set_pairs_active(self.registry.pair_count());
                self.push_control(connection_id, ServerFrame::PartnerDisconnected);
            }
            return Ok(());
        };

        match partner_conn.outbound().try_send(Outbound::Relay(raw.to_string())) {
            Ok(()) => {
                obs::record_frame_relayed(frame_type.as_str());
                obs::record_relay_bytes(frame_type.as_str(), raw.len());
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                // The partner's writer is backlogged; drop the frame and
                // report it to the sender.
                obs::record_message_dropped(ActorType::Connection.as_str());
                warn!(
                    target: "sb.actor.matchmaker",
                    instance_id = %self.instance_id,
                    connection_id = %connection_id,
                    partner = %partner,
                    frame_type = frame_type.as_str(),
                    "Relay dropped, partner outbound mailbox full"
                );
                Err(SbError::Internal("partner not keeping up".to_string()))
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                // Partner transport already closed; its close notification
                // is in flight behind this message. Same race as unpaired.
                debug!(
                    target: "sb.actor.matchmaker",
                    instance_id = %self.instance_id,
                    connection_id = %connection_id,
                    partner = %partner,
                    "Relay raced partner close, frame dropped"
                );
                Ok(())
            }
        }
    }

    /// Explicit departure: dissolve the pair or cancel the wait, keeping
    /// the connection registered and idle. Idempotent.
    fn handle_leave_pair(&mut self, connection_id: ConnectionId) -> Result<(), SbError> {
        let conn = self.registry.lookup(connection_id)?;
        let mode = conn.mode();

        match conn.state() {
            PeerState::Paired(_) => {
                if let Some(partner) = self.registry.clear_partner(connection_id) {
                    self.dissolve_pair(connection_id, partner);
                }
            }
            PeerState::Waiting => {
                self.queues.remove_if_present(mode, connection_id);
                self.registry.clear_waiting(connection_id)?;
                obs::set_waiting_active(mode.as_str(), self.queues.waiting(mode));
            }
            PeerState::Idle => {
                // Duplicate disconnect frame: nothing left to tear down.
                debug!(
                    target: "sb.actor.matchmaker",
                    instance_id = %self.instance_id,
                    connection_id = %connection_id,
                    "Disconnect with no pair or wait to cancel"
                );
            }
        }

        Ok(())
    }

    /// Notify the surviving side of a dissolved pair and optionally put it
    /// straight back in the queue.
    fn dissolve_pair(&mut self, leaver: ConnectionId, survivor: ConnectionId) {
        self.metrics.pair_dissolved();
        obs::set_pairs_active(self.registry.pair_count());
        self.push_control(survivor, ServerFrame::PartnerDisconnected);

        info!(
            target: "sb.actor.matchmaker",
            instance_id = %self.instance_id,
            leaver = %leaver,
            survivor = %survivor,
            "Pair dissolved"
        );

        if self.auto_requeue && !self.cancel_token.is_cancelled() {
            // The survivor re-enters matchmaking with its current profile,
            // behind everyone already waiting.
            if let Err(e) = self.handle_find(survivor, None, None) {
                debug!(
                    target: "sb.actor.matchmaker",
                    instance_id = %self.instance_id,
                    survivor = %survivor,
                    error = %e,
                    "Auto requeue skipped"
                );
            }
        }
    }

    /// Transport closed: full teardown of the connection. Idempotent.
    fn handle_connection_closed(&mut self, connection_id: ConnectionId) {
        let Ok(conn) = self.registry.lookup(connection_id) else {
            // Close raced with an earlier removal, nothing to do.
            debug!(
                target: "sb.actor.matchmaker",
                instance_id = %self.instance_id,
                connection_id = %connection_id,
                "Close notification for unknown connection"
            );
            return;
        };
        let mode = conn.mode();

        self.queues.remove_if_present(mode, connection_id);
        obs::set_waiting_active(mode.as_str(), self.queues.waiting(mode));

        if let Some(partner) = self.registry.clear_partner(connection_id) {
            self.dissolve_pair(connection_id, partner);
        }

        self.registry.remove(connection_id);
        self.metrics.connection_removed();
        obs::set_connections_active(self.registry.len());

        info!(
            target: "sb.actor.matchmaker",
            instance_id = %self.instance_id,
            connection_id = %connection_id,
            total_connections = self.registry.len(),
            "Connection removed"
        );
    }

    /// Current state snapshot.
    fn status(&self) -> MatchmakerStatus {
        MatchmakerStatus {
            connection_count: self.registry.len(),
            waiting_count: self.queues.total_waiting(),
            pair_count: self.registry.pair_count(),
            is_draining: !self.accepting_new,
            mailbox_depth: self.mailbox.current_depth(),
        }
    }

    /// Stop accepting joins and tell every paired connection that its
    /// partner is going away. Writer tasks close via their child tokens.
    fn graceful_shutdown(&mut self) {
        self.accepting_new = false;

        // Each pair appears twice in the list; clear_partner makes the
        // second occurrence a no-op.
        for id in self.registry.paired_ids() {
            if let Some(partner) = self.registry.clear_partner(id) {
                self.push_control(id, ServerFrame::PartnerDisconnected);
                self.push_control(partner, ServerFrame::PartnerDisconnected);
                self.metrics.pair_dissolved();
            }
        }

        info!(
            target: "sb.actor.matchmaker",
            instance_id = %self.instance_id,
            connections = self.registry.len(),
            "Matchmaker draining"
        );
    }

    /// Push a control frame to a connection's writer mailbox.
    fn push_control(&self, id: ConnectionId, frame: ServerFrame) {
        let Ok(conn) = self.registry.lookup(id) else {
            return;
        };
        if let Err(e) = conn.outbound().try_send(Outbound::Control(frame)) {
            obs::record_message_dropped(ActorType::Connection.as_str());
            warn!(
                target: "sb.actor.matchmaker",
                instance_id = %self.instance_id,
                connection_id = %id,
                error = %e,
                "Control frame dropped"
            );
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::Receiver;

    fn handle() -> MatchmakerHandle {
        MatchmakerHandle::new("test-instance".to_string(), ActorMetrics::new(), false)
    }

    fn requeue_handle() -> MatchmakerHandle {
        MatchmakerHandle::new("test-instance".to_string(), ActorMetrics::new(), true)
    }

    async fn join(
        handle: &MatchmakerHandle,
        mode: ChatMode,
        interest: &str,
    ) -> (ConnectionId, Receiver<Outbound>, FindResult) {
        let id = ConnectionId::new();
        let (tx, rx) = mpsc::channel(16);
        let result = handle
            .join(id, mode, interest.to_string(), tx)
            .await
            .unwrap();
        (id, rx, result)
    }

    fn expect_paired(outbound: &mut Receiver<Outbound>, partner: ConnectionId) {
        match outbound.try_recv().unwrap() {
            Outbound::Control(ServerFrame::Paired { partner: p, .. }) => assert_eq!(p, partner),
            other => panic!("expected paired frame, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_second_join_pairs_with_waiting_peer() {
        let handle = handle();
        let (a, mut rx_a, first) = join(&handle, ChatMode::Text, "").await;
        assert_eq!(first, FindResult::Waiting);

        let (b, mut rx_b, second) = join(&handle, ChatMode::Text, "").await;
        assert_eq!(
            second,
            FindResult::Paired {
                partner: a,
                mode: ChatMode::Text
            }
        );

        expect_paired(&mut rx_a, b);
        expect_paired(&mut rx_b, a);

        let status = handle.get_status().await.unwrap();
        assert_eq!(status.connection_count, 2);
        assert_eq!(status.pair_count, 1);
        assert_eq!(status.waiting_count, 0);
    }

    #[tokio::test]
    async fn test_join_while_waiting_rejected() {
        let handle = handle();
        let (a, _rx_a, _) = join(&handle, ChatMode::Text, "").await;

        let (tx, _rx) = mpsc::channel(16);
        let result = handle.join(a, ChatMode::Text, String::new(), tx).await;
        assert!(matches!(result, Err(SbError::AlreadyQueued)));
    }

    #[tokio::test]
    async fn test_join_while_paired_rejected() {
        let handle = handle();
        let (a, _rx_a, _) = join(&handle, ChatMode::Text, "").await;
        let (_b, _rx_b, _) = join(&handle, ChatMode::Text, "").await;

        let (tx, _rx) = mpsc::channel(16);
        let result = handle.join(a, ChatMode::Video, String::new(), tx).await;
        assert!(matches!(result, Err(SbError::AlreadyPaired)));
    }

    #[tokio::test]
    async fn test_find_while_waiting_rejected() {
        let handle = handle();
        let (a, _rx_a, _) = join(&handle, ChatMode::Text, "").await;

        assert!(matches!(
            handle.find(a, None, None).await,
            Err(SbError::AlreadyQueued)
        ));
    }

    #[tokio::test]
    async fn test_find_while_paired_rejected() {
        let handle = handle();
        let (a, _rx_a, _) = join(&handle, ChatMode::Text, "").await;
        let (_b, _rx_b, _) = join(&handle, ChatMode::Text, "").await;

        assert!(matches!(
            handle.find(a, None, None).await,
            Err(SbError::AlreadyPaired)
        ));
    }

    #[tokio::test]
    async fn test_modes_do_not_cross_match() {
        let handle = handle();
        let (_a, _rx_a, first) = join(&handle, ChatMode::Text, "").await;
        let (_b, _rx_b, second) = join(&handle, ChatMode::Video, "").await;

        assert_eq!(first, FindResult::Waiting);
        assert_eq!(second, FindResult::Waiting);

        let status = handle.get_status().await.unwrap();
        assert_eq!(status.waiting_count, 2);
        assert_eq!(status.pair_count, 0);
    }

    #[tokio::test]
    async fn test_interest_affinity_prefers_exact_match() {
        let handle = handle();
        let (x, mut rx_x, _) = join(&handle, ChatMode::Text, "cats").await;
        let (_y, _rx_y, _) = join(&handle, ChatMode::Text, "dogs").await;
        let (z, _rx_z, result) = join(&handle, ChatMode::Text, "cats").await;

        assert_eq!(
            result,
            FindResult::Paired {
                partner: x,
                mode: ChatMode::Text
            }
        );
        expect_paired(&mut rx_x, z);
    }

    #[tokio::test]
    async fn test_relay_reaches_partner_verbatim() {
        let handle = handle();
        let (a, _rx_a, _) = join(&handle, ChatMode::Text, "").await;
        let (_b, mut rx_b, _) = join(&handle, ChatMode::Text, "").await;
        // Drain the paired frame before the relay assertion.
        let _ = rx_b.try_recv();

        let raw = r#"{"type":"message","text":"hello","extra":42}"#;
        handle
            .relay(a, FrameType::Message, raw.to_string())
            .await
            .unwrap();

        match rx_b.try_recv().unwrap() {
            Outbound::Relay(text) => assert_eq!(text, raw),
            other => panic!("expected relay frame, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_relay_while_waiting_is_silently_dropped() {
        let handle = handle();
        let (a, mut rx_a, _) = join(&handle, ChatMode::Text, "").await;

        // Not an error: the frame may have raced a disconnect.
        handle
            .relay(a, FrameType::Message, "{}".to_string())
            .await
            .unwrap();
        assert!(rx_a.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_relay_from_unknown_connection_is_not_found() {
        let handle = handle();
        let result = handle
            .relay(ConnectionId::new(), FrameType::Message, "{}".to_string())
            .await;
        assert!(matches!(result, Err(SbError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_leave_pair_notifies_partner_and_is_idempotent() {
        let handle = handle();
        let (a, _rx_a, _) = join(&handle, ChatMode::Text, "").await;
        let (_b, mut rx_b, _) = join(&handle, ChatMode::Text, "").await;
        let _ = rx_b.try_recv();

        handle.leave_pair(a).await.unwrap();
        assert!(matches!(
            rx_b.try_recv().unwrap(),
            Outbound::Control(ServerFrame::PartnerDisconnected)
        ));

        // Second disconnect is a no-op, no second notification.
        handle.leave_pair(a).await.unwrap();
        assert!(rx_b.try_recv().is_err());

        // Both sides are idle again.
        let status = handle.get_status().await.unwrap();
        assert_eq!(status.pair_count, 0);
        assert_eq!(status.connection_count, 2);
    }

    #[tokio::test]
    async fn test_find_after_leave_rematches() {
        let handle = handle();
        let (a, mut rx_a, _) = join(&handle, ChatMode::Text, "").await;
        let (b, mut rx_b, _) = join(&handle, ChatMode::Text, "").await;
        let _ = rx_a.try_recv();
        let _ = rx_b.try_recv();

        handle.leave_pair(a).await.unwrap();
        let _ = rx_b.try_recv();

        assert_eq!(handle.find(b, None, None).await.unwrap(), FindResult::Waiting);
        assert_eq!(
            handle.find(a, None, None).await.unwrap(),
            FindResult::Paired {
                partner: b,
                mode: ChatMode::Text
            }
        );
        expect_paired(&mut rx_a, b);
        expect_paired(&mut rx_b, a);
    }

    #[tokio::test]
    async fn test_leave_while_waiting_cancels_the_wait() {
        let handle = handle();
        let (a, _rx_a, _) = join(&handle, ChatMode::Text, "").await;

        handle.leave_pair(a).await.unwrap();
        let status = handle.get_status().await.unwrap();
        assert_eq!(status.waiting_count, 0);

        // Re-find works after the cancelled wait.
        assert_eq!(handle.find(a, None, None).await.unwrap(), FindResult::Waiting);
    }

    #[tokio::test]
    async fn test_transport_close_tears_down_pair_and_record() {
        let handle = handle();
        let (a, _rx_a, _) = join(&handle, ChatMode::Text, "").await;
        let (_b, mut rx_b, _) = join(&handle, ChatMode::Text, "").await;
        let _ = rx_b.try_recv();

        handle.connection_closed(a).await;
        // Idempotent: a second close for the same id is ignored.
        handle.connection_closed(a).await;

        let status = handle.get_status().await.unwrap();
        assert_eq!(status.connection_count, 1);
        assert_eq!(status.pair_count, 0);
        assert!(matches!(
            rx_b.try_recv().unwrap(),
            Outbound::Control(ServerFrame::PartnerDisconnected)
        ));
    }

    #[tokio::test]
    async fn test_close_while_waiting_purges_queue_entry() {
        let handle = handle();
        let (a, _rx_a, _) = join(&handle, ChatMode::Text, "").await;
        handle.connection_closed(a).await;

        // A later arrival must not be matched against the departed a.
        let (_b, _rx_b, result) = join(&handle, ChatMode::Text, "").await;
        assert_eq!(result, FindResult::Waiting);
    }

    #[tokio::test]
    async fn test_find_may_revise_mode_and_interest() {
        let handle = handle();
        let (b, _rx_b, _) = join(&handle, ChatMode::Video, "").await;
        let (a, _rx_a, _) = join(&handle, ChatMode::Text, "cats").await;
        handle.leave_pair(a).await.unwrap();

        let result = handle
            .find(a, Some(ChatMode::Video), Some(String::new()))
            .await
            .unwrap();
        assert_eq!(
            result,
            FindResult::Paired {
                partner: b,
                mode: ChatMode::Video
            }
        );
    }

    #[tokio::test]
    async fn test_auto_requeue_puts_survivor_back_in_queue() {
        let handle = requeue_handle();
        let (a, _rx_a, _) = join(&handle, ChatMode::Text, "").await;
        let (_b, _rx_b, _) = join(&handle, ChatMode::Text, "").await;

        handle.leave_pair(a).await.unwrap();

        let status = handle.get_status().await.unwrap();
        assert_eq!(status.pair_count, 0);
        assert_eq!(status.waiting_count, 1);
    }

    #[tokio::test]
    async fn test_join_rejected_while_draining() {
        let handle = handle();
        handle.cancel();
        // Let the actor observe cancellation before the join attempt.
        tokio::task::yield_now().await;

        let id = ConnectionId::new();
        let (tx, _rx) = mpsc::channel(16);
        let result = handle.join(id, ChatMode::Text, String::new(), tx).await;
        assert!(result.is_err());
    }
}
