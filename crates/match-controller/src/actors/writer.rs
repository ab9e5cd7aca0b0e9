//! Per-connection writer task.
//!
//! Each WebSocket connection gets one writer task that owns the write half
//! of the socket and drains a bounded `Outbound` mailbox. The matchmaker
//! pushes into that mailbox with `try_send`, so a client that stops reading
//! fills its own mailbox without ever blocking matchmaking for anyone else.
//!
//! The writer is generic over the sink so tests can substitute a channel
//! for the socket.

use super::messages::Outbound;

use axum::extract::ws::Message;
use chat_protocol::ConnectionId;
use futures_util::{Sink, SinkExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Buffer size for a connection's outbound mailbox. Relayed file frames can
/// be large, so this is kept well below the matchmaker's own buffer.
pub const OUTBOUND_CHANNEL_BUFFER: usize = 64;

/// Writer task for one connection.
pub struct ConnectionWriter<S> {
    connection_id: ConnectionId,
    sink: S,
    receiver: mpsc::Receiver<Outbound>,
    cancel_token: CancellationToken,
}

impl<S> ConnectionWriter<S>
where
    S: Sink<Message> + Unpin,
    S::Error: std::fmt::Display,
{
    /// Create a writer over the socket's write half and its mailbox.
    pub fn new(
        connection_id: ConnectionId,
        sink: S,
        receiver: mpsc::Receiver<Outbound>,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            connection_id,
            sink,
            receiver,
            cancel_token,
        }
    }

    /// Drain the mailbox until the connection goes away.
    ///
    /// Exits when the mailbox closes (connection removed from the
    /// registry), the socket rejects a write (client gone) or the
    /// cancellation token fires (instance shutdown).
    pub async fn run(mut self) {
        let mut frames_written: u64 = 0;

        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    let _ = self.sink.send(Message::Close(None)).await;
                    debug!(
                        target: "sb.actor.connection",
                        connection_id = %self.connection_id,
                        "Writer cancelled, close frame sent"
                    );
                    break;
                }

                msg = self.receiver.recv() => {
                    let Some(outbound) = msg else {
                        debug!(
                            target: "sb.actor.connection",
                            connection_id = %self.connection_id,
                            "Writer mailbox closed, exiting"
                        );
                        break;
                    };

                    let text = match outbound {
                        Outbound::Control(frame) => frame.to_json(),
                        Outbound::Relay(raw) => raw,
                    };

                    if let Err(e) = self.sink.send(Message::Text(text)).await {
                        warn!(
                            target: "sb.actor.connection",
                            connection_id = %self.connection_id,
                            error = %e,
                            "Socket write failed, writer exiting"
                        );
                        break;
                    }
                    frames_written += 1;
                }
            }
        }

        debug!(
            target: "sb.actor.connection",
            connection_id = %self.connection_id,
            frames_written,
            "Writer stopped"
        );
    }
}
