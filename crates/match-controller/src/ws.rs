//! WebSocket transport surface.
//!
//! One route, `GET /ws`, upgrades to a WebSocket carrying newline-free JSON
//! text frames. Each accepted socket is split: the read half runs in this
//! module's per-connection loop, the write half is handed to a
//! `ConnectionWriter` task draining the connection's outbound mailbox.
//!
//! The reader validates only the `type` field of inbound frames. Relay
//! frames are forwarded to the partner byte-for-byte; their payloads are
//! never inspected beyond the size cap on file frames.

use crate::actors::{ConnectionWriter, MatchmakerHandle, Outbound, OUTBOUND_CHANNEL_BUFFER};
use crate::errors::SbError;
use crate::observability::metrics as obs;

use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::State,
    response::Response,
    routing::get,
    Router,
};
use chat_protocol::{classify, parse_find, parse_join, ConnectionId, FrameType, ServerFrame};
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

/// Shared state for the WebSocket route.
#[derive(Clone)]
pub struct WsState {
    matchmaker: MatchmakerHandle,
    /// Upper bound on a single file frame, in bytes of frame text.
    max_file_payload_bytes: usize,
}

impl WsState {
    /// Bundle the matchmaker handle with transport limits.
    #[must_use]
    pub fn new(matchmaker: MatchmakerHandle, max_file_payload_bytes: usize) -> Self {
        Self {
            matchmaker,
            max_file_payload_bytes,
        }
    }
}

/// Create the client-facing router.
pub fn ws_router(state: WsState) -> Router {
    Router::new()
        .route("/ws", get(ws_upgrade_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Upgrade handler: every socket gets a fresh server-assigned id.
async fn ws_upgrade_handler(ws: WebSocketUpgrade, State(state): State<WsState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Per-connection lifecycle: spawn the writer, drain the reader, then
/// notify the matchmaker exactly once that the transport is gone.
async fn handle_socket(socket: WebSocket, state: WsState) {
    let connection_id = ConnectionId::new();
    let (sink, mut stream) = socket.split();

    let (out_tx, out_rx) = mpsc::channel(OUTBOUND_CHANNEL_BUFFER);
    let cancel_token = state.matchmaker.child_token();
    let writer = ConnectionWriter::new(connection_id, sink, out_rx, cancel_token.clone());
    let writer_task = tokio::spawn(writer.run());

    info!(
        target: "sb.ws",
        connection_id = %connection_id,
        "WebSocket accepted"
    );

    loop {
        tokio::select! {
            () = cancel_token.cancelled() => {
                debug!(
                    target: "sb.ws",
                    connection_id = %connection_id,
                    "Reader cancelled"
                );
                break;
            }

            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if let Err(e) = handle_frame(&state, connection_id, &out_tx, text).await {
                            reject(connection_id, &out_tx, &e);
                        }
                    }
                    Some(Ok(Message::Binary(_))) => {
                        // The protocol is text-only.
                        reject(
                            connection_id,
                            &out_tx,
                            &SbError::Protocol(chat_protocol::ProtocolError::UnknownFrameType),
                        );
                    }
                    Some(Ok(Message::Ping(_) | Message::Pong(_))) => {
                        // Pongs are handled by the websocket layer.
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        debug!(
                            target: "sb.ws",
                            connection_id = %connection_id,
                            "Client closed the socket"
                        );
                        break;
                    }
                    Some(Err(e)) => {
                        debug!(
                            target: "sb.ws",
                            connection_id = %connection_id,
                            error = %e,
                            "Socket read failed"
                        );
                        break;
                    }
                }
            }
        }
    }

    // The transport is gone: full teardown, then stop the writer. The
    // matchmaker call is idempotent, so a raced duplicate is harmless.
    state.matchmaker.connection_closed(connection_id).await;
    cancel_token.cancel();
    let _ = writer_task.await;

    info!(
        target: "sb.ws",
        connection_id = %connection_id,
        "WebSocket closed"
    );
}

/// Dispatch one inbound text frame.
async fn handle_frame(
    state: &WsState,
    connection_id: ConnectionId,
    out_tx: &mpsc::Sender<Outbound>,
    text: String,
) -> Result<(), SbError> {
    let frame_type = classify(&text)?;

    // Server-originated types (paired, partner-disconnected, error) are
    // not valid from a client.
    if !frame_type.is_client_initiated() {
        return Err(SbError::Protocol(
            chat_protocol::ProtocolError::UnknownFrameType,
        ));
    }

    match frame_type {
        FrameType::Join => {
            let join = parse_join(&text)?;
            state
                .matchmaker
                .join(connection_id, join.mode, join.interest, out_tx.clone())
                .await
                .map(|_| ())
        }
        FrameType::Find => {
            let find = parse_find(&text)?;
            state
                .matchmaker
                .find(connection_id, find.mode, find.interest)
                .await
                .map(|_| ())
        }
        FrameType::Disconnect => state.matchmaker.leave_pair(connection_id).await,
        // Everything else a client may send is a relay type.
        relay => {
            if relay == FrameType::File && text.len() > state.max_file_payload_bytes {
                return Err(SbError::PayloadTooLarge {
                    size: text.len(),
                    limit: state.max_file_payload_bytes,
                });
            }
            state.matchmaker.relay(connection_id, relay, text).await
        }
    }
}

/// Report a rejected frame back to its sender.
fn reject(connection_id: ConnectionId, out_tx: &mpsc::Sender<Outbound>, error: &SbError) {
    let code = error.error_code();
    obs::record_frame_rejected(code.as_str());
    warn!(
        target: "sb.ws",
        connection_id = %connection_id,
        error_code = code.as_str(),
        error = %error,
        "Frame rejected"
    );

    let frame = ServerFrame::Error {
        code,
        message: error.client_message(),
    };
    if out_tx.try_send(Outbound::Control(frame)).is_err() {
        debug!(
            target: "sb.ws",
            connection_id = %connection_id,
            "Error frame dropped, outbound mailbox unavailable"
        );
    }
}
