//! End-to-end pairing flow over real WebSocket connections.
//!
//! Spins up the WebSocket server on an ephemeral port and drives it with
//! tokio-tungstenite clients through the full lifecycle: join, find,
//! pairing, opaque relay, voluntary disconnect and re-matching.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use match_controller::actors::{ActorMetrics, MatchmakerHandle};
use match_controller::ws::{ws_router, WsState};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================================
// Test Harness
// ============================================================================

/// Start the WebSocket server on an ephemeral port.
async fn spawn_server(max_file_payload_bytes: usize) -> (SocketAddr, MatchmakerHandle) {
    let matchmaker = MatchmakerHandle::new(
        "test-instance".to_string(),
        ActorMetrics::new(),
        false,
    );
    let app = ws_router(WsState::new(matchmaker.clone(), max_file_payload_bytes));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, matchmaker)
}

async fn connect(addr: SocketAddr) -> WsClient {
    let (client, _response) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws"))
        .await
        .expect("WebSocket handshake failed");
    client
}

async fn send(client: &mut WsClient, text: &str) {
    client.send(Message::Text(text.to_string())).await.unwrap();
}

/// Receive the next text frame as parsed JSON.
async fn recv_json(client: &mut WsClient) -> Value {
    loop {
        let msg = tokio::time::timeout(RECV_TIMEOUT, client.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("stream ended")
            .expect("read failed");
        match msg {
            Message::Text(text) => return serde_json::from_str(&text).unwrap(),
            Message::Ping(_) | Message::Pong(_) => {}
            other => panic!("unexpected non-text frame: {other:?}"),
        }
    }
}

/// Assert no frame arrives within a short window.
async fn assert_silent(client: &mut WsClient) {
    let result = tokio::time::timeout(Duration::from_millis(200), client.next()).await;
    assert!(result.is_err(), "expected silence, got {result:?}");
}

/// Send a join frame, which registers the client and enters matchmaking.
async fn join(client: &mut WsClient, mode: &str, interest: &str) {
    send(
        client,
        &format!(r#"{{"type":"join","mode":"{mode}","interest":"{interest}"}}"#),
    )
    .await;
}

// ============================================================================
// Pairing Lifecycle
// ============================================================================

#[tokio::test]
async fn test_two_clients_pair_and_exchange_messages() {
    let (addr, _matchmaker) = spawn_server(1024 * 1024).await;

    let mut alice = connect(addr).await;
    let mut bob = connect(addr).await;

    join(&mut alice, "text", "").await;
    assert_silent(&mut alice).await;

    join(&mut bob, "text", "").await;

    let paired_a = recv_json(&mut alice).await;
    let paired_b = recv_json(&mut bob).await;
    assert_eq!(paired_a["type"], "paired");
    assert_eq!(paired_b["type"], "paired");
    assert_eq!(paired_a["mode"], "text");
    // Each side is told the other's id, never its own.
    assert_ne!(paired_a["partner"], paired_b["partner"]);

    // Relay is verbatim: unknown fields and payloads pass through intact.
    let chat = r#"{"type":"message","text":"hi bob","client_ts":1725000000}"#;
    send(&mut alice, chat).await;
    let relayed = recv_json(&mut bob).await;
    assert_eq!(relayed["type"], "message");
    assert_eq!(relayed["text"], "hi bob");
    assert_eq!(relayed["client_ts"], 1_725_000_000);

    // And in the other direction.
    send(&mut bob, r#"{"type":"typing","active":true}"#).await;
    let relayed = recv_json(&mut alice).await;
    assert_eq!(relayed["type"], "typing");
    assert_eq!(relayed["active"], true);
}

#[tokio::test]
async fn test_interest_tags_steer_matching() {
    let (addr, _matchmaker) = spawn_server(1024).await;

    let mut chess = connect(addr).await;
    let mut poker = connect(addr).await;
    let mut arrival = connect(addr).await;

    join(&mut chess, "text", "chess").await;
    join(&mut poker, "text", "poker").await;
    assert_silent(&mut chess).await;

    // A "chess" arrival skips the incompatible "poker" waiter.
    join(&mut arrival, "text", "chess").await;
    let paired = recv_json(&mut chess).await;
    assert_eq!(paired["type"], "paired");
    recv_json(&mut arrival).await;

    // The poker client keeps waiting.
    assert_silent(&mut poker).await;
}

#[tokio::test]
async fn test_disconnect_notifies_partner_and_allows_rematch() {
    let (addr, _matchmaker) = spawn_server(1024).await;

    let mut alice = connect(addr).await;
    let mut bob = connect(addr).await;
    join(&mut alice, "text", "").await;
    join(&mut bob, "text", "").await;
    recv_json(&mut alice).await;
    recv_json(&mut bob).await;

    // Alice leaves voluntarily; she stays connected.
    send(&mut alice, r#"{"type":"disconnect"}"#).await;
    let notice = recv_json(&mut bob).await;
    assert_eq!(notice["type"], "partner-disconnected");

    // A duplicate disconnect changes nothing for bob.
    send(&mut alice, r#"{"type":"disconnect"}"#).await;
    assert_silent(&mut bob).await;

    // Both can find again and end up re-paired with each other.
    send(&mut bob, r#"{"type":"find"}"#).await;
    send(&mut alice, r#"{"type":"find"}"#).await;
    assert_eq!(recv_json(&mut alice).await["type"], "paired");
    assert_eq!(recv_json(&mut bob).await["type"], "paired");
}

#[tokio::test]
async fn test_socket_close_notifies_partner() {
    let (addr, matchmaker) = spawn_server(1024).await;

    let mut alice = connect(addr).await;
    let mut bob = connect(addr).await;
    join(&mut alice, "video", "").await;
    join(&mut bob, "video", "").await;
    recv_json(&mut alice).await;
    recv_json(&mut bob).await;

    drop(alice);

    let notice = recv_json(&mut bob).await;
    assert_eq!(notice["type"], "partner-disconnected");

    // The departed connection is fully removed from the registry.
    let deadline = tokio::time::Instant::now() + RECV_TIMEOUT;
    loop {
        let status = matchmaker.get_status().await.unwrap();
        if status.connection_count == 1 && status.pair_count == 0 {
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "teardown never completed: {status:?}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

// ============================================================================
// Error Frames
// ============================================================================

#[tokio::test]
async fn test_malformed_frames_yield_error_frames() {
    let (addr, _matchmaker) = spawn_server(1024).await;
    let mut client = connect(addr).await;

    send(&mut client, "this is not json").await;
    let error = recv_json(&mut client).await;
    assert_eq!(error["type"], "error");
    assert_eq!(error["code"], "unknown-frame-type");

    send(&mut client, r#"{"type":"join","mode":"smoke-signals"}"#).await;
    let error = recv_json(&mut client).await;
    assert_eq!(error["type"], "error");
    assert_eq!(error["code"], "unknown-frame-type");

    // The connection survives rejected frames.
    send(&mut client, r#"{"type":"join","mode":"text"}"#).await;
    assert_silent(&mut client).await;
}

#[tokio::test]
async fn test_oversized_file_frame_rejected() {
    let (addr, _matchmaker) = spawn_server(256).await;

    let mut alice = connect(addr).await;
    let mut bob = connect(addr).await;
    join(&mut alice, "text", "").await;
    join(&mut bob, "text", "").await;
    recv_json(&mut alice).await;
    recv_json(&mut bob).await;

    let oversized = format!(r#"{{"type":"file","name":"big.bin","data":"{}"}}"#, "A".repeat(512));
    send(&mut alice, &oversized).await;

    let error = recv_json(&mut alice).await;
    assert_eq!(error["type"], "error");
    assert_eq!(error["code"], "payload-too-large");

    // Nothing reached the partner.
    assert_silent(&mut bob).await;

    // A small file frame goes through.
    send(&mut alice, r#"{"type":"file","name":"tiny.txt","data":"aGk="}"#).await;
    let relayed = recv_json(&mut bob).await;
    assert_eq!(relayed["type"], "file");
    assert_eq!(relayed["data"], "aGk=");
}

#[tokio::test]
async fn test_relay_without_partner_is_silently_dropped() {
    let (addr, _matchmaker) = spawn_server(1024).await;
    let mut client = connect(addr).await;

    // Joined but unpaired: the frame may have raced a disconnect, so the
    // server drops it without an error frame.
    send(&mut client, r#"{"type":"join","mode":"text"}"#).await;
    send(&mut client, r#"{"type":"message","text":"anyone?"}"#).await;
    assert_silent(&mut client).await;
}

#[tokio::test]
async fn test_find_before_join_is_rejected() {
    let (addr, _matchmaker) = spawn_server(1024).await;
    let mut client = connect(addr).await;

    send(&mut client, r#"{"type":"find"}"#).await;
    let error = recv_json(&mut client).await;
    assert_eq!(error["type"], "error");
    assert_eq!(error["code"], "not-found");
}

// ============================================================================
// Shutdown
// ============================================================================

#[tokio::test]
async fn test_cancellation_closes_clients() {
    let (addr, matchmaker) = spawn_server(1024).await;

    let mut alice = connect(addr).await;
    let mut bob = connect(addr).await;
    join(&mut alice, "text", "").await;
    join(&mut bob, "text", "").await;
    recv_json(&mut alice).await;
    recv_json(&mut bob).await;

    matchmaker.cancel();

    // Each client sees the shutdown as a stream of partner-disconnected
    // and/or close; eventually the stream ends.
    let deadline = tokio::time::Instant::now() + RECV_TIMEOUT;
    for client in [&mut alice, &mut bob] {
        loop {
            assert!(tokio::time::Instant::now() < deadline, "client never closed");
            match tokio::time::timeout(RECV_TIMEOUT, client.next()).await.unwrap() {
                None | Some(Ok(Message::Close(_))) | Some(Err(_)) => break,
                Some(Ok(_)) => {}
            }
        }
    }
}
