//! Match Controller
//!
//! Stateful WebSocket matchmaking and relay server for anonymous
//! one-on-one chat.
//!
//! # Servers
//!
//! The match controller runs two servers:
//! - WebSocket server for client traffic (default: 0.0.0.0:8080, `/ws`)
//! - HTTP server for health, status and metrics (default: 0.0.0.0:8081)
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment
//! 2. Initialize Prometheus metrics recorder
//! 3. Initialize actor system (`MatchmakerHandle`)
//! 4. Start the observability HTTP server (liveness, readiness, status,
//!    metrics)
//! 5. Start the WebSocket server
//! 6. Mark ready, wait for shutdown signal
//! 7. On SIGTERM/Ctrl+C: mark not ready, cancel the actor system, let
//!    writer tasks close their sockets

#![warn(clippy::pedantic)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use match_controller::actors::{ActorMetrics, MatchmakerHandle};
use match_controller::config::Config;
use match_controller::observability::{health_router, init_metrics_recorder, HealthState};
use match_controller::ws::{ws_router, WsState};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "match_controller=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Match Controller");

    // Load configuration
    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        anyhow::anyhow!(e)
    })?;

    info!(
        instance_id = %config.instance_id,
        bind_address = %config.bind_address,
        health_bind_address = %config.health_bind_address,
        max_file_payload_bytes = config.max_file_payload_bytes,
        auto_requeue = config.auto_requeue,
        "Configuration loaded successfully"
    );

    // Initialize Prometheus metrics recorder before any metrics are recorded
    let prometheus_handle = init_metrics_recorder().map_err(|e| {
        error!(error = %e, "Failed to install Prometheus metrics recorder");
        anyhow::anyhow!(e)
    })?;
    info!("Prometheus metrics recorder initialized");

    // Initialize health state
    let health_state = Arc::new(HealthState::new());

    // Initialize actor system
    let actor_metrics = ActorMetrics::new();
    let matchmaker = MatchmakerHandle::new(
        config.instance_id.clone(),
        Arc::clone(&actor_metrics),
        config.auto_requeue,
    );
    info!("Actor system initialized");

    // All server tasks shut down when the matchmaker's token is cancelled.
    let shutdown_token = matchmaker.child_token();

    // Start the observability HTTP server. Bind BEFORE spawning to fail
    // fast on bind errors.
    let health_addr: SocketAddr = config
        .health_bind_address
        .parse()
        .with_context(|| format!("Invalid health bind address {}", config.health_bind_address))?;

    let admin_app = health_router(
        Arc::clone(&health_state),
        matchmaker.clone(),
        prometheus_handle,
    );

    let health_listener = tokio::net::TcpListener::bind(health_addr)
        .await
        .with_context(|| format!("Failed to bind health server to {health_addr}"))?;
    info!(addr = %health_addr, "Health server bound successfully");

    let health_shutdown_token = shutdown_token.child_token();
    tokio::spawn(async move {
        let server = axum::serve(health_listener, admin_app).with_graceful_shutdown(async move {
            health_shutdown_token.cancelled().await;
            info!("Health server shutting down");
        });
        if let Err(e) = server.await {
            error!(error = %e, "Health server failed");
        }
    });
    info!(addr = %health_addr, "Health server started");

    // Start the WebSocket server.
    let ws_addr: SocketAddr = config
        .bind_address
        .parse()
        .with_context(|| format!("Invalid bind address {}", config.bind_address))?;

    let ws_app = ws_router(WsState::new(
        matchmaker.clone(),
        config.max_file_payload_bytes,
    ));

    let ws_listener = tokio::net::TcpListener::bind(ws_addr)
        .await
        .with_context(|| format!("Failed to bind WebSocket server to {ws_addr}"))?;
    info!(addr = %ws_addr, "WebSocket server bound successfully");

    let ws_shutdown_token = shutdown_token.child_token();
    tokio::spawn(async move {
        let server = axum::serve(ws_listener, ws_app).with_graceful_shutdown(async move {
            ws_shutdown_token.cancelled().await;
            info!("WebSocket server shutting down");
        });
        if let Err(e) = server.await {
            error!(error = %e, "WebSocket server failed");
        }
    });
    info!(addr = %ws_addr, "WebSocket server started");

    health_state.set_ready();

    // Wait for shutdown signal
    info!("Match Controller running - press Ctrl+C to shutdown");
    shutdown_signal().await;

    info!("Shutdown signal received, initiating graceful shutdown...");

    // Mark as not ready immediately so load balancers stop routing here
    health_state.set_not_ready();

    // Cancelling the root token drains the matchmaker, notifies paired
    // partners and closes every writer task's socket.
    matchmaker.cancel();

    // Give tasks time to flush close frames
    tokio::time::sleep(Duration::from_secs(2)).await;

    info!("Match Controller shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
///
/// # Panics
///
/// Panics if signal handlers cannot be installed. This is acceptable because
/// without signal handlers, we cannot gracefully shut down the service.
async fn shutdown_signal() {
    let ctrl_c = async {
        #[expect(
            clippy::expect_used,
            reason = "Signal handler installation is critical - panic is appropriate if it fails"
        )]
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        #[expect(
            clippy::expect_used,
            reason = "Signal handler installation is critical - panic is appropriate if it fails"
        )]
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
