//! Health and status endpoints.
//!
//! Provides Kubernetes-compatible probes plus an operator status surface:
//! - `GET /health` - Liveness probe (is the process running?)
//! - `GET /ready` - Readiness probe (can we serve traffic?)
//! - `GET /status` - JSON snapshot of matchmaker state
//! - `GET /metrics` - Prometheus text format, rendered by
//!   `metrics-exporter-prometheus`
//!
//! # Health State
//!
//! The `HealthState` tracks:
//! - `live`: Always true after startup (process is running)
//! - `ready`: True when the matchmaker is accepting connections; cleared
//!   when shutdown begins so load balancers stop routing new clients

use crate::actors::MatchmakerHandle;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Health state for the match controller.
///
/// Tracks liveness and readiness for Kubernetes probes.
#[derive(Debug)]
pub struct HealthState {
    /// Whether the service is live (process running).
    /// Always true after startup initialization.
    live: AtomicBool,
    /// Whether the service is ready to serve traffic.
    ready: AtomicBool,
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthState {
    /// Create a new health state (live=true, ready=false).
    #[must_use]
    pub fn new() -> Self {
        Self {
            live: AtomicBool::new(true),
            ready: AtomicBool::new(false),
        }
    }

    /// Mark the service as ready to serve traffic.
    pub fn set_ready(&self) {
        self.ready.store(true, Ordering::SeqCst);
    }

    /// Mark the service as not ready (e.g., during shutdown).
    pub fn set_not_ready(&self) {
        self.ready.store(false, Ordering::SeqCst);
    }

    /// Check if the service is live.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    /// Check if the service is ready.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}

/// Shared state for the observability router.
#[derive(Clone)]
struct AdminState {
    health: Arc<HealthState>,
    matchmaker: MatchmakerHandle,
    prometheus: PrometheusHandle,
}

/// JSON body served by `GET /status`.
#[derive(Debug, Serialize)]
struct StatusBody {
    connections: usize,
    waiting: usize,
    pairs: usize,
    draining: bool,
    mailbox_depth: usize,
}

/// Create the observability router.
///
/// # Endpoints
///
/// - `GET /health` - 200 if the process is running (liveness)
/// - `GET /ready` - 200 if ready to serve traffic, 503 otherwise
/// - `GET /status` - 200 with a JSON matchmaker snapshot
/// - `GET /metrics` - 200 with Prometheus text format
pub fn health_router(
    health: Arc<HealthState>,
    matchmaker: MatchmakerHandle,
    prometheus: PrometheusHandle,
) -> Router {
    Router::new()
        .route("/health", get(liveness_handler))
        .route("/ready", get(readiness_handler))
        .route("/status", get(status_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(AdminState {
            health,
            matchmaker,
            prometheus,
        })
}

/// Liveness probe handler.
///
/// Kubernetes uses this to determine if the pod should be restarted.
async fn liveness_handler(State(state): State<AdminState>) -> StatusCode {
    if state.health.is_live() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// Readiness probe handler.
///
/// Kubernetes uses this to determine if the pod should receive traffic.
async fn readiness_handler(State(state): State<AdminState>) -> StatusCode {
    if state.health.is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// Matchmaker status snapshot for operators.
async fn status_handler(
    State(state): State<AdminState>,
) -> Result<Json<StatusBody>, StatusCode> {
    let status = state
        .matchmaker
        .get_status()
        .await
        .map_err(|_| StatusCode::SERVICE_UNAVAILABLE)?;

    Ok(Json(StatusBody {
        connections: status.connection_count,
        waiting: status.waiting_count,
        pairs: status.pair_count,
        draining: status.is_draining,
        mailbox_depth: status.mailbox_depth,
    }))
}

/// Prometheus metrics in text exposition format.
async fn metrics_handler(State(state): State<AdminState>) -> String {
    state.prometheus.render()
}
