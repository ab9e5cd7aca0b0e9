//! Metrics definitions for the match controller.
//!
//! All metrics follow Prometheus naming conventions:
//! - `sb_` prefix for Switchboard
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded to prevent cardinality explosion:
//! - `actor_type`: 2 values (matchmaker, connection)
//! - `mode`: 2 values (text, video)
//! - `frame_type`: bounded by the wire protocol (~12 values)
//! - `error_code`: bounded by the error catalog (~7 values)

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize Prometheus metrics recorder and return the handle
/// for serving metrics via HTTP.
///
/// Must be called before any metrics are recorded. Match-wait buckets
/// span the expected range from instant matches to minutes of queueing.
///
/// # Errors
///
/// Returns error if the Prometheus recorder fails to install (e.g.,
/// already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("sb_match_wait".to_string()),
            &[
                0.010, 0.050, 0.100, 0.500, 1.000, 5.000, 15.000, 60.000, 300.000,
            ],
        )
        .map_err(|e| format!("Failed to set match wait buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus metrics recorder: {e}"))
}

// ============================================================================
// Connection & Pairing Metrics
// ============================================================================

/// Set the number of registered WebSocket connections.
///
/// Metric: `sb_connections_active`
/// Labels: none
pub fn set_connections_active(count: usize) {
    // usize to f64 conversion is safe for realistic connection counts (< 2^53)
    #[allow(clippy::cast_precision_loss)]
    gauge!("sb_connections_active").set(count as f64);
}

/// Set the number of connections waiting in a mode's queue.
///
/// Metric: `sb_waiting_active`
/// Labels: `mode` (text, video)
pub fn set_waiting_active(mode: &str, count: usize) {
    #[allow(clippy::cast_precision_loss)]
    gauge!("sb_waiting_active", "mode" => mode.to_string()).set(count as f64);
}

/// Set the number of active pairs.
///
/// Metric: `sb_pairs_active`
/// Labels: none
pub fn set_pairs_active(count: usize) {
    #[allow(clippy::cast_precision_loss)]
    gauge!("sb_pairs_active").set(count as f64);
}

/// Record a pair being formed.
///
/// Metric: `sb_pairs_formed_total`
/// Labels: `mode` (text, video)
pub fn record_pair_formed(mode: &str) {
    counter!("sb_pairs_formed_total", "mode" => mode.to_string()).increment(1);
}

/// Record how long the matched candidate waited in the queue.
///
/// Metric: `sb_match_wait_seconds`
/// Labels: `mode` (text, video)
pub fn record_match_wait(mode: &str, waited: Duration) {
    histogram!("sb_match_wait_seconds", "mode" => mode.to_string()).record(waited.as_secs_f64());
}

// ============================================================================
// Relay Metrics
// ============================================================================

/// Record a frame relayed to a partner.
///
/// Metric: `sb_frames_relayed_total`
/// Labels: `frame_type` (message, typing, file, offer, answer, ice-candidate)
pub fn record_frame_relayed(frame_type: &str) {
    counter!("sb_frames_relayed_total", "frame_type" => frame_type.to_string()).increment(1);
}

/// Record relayed payload bytes.
///
/// Metric: `sb_relay_bytes_total`
/// Labels: `frame_type`
pub fn record_relay_bytes(frame_type: &str, bytes: usize) {
    counter!("sb_relay_bytes_total", "frame_type" => frame_type.to_string())
        .increment(bytes as u64);
}

/// Record a rejected inbound frame.
///
/// Metric: `sb_frames_rejected_total`
/// Labels: `error_code`
pub fn record_frame_rejected(error_code: &str) {
    counter!("sb_frames_rejected_total", "error_code" => error_code.to_string()).increment(1);
}

// ============================================================================
// Actor Mailbox Metrics
// ============================================================================

/// Set the mailbox depth for an actor type.
///
/// Metric: `sb_actor_mailbox_depth`
/// Labels: `actor_type` (matchmaker, connection)
///
/// Used for backpressure monitoring. High values indicate the actor is
/// falling behind in message processing.
pub fn set_actor_mailbox_depth(actor_type: &str, depth: usize) {
    #[allow(clippy::cast_precision_loss)]
    gauge!("sb_actor_mailbox_depth", "actor_type" => actor_type.to_string()).set(depth as f64);
}

/// Record messages dropped due to backpressure.
///
/// Metric: `sb_messages_dropped_total`
/// Labels: `actor_type`
///
/// Non-zero values indicate a slow client or an overloaded matchmaker.
pub fn record_message_dropped(actor_type: &str) {
    counter!("sb_messages_dropped_total", "actor_type" => actor_type.to_string()).increment(1);
}
