//! Match controller configuration.
//!
//! Configuration is loaded from environment variables. Nothing in this
//! service is secret (connections are anonymous and state is memory-only),
//! so the struct derives `Debug` and is logged at startup.

use std::collections::HashMap;
use std::env;
use thiserror::Error;

/// Default WebSocket server bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Default health endpoint bind address.
pub const DEFAULT_HEALTH_BIND_ADDRESS: &str = "0.0.0.0:8081";

/// Default cap for a single relayed `file` frame (50 MiB).
pub const DEFAULT_MAX_FILE_PAYLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Default instance ID prefix.
pub const DEFAULT_INSTANCE_ID_PREFIX: &str = "sb";

/// Match controller configuration.
///
/// Loaded from environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// WebSocket server bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// Health endpoint bind address (default: "0.0.0.0:8081").
    pub health_bind_address: String,

    /// Unique identifier for this instance.
    pub instance_id: String,

    /// Maximum size of a single relayed `file` frame in bytes.
    pub max_file_payload_bytes: usize,

    /// Whether a surviving partner is automatically re-enqueued after its
    /// partner disconnects (default: false - it must send `find` itself).
    pub auto_requeue: bool,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration value for {var}: {reason}")]
    InvalidValue { var: String, reason: String },
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `InvalidValue` if a set variable fails to parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    ///
    /// # Errors
    ///
    /// Returns `InvalidValue` if a set variable fails to parse.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let bind_address = vars
            .get("SB_BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let health_bind_address = vars
            .get("SB_HEALTH_BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_HEALTH_BIND_ADDRESS.to_string());

        let max_file_payload_bytes = match vars.get("SB_MAX_FILE_PAYLOAD_BYTES") {
            Some(raw) => raw.parse().map_err(|e| ConfigError::InvalidValue {
                var: "SB_MAX_FILE_PAYLOAD_BYTES".to_string(),
                reason: format!("{e}"),
            })?,
            None => DEFAULT_MAX_FILE_PAYLOAD_BYTES,
        };

        let auto_requeue = match vars.get("SB_AUTO_REQUEUE") {
            Some(raw) => raw.parse().map_err(|e| ConfigError::InvalidValue {
                var: "SB_AUTO_REQUEUE".to_string(),
                reason: format!("{e}"),
            })?,
            None => false,
        };

        // Generate instance ID if not provided
        let instance_id = vars.get("SB_INSTANCE_ID").cloned().unwrap_or_else(|| {
            let hostname = std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string());
            let uuid_suffix = uuid::Uuid::new_v4().to_string();
            let short_suffix = uuid_suffix.get(..8).unwrap_or("00000000");
            format!("{DEFAULT_INSTANCE_ID_PREFIX}-{hostname}-{short_suffix}")
        });

        Ok(Config {
            bind_address,
            health_bind_address,
            instance_id,
            max_file_payload_bytes,
            auto_requeue,
        })
    }
}
