//! Signaling server connection settings.

use serde::{Deserialize, Serialize};

/// Rendezvous server and reconnection policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalingConfig {
    /// WebSocket URL of the signaling server.
    pub server_url: String,
    /// Room every participant joins.
    pub room_id: String,
    /// Seconds before a single connection attempt is abandoned (valid range: 1-120).
    pub connect_timeout_secs: u32,
    /// Seconds between keepalive pings while connected (valid range: 5-300).
    pub heartbeat_interval_secs: u32,
    /// Base reconnect delay in milliseconds.
    pub reconnect_delay_ms: u32,
    /// Reconnect delay ceiling in milliseconds.
    pub max_reconnect_delay_ms: u32,
    /// Consecutive failed attempts allowed before the first successful
    /// connection (valid range: 1-100).
    pub initial_connect_attempts: u32,
}

impl Default for SignalingConfig {
    fn default() -> Self {
        Self {
            server_url: "ws://127.0.0.1:3030/ws".into(),
            room_id: "main-room".into(),
            connect_timeout_secs: 15,
            heartbeat_interval_secs: 25,
            reconnect_delay_ms: 1_000,
            max_reconnect_delay_ms: 30_000,
            initial_connect_attempts: 8,
        }
    }
}
