//! Configuration, events, and the signaling ports.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::protocol::{InboundSignal, OutboundSignal};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SignalingConfig {
    /// WebSocket endpoint, e.g. `ws://127.0.0.1:3030/ws`.
    pub server_url: String,
    pub connect_timeout: Duration,
    pub heartbeat_interval: Duration,
    /// Base delay before the first reconnect attempt.
    pub reconnect_delay: Duration,
    pub max_reconnect_delay: Duration,
    /// Consecutive failures tolerated before the first successful
    /// connection. Once connected, reconnects are unbounded.
    pub initial_connect_attempts: u32,
}

impl Default for SignalingConfig {
    fn default() -> Self {
        Self {
            server_url: "ws://127.0.0.1:3030/ws".to_string(),
            connect_timeout: Duration::from_secs(15),
            heartbeat_interval: Duration::from_secs(25),
            reconnect_delay: Duration::from_secs(1),
            max_reconnect_delay: Duration::from_secs(30),
            initial_connect_attempts: 8,
        }
    }
}

impl SignalingConfig {
    /// Un-jittered delay before reconnect attempt `failures` (1-based).
    pub(crate) fn backoff(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1).min(16);
        self.reconnect_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_reconnect_delay)
    }
}

// ---------------------------------------------------------------------------
// Events & commands
// ---------------------------------------------------------------------------

/// Events emitted by the signaling connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalEvent {
    Connected,
    Disconnected,
    Reconnecting { attempt: u32, delay: Duration },
    /// The initial connection budget was exhausted. No further attempts.
    Unreachable { attempts: u32 },
    Message(InboundSignal),
}

/// Commands sent from the client handle to the connection task.
#[derive(Debug)]
pub(crate) enum SignalingCommand {
    Announce { local_id: String },
    Send(OutboundSignal),
    Disconnect,
}

// ---------------------------------------------------------------------------
// Ports
// ---------------------------------------------------------------------------

/// An open signaling session for one room.
#[async_trait]
pub trait SignalingChannel: Send + Sync {
    /// Announce the local peer id. Re-sent after every reconnect.
    async fn announce(&self, local_id: &str);

    async fn send(&self, signal: OutboundSignal);

    async fn disconnect(&self);
}

/// Opens signaling sessions.
pub trait SignalingConnector: Send + Sync {
    fn connect(
        &self,
        room_id: &str,
        display_name: &str,
    ) -> (Box<dyn SignalingChannel>, mpsc::Receiver<SignalEvent>);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_from_base() {
        let config = SignalingConfig::default();
        assert_eq!(config.backoff(1), Duration::from_secs(1));
        assert_eq!(config.backoff(2), Duration::from_secs(2));
        assert_eq!(config.backoff(3), Duration::from_secs(4));
        assert_eq!(config.backoff(5), Duration::from_secs(16));
    }

    #[test]
    fn backoff_is_capped() {
        let config = SignalingConfig::default();
        assert_eq!(config.backoff(6), Duration::from_secs(30));
        assert_eq!(config.backoff(40), Duration::from_secs(30));
    }

    #[test]
    fn backoff_treats_zero_as_first_attempt() {
        let config = SignalingConfig::default();
        assert_eq!(config.backoff(0), config.reconnect_delay);
    }
}
