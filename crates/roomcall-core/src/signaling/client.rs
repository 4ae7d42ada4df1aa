//! Public handle for interacting with the signaling connection.

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::connection::{connection_loop, RoomJoin};
use super::protocol::OutboundSignal;
use super::types::{
    SignalEvent, SignalingChannel, SignalingCommand, SignalingConfig, SignalingConnector,
};

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Handle for interacting with the signaling connection.
///
/// All methods are non-blocking and send commands to the background
/// connection task. Frames sent while disconnected are queued and flushed
/// after the next successful join.
pub struct SignalingClient {
    command_tx: mpsc::Sender<SignalingCommand>,
}

impl SignalingClient {
    /// Create a new client for `room_id` and start the background connection.
    /// Returns `(client, event_receiver)`.
    pub fn connect(
        config: SignalingConfig,
        room_id: &str,
        display_name: &str,
    ) -> (Self, mpsc::Receiver<SignalEvent>) {
        let (event_tx, event_rx) = mpsc::channel(256);
        let (command_tx, command_rx) = mpsc::channel(64);
        let client = Self { command_tx };

        let room = RoomJoin {
            room_id: room_id.to_string(),
            display_name: display_name.to_string(),
            local_id: None,
        };
        tokio::spawn(connection_loop(config, room, event_tx, command_rx));

        (client, event_rx)
    }

    /// Announce the local peer id. The join frame is sent now if connected
    /// and again after every reconnect.
    pub async fn announce(&self, local_id: &str) {
        let _ = self
            .command_tx
            .send(SignalingCommand::Announce {
                local_id: local_id.to_string(),
            })
            .await;
    }

    pub async fn send(&self, signal: OutboundSignal) {
        let _ = self.command_tx.send(SignalingCommand::Send(signal)).await;
    }

    /// Close the connection and stop reconnecting.
    pub async fn disconnect(&self) {
        let _ = self.command_tx.send(SignalingCommand::Disconnect).await;
    }
}

#[async_trait]
impl SignalingChannel for SignalingClient {
    async fn announce(&self, local_id: &str) {
        SignalingClient::announce(self, local_id).await;
    }

    async fn send(&self, signal: OutboundSignal) {
        SignalingClient::send(self, signal).await;
    }

    async fn disconnect(&self) {
        SignalingClient::disconnect(self).await;
    }
}

// ---------------------------------------------------------------------------
// Connector
// ---------------------------------------------------------------------------

/// Opens [`SignalingClient`] sessions against one server.
#[derive(Debug, Clone)]
pub struct WsConnector {
    config: SignalingConfig,
}

impl WsConnector {
    pub fn new(config: SignalingConfig) -> Self {
        Self { config }
    }
}

impl SignalingConnector for WsConnector {
    fn connect(
        &self,
        room_id: &str,
        display_name: &str,
    ) -> (Box<dyn SignalingChannel>, mpsc::Receiver<SignalEvent>) {
        let (client, events) = SignalingClient::connect(self.config.clone(), room_id, display_name);
        (Box::new(client), events)
    }
}
