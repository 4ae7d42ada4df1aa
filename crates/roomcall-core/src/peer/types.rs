//! Peer connection types and the transport port.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use roomcall_common::CallId;
use serde::{Deserialize, Serialize};

use crate::media::{MediaStream, MediaTrack};

// ---------------------------------------------------------------------------
// Keys & state
// ---------------------------------------------------------------------------

/// Which media a connection carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    /// Camera and microphone, both directions.
    Primary,
    /// Our screen share, sent to a peer.
    Screen,
    /// A peer's screen share, received from them.
    RemoteScreen,
}

impl ChannelKind {
    pub fn is_screen(self) -> bool {
        matches!(self, Self::Screen | Self::RemoteScreen)
    }
}

/// Identifies one logical connection: at most one per (peer, kind).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionKey {
    pub peer_id: String,
    pub kind: ChannelKind,
}

impl ConnectionKey {
    pub fn new(peer_id: impl Into<String>, kind: ChannelKind) -> Self {
        Self {
            peer_id: peer_id.into(),
            kind,
        }
    }

    pub fn primary(peer_id: impl Into<String>) -> Self {
        Self::new(peer_id, ChannelKind::Primary)
    }
}

impl fmt::Display for ConnectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ChannelKind::Primary => write!(f, "{}", self.peer_id),
            ChannelKind::Screen => write!(f, "{}:screen-out", self.peer_id),
            ChannelKind::RemoteScreen => write!(f, "{}:screen-in", self.peer_id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Dialing,
    Connected,
    Closed,
}

/// Fencing token captured when a dial or answer is issued.
///
/// `epoch` advances on every leave; `generation` advances each time the
/// peer departs. Work carrying an old token is discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DialToken {
    pub epoch: u64,
    pub generation: u64,
}

/// Metadata attached to an outgoing call.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallMetadata {
    pub user_name: String,
    #[serde(default)]
    pub is_screen_share: bool,
}

// ---------------------------------------------------------------------------
// Transport port
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("transport not open")]
    NotOpen,

    #[error("peer unavailable: {0}")]
    PeerUnavailable(String),

    #[error("call already answered")]
    AlreadyAnswered,

    #[error("negotiation failed: {0}")]
    Negotiation(String),

    #[error("{0}")]
    Other(String),
}

/// One transport call: a single dial or inbound offer.
pub trait PeerCall: Send + Sync + fmt::Debug {
    fn id(&self) -> &CallId;

    fn peer_id(&self) -> &str;

    fn metadata(&self) -> &CallMetadata;

    /// Accept an inbound offer, optionally sending our media back.
    fn answer(&self, stream: Option<&MediaStream>) -> Result<(), TransportError>;

    /// Swap the outgoing track of the same kind without renegotiating.
    fn replace_track(&self, track: &MediaTrack) -> Result<(), TransportError>;

    fn close(&self);
}

/// Events raised by the transport, delivered in order.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// The local endpoint registered and was assigned an id.
    Opened { local_id: String },
    Incoming(Arc<dyn PeerCall>),
    Stream { call_id: CallId, stream: MediaStream },
    Closed { call_id: CallId },
    Failed { call_id: CallId, reason: String },
    /// Endpoint-level error not tied to one call.
    Error(String),
}

/// Peer-to-peer media transport (the P2P endpoint).
#[async_trait]
pub trait PeerTransport: Send + Sync {
    /// Register with the peer broker. Completion arrives as
    /// [`TransportEvent::Opened`].
    async fn open(&self) -> Result<(), TransportError>;

    fn dial(
        &self,
        peer_id: &str,
        stream: &MediaStream,
        metadata: CallMetadata,
    ) -> Result<Arc<dyn PeerCall>, TransportError>;

    async fn shutdown(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn screen_kinds() {
        assert!(!ChannelKind::Primary.is_screen());
        assert!(ChannelKind::Screen.is_screen());
        assert!(ChannelKind::RemoteScreen.is_screen());
    }

    #[test]
    fn keys_distinguish_kind() {
        let primary = ConnectionKey::primary("a");
        let screen = ConnectionKey::new("a", ChannelKind::Screen);
        assert_ne!(primary, screen);
        assert_eq!(primary.to_string(), "a");
        assert_eq!(screen.to_string(), "a:screen-out");
    }

    #[test]
    fn metadata_uses_camel_case() {
        let json = serde_json::to_string(&CallMetadata {
            user_name: "Ada".into(),
            is_screen_share: true,
        })
        .unwrap();
        assert_eq!(json, r#"{"userName":"Ada","isScreenShare":true}"#);

        let parsed: CallMetadata = serde_json::from_str(r#"{"userName":"Bob"}"#).unwrap();
        assert!(!parsed.is_screen_share);
    }
}
