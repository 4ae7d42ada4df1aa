//! Peer media connections: the transport port and the per-(peer, kind)
//! connection manager.

mod manager;
mod types;

pub use manager::{CloseOutcome, DialOutcome, PeerConnectionManager, PublishedStream, StreamOutcome};
pub use types::{
    CallMetadata, ChannelKind, ConnectionKey, ConnectionState, DialToken, PeerCall, PeerTransport,
    TransportError, TransportEvent,
};
