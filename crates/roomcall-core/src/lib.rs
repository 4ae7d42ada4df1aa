pub mod chat;
pub mod media;
pub mod peer;
pub mod screen_share;
pub mod session;
pub mod signaling;

#[cfg(test)]
mod testing;

pub use chat::{ChatLog, ChatMessage, MessageKind, MessageOrigin};
pub use media::{
    AcquiredMedia, AcquirerConfig, DeviceError, MediaAcquirer, MediaConstraints, MediaDevices,
    MediaStream, MediaTrack, TrackKind, VideoConstraint,
};
pub use peer::{
    CallMetadata, ChannelKind, ConnectionKey, ConnectionState, PeerCall, PeerConnectionManager,
    PeerTransport, TransportError, TransportEvent,
};
pub use screen_share::ScreenShareController;
pub use session::{
    CallCommand, CallEvent, CallHandle, Collaborators, LocalSession, RemoteParticipant, RoomState,
    SessionConfig, SessionOrchestrator,
};
pub use signaling::{
    InboundSignal, OutboundSignal, RosterEntry, SignalEvent, SignalingChannel, SignalingClient,
    SignalingConfig, SignalingConnector, Theme, WsConnector,
};
