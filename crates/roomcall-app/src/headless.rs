//! Device and transport stand-ins for a console participant with no media
//! engine. Media tracks are synthetic; the transport only hands out a peer
//! id so the room can be joined and signaling exercised.

use std::sync::Arc;

use async_trait::async_trait;
use roomcall_core::{
    CallMetadata, DeviceError, MediaConstraints, MediaDevices, MediaStream, MediaTrack, PeerCall,
    PeerTransport, TrackKind, TransportError, TransportEvent, VideoConstraint,
};
use tokio::sync::mpsc;
use tracing::{debug, info};

pub struct SyntheticDevices;

#[async_trait]
impl MediaDevices for SyntheticDevices {
    async fn get_user_media(
        &self,
        constraints: &MediaConstraints,
    ) -> Result<MediaStream, DeviceError> {
        let mut tracks = Vec::new();
        if constraints.audio {
            tracks.push(MediaTrack::new(TrackKind::Audio, "synthetic microphone"));
        }
        if constraints.video != VideoConstraint::Disabled {
            tracks.push(MediaTrack::new(TrackKind::Video, "synthetic camera"));
        }
        if tracks.is_empty() {
            return Err(DeviceError::NotFound("nothing requested".into()));
        }
        Ok(MediaStream::new(tracks))
    }

    async fn get_display_media(&self) -> Result<MediaStream, DeviceError> {
        Ok(MediaStream::new(vec![MediaTrack::new(
            TrackKind::Video,
            "synthetic display",
        )]))
    }
}

/// Registers under a random peer id and refuses every media call.
pub struct SignalOnlyTransport {
    event_tx: mpsc::UnboundedSender<TransportEvent>,
}

impl SignalOnlyTransport {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TransportEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        (Self { event_tx }, event_rx)
    }
}

#[async_trait]
impl PeerTransport for SignalOnlyTransport {
    async fn open(&self) -> Result<(), TransportError> {
        let local_id = uuid::Uuid::new_v4().to_string();
        info!(local_id = %local_id, "Signal-only transport opened");
        self.event_tx
            .send(TransportEvent::Opened { local_id })
            .map_err(|_| TransportError::Other("session stopped".into()))
    }

    fn dial(
        &self,
        peer_id: &str,
        _stream: &MediaStream,
        metadata: CallMetadata,
    ) -> Result<Arc<dyn PeerCall>, TransportError> {
        debug!(peer_id, screen = metadata.is_screen_share, "Refusing media dial");
        Err(TransportError::Other("no media engine".into()))
    }

    async fn shutdown(&self) {
        debug!("Signal-only transport shut down");
    }
}
