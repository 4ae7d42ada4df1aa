//! In-memory doubles for the device, transport and signaling ports.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use roomcall_common::{new_call_id, CallId};
use tokio::sync::mpsc;

use crate::media::{
    DeviceError, MediaConstraints, MediaDevices, MediaStream, MediaTrack, TrackKind,
    VideoConstraint,
};
use crate::peer::{CallMetadata, PeerCall, PeerTransport, TransportError};
use crate::signaling::{OutboundSignal, SignalEvent, SignalingChannel, SignalingConnector};

pub fn camera_stream() -> MediaStream {
    MediaStream::new(vec![
        MediaTrack::new(TrackKind::Audio, "mic"),
        MediaTrack::new(TrackKind::Video, "cam"),
    ])
}

// ---------------------------------------------------------------------------
// Devices
// ---------------------------------------------------------------------------

/// Succeeds unless a result was scripted for the next request.
#[derive(Default)]
pub struct FakeDevices {
    user_media: Mutex<VecDeque<Result<(), DeviceError>>>,
    display_media: Mutex<VecDeque<Result<(), DeviceError>>>,
    requests: Mutex<Vec<MediaConstraints>>,
    displays: Mutex<Vec<MediaStream>>,
}

impl FakeDevices {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script_user_media(&self, results: Vec<Result<(), DeviceError>>) {
        self.user_media.lock().unwrap().extend(results);
    }

    pub fn script_display_media(&self, results: Vec<Result<(), DeviceError>>) {
        self.display_media.lock().unwrap().extend(results);
    }

    pub fn user_media_requests(&self) -> Vec<MediaConstraints> {
        self.requests.lock().unwrap().clone()
    }

    /// Every display stream handed out so far.
    pub fn display_streams(&self) -> Vec<MediaStream> {
        self.displays.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaDevices for FakeDevices {
    async fn get_user_media(
        &self,
        constraints: &MediaConstraints,
    ) -> Result<MediaStream, DeviceError> {
        self.requests.lock().unwrap().push(constraints.clone());
        if let Some(Err(e)) = self.user_media.lock().unwrap().pop_front() {
            return Err(e);
        }
        let mut tracks = vec![MediaTrack::new(TrackKind::Audio, "mic")];
        if constraints.video != VideoConstraint::Disabled {
            tracks.push(MediaTrack::new(TrackKind::Video, "cam"));
        }
        Ok(MediaStream::new(tracks))
    }

    async fn get_display_media(&self) -> Result<MediaStream, DeviceError> {
        if let Some(Err(e)) = self.display_media.lock().unwrap().pop_front() {
            return Err(e);
        }
        let stream = MediaStream::new(vec![MediaTrack::new(TrackKind::Video, "screen")]);
        self.displays.lock().unwrap().push(stream.clone());
        Ok(stream)
    }
}

// ---------------------------------------------------------------------------
// Peer transport
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct FakeCall {
    id: CallId,
    peer_id: String,
    metadata: CallMetadata,
    answers: Mutex<Vec<bool>>,
    replaced: Mutex<Vec<String>>,
    closed: AtomicBool,
}

impl FakeCall {
    pub fn outbound(peer_id: &str, metadata: CallMetadata) -> Arc<Self> {
        Arc::new(Self {
            id: new_call_id(),
            peer_id: peer_id.to_string(),
            metadata,
            answers: Mutex::new(Vec::new()),
            replaced: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        })
    }

    pub fn inbound(peer_id: &str, user_name: &str, is_screen_share: bool) -> Arc<Self> {
        Self::outbound(
            peer_id,
            CallMetadata {
                user_name: user_name.to_string(),
                is_screen_share,
            },
        )
    }

    pub fn answer_count(&self) -> usize {
        self.answers.lock().unwrap().len()
    }

    /// Whether the first answer carried media.
    pub fn answered_with_media(&self) -> Option<bool> {
        self.answers.lock().unwrap().first().copied()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn replaced_tracks(&self) -> Vec<String> {
        self.replaced.lock().unwrap().clone()
    }
}

impl PeerCall for FakeCall {
    fn id(&self) -> &CallId {
        &self.id
    }

    fn peer_id(&self) -> &str {
        &self.peer_id
    }

    fn metadata(&self) -> &CallMetadata {
        &self.metadata
    }

    fn answer(&self, stream: Option<&MediaStream>) -> Result<(), TransportError> {
        self.answers.lock().unwrap().push(stream.is_some());
        Ok(())
    }

    fn replace_track(&self, track: &MediaTrack) -> Result<(), TransportError> {
        self.replaced.lock().unwrap().push(track.id().to_string());
        Ok(())
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct FakeTransport {
    dials: Mutex<Vec<Arc<FakeCall>>>,
    failing: Mutex<HashSet<String>>,
    fail_open: AtomicBool,
    opens: AtomicUsize,
    shutdowns: AtomicUsize,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dials(&self) -> Vec<Arc<FakeCall>> {
        self.dials.lock().unwrap().clone()
    }

    /// Dials to `peer_id` on the given channel, in order.
    pub fn dials_for(&self, peer_id: &str, screen: bool) -> Vec<Arc<FakeCall>> {
        self.dials()
            .into_iter()
            .filter(|c| c.peer_id == peer_id && c.metadata.is_screen_share == screen)
            .collect()
    }

    pub fn fail_dials_to(&self, peer_id: &str) {
        self.failing.lock().unwrap().insert(peer_id.to_string());
    }

    pub fn fail_open(&self) {
        self.fail_open.store(true, Ordering::SeqCst);
    }

    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn shutdown_count(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PeerTransport for FakeTransport {
    async fn open(&self) -> Result<(), TransportError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if self.fail_open.load(Ordering::SeqCst) {
            return Err(TransportError::Other("broker offline".into()));
        }
        Ok(())
    }

    fn dial(
        &self,
        peer_id: &str,
        _stream: &MediaStream,
        metadata: CallMetadata,
    ) -> Result<Arc<dyn PeerCall>, TransportError> {
        if self.failing.lock().unwrap().contains(peer_id) {
            return Err(TransportError::PeerUnavailable(peer_id.to_string()));
        }
        let call = FakeCall::outbound(peer_id, metadata);
        self.dials.lock().unwrap().push(call.clone());
        Ok(call)
    }

    async fn shutdown(&self) {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// Signaling
// ---------------------------------------------------------------------------

/// Everything the session pushed through its signaling channels.
#[derive(Default)]
pub struct SignalLog {
    sent: Mutex<Vec<OutboundSignal>>,
    announced: Mutex<Vec<String>>,
    disconnects: AtomicUsize,
}

impl SignalLog {
    pub fn sent(&self) -> Vec<OutboundSignal> {
        self.sent.lock().unwrap().clone()
    }

    pub fn announced(&self) -> Vec<String> {
        self.announced.lock().unwrap().clone()
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }
}

pub struct FakeChannel {
    log: Arc<SignalLog>,
}

#[async_trait]
impl SignalingChannel for FakeChannel {
    async fn announce(&self, local_id: &str) {
        self.log.announced.lock().unwrap().push(local_id.to_string());
    }

    async fn send(&self, signal: OutboundSignal) {
        self.log.sent.lock().unwrap().push(signal);
    }

    async fn disconnect(&self) {
        self.log.disconnects.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct FakeConnector {
    pub log: Arc<SignalLog>,
    senders: Mutex<Vec<mpsc::Sender<SignalEvent>>>,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect_count(&self) -> usize {
        self.senders.lock().unwrap().len()
    }

    /// Feed an event into the most recent connection.
    pub fn push(&self, event: SignalEvent) {
        if let Some(tx) = self.senders.lock().unwrap().last() {
            let _ = tx.try_send(event);
        }
    }
}

impl SignalingConnector for FakeConnector {
    fn connect(
        &self,
        _room_id: &str,
        _display_name: &str,
    ) -> (Box<dyn SignalingChannel>, mpsc::Receiver<SignalEvent>) {
        let (tx, rx) = mpsc::channel(64);
        self.senders.lock().unwrap().push(tx);
        let channel = FakeChannel {
            log: Arc::clone(&self.log),
        };
        (Box::new(channel), rx)
    }
}
