//! Peer connection manager: one logical connection per (peer, kind).
//!
//! Both sides of a pair may dial each other at once. Every call for the
//! same key is kept as a leg of one record; whichever leg delivers a
//! stream first is published and later streams are ignored.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use roomcall_common::{CallError, CallId};
use tracing::{debug, info, warn};

use crate::media::{MediaStream, MediaTrack};

use super::types::{
    CallMetadata, ChannelKind, ConnectionKey, ConnectionState, DialToken, PeerCall, PeerTransport,
};

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct CallLeg {
    call: Arc<dyn PeerCall>,
    /// Whether our primary media flows on this leg (dialed by us, or an
    /// inbound primary call we answered with our stream).
    sends_primary: bool,
}

#[derive(Debug)]
struct ConnectionRecord {
    state: ConnectionState,
    display_name: String,
    token: DialToken,
    legs: Vec<CallLeg>,
    published_call: Option<CallId>,
}

impl ConnectionRecord {
    fn new(display_name: String, token: DialToken) -> Self {
        Self {
            state: ConnectionState::Dialing,
            display_name,
            token,
            legs: Vec::new(),
            published_call: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialOutcome {
    Dialing(CallId),
    /// A record for this key already exists; nothing was dialed.
    AlreadyActive,
}

/// A remote stream ready to be shown.
#[derive(Debug, Clone)]
pub struct PublishedStream {
    pub key: ConnectionKey,
    pub display_name: String,
    pub stream: MediaStream,
}

#[derive(Debug, Clone)]
pub enum StreamOutcome {
    Published(PublishedStream),
    /// Another leg already published for this key.
    Duplicate,
    /// Our own outgoing screen share; the peer never sends media back.
    AnswerOnly,
    /// The record's token no longer matches; the record was closed.
    Stale(ConnectionKey),
    /// No record knows this call.
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseOutcome {
    /// The record was removed. `was_published` tells whether a participant
    /// entry was showing for it.
    Removed {
        key: ConnectionKey,
        was_published: bool,
    },
    /// A redundant leg closed; the record is still alive.
    LegDropped,
    Unknown,
}

/// Most closed keys remembered for [`PeerConnectionManager::state`].
const MAX_TOMBSTONES: usize = 256;

/// Closed keys, oldest evicted first once the cap is reached.
#[derive(Debug, Default)]
struct Tombstones {
    keys: HashSet<ConnectionKey>,
    order: VecDeque<ConnectionKey>,
}

impl Tombstones {
    fn insert(&mut self, key: ConnectionKey) {
        if !self.keys.insert(key.clone()) {
            return;
        }
        self.order.push_back(key);
        while self.order.len() > MAX_TOMBSTONES {
            if let Some(oldest) = self.order.pop_front() {
                self.keys.remove(&oldest);
            }
        }
    }

    fn remove(&mut self, key: &ConnectionKey) {
        if self.keys.remove(key) {
            self.order.retain(|k| k != key);
        }
    }

    fn contains(&self, key: &ConnectionKey) -> bool {
        self.keys.contains(key)
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.keys.len()
    }

    fn clear(&mut self) {
        self.keys.clear();
        self.order.clear();
    }
}

// ---------------------------------------------------------------------------
// Manager
// ---------------------------------------------------------------------------

/// Tracks every live connection keyed by (peer, kind).
pub struct PeerConnectionManager {
    transport: Arc<dyn PeerTransport>,
    records: HashMap<ConnectionKey, ConnectionRecord>,
    calls: HashMap<CallId, ConnectionKey>,
    /// Keys whose record was closed and not reopened since.
    closed: Tombstones,
}

impl PeerConnectionManager {
    pub fn new(transport: Arc<dyn PeerTransport>) -> Self {
        Self {
            transport,
            records: HashMap::new(),
            calls: HashMap::new(),
            closed: Tombstones::default(),
        }
    }

    /// Dial `peer_id` unless a record for (peer, kind) already exists.
    ///
    /// A transport failure is logged and reported; no record is kept.
    pub fn connect_to(
        &mut self,
        peer_id: &str,
        peer_name: &str,
        stream: &MediaStream,
        kind: ChannelKind,
        local_name: &str,
        token: DialToken,
    ) -> Result<DialOutcome, CallError> {
        if kind == ChannelKind::RemoteScreen {
            return Err(CallError::InvalidState(
                "remote screen channels are answer-only".into(),
            ));
        }

        let key = ConnectionKey::new(peer_id, kind);
        if self.records.contains_key(&key) {
            debug!(%key, "Connection already active, skipping dial");
            return Ok(DialOutcome::AlreadyActive);
        }

        let metadata = CallMetadata {
            user_name: local_name.to_string(),
            is_screen_share: kind == ChannelKind::Screen,
        };
        let call = self
            .transport
            .dial(peer_id, stream, metadata)
            .map_err(|e| {
                warn!(%key, error = %e, "Peer dial failed");
                CallError::PeerDialFailure {
                    peer_id: peer_id.to_string(),
                    reason: e.to_string(),
                }
            })?;

        let call_id = call.id().clone();
        let mut record = ConnectionRecord::new(peer_name.to_string(), token);
        record.legs.push(CallLeg {
            call,
            sends_primary: kind == ChannelKind::Primary,
        });
        self.calls.insert(call_id.clone(), key.clone());
        self.closed.remove(&key);
        self.records.insert(key.clone(), record);

        info!(%key, call_id = %call_id, "Dialing peer");
        Ok(DialOutcome::Dialing(call_id))
    }

    /// Answer an inbound call exactly once and attach it to its record.
    ///
    /// Screen offers are answered without media. Primary offers are
    /// answered with `local_stream`.
    pub fn accept_inbound(
        &mut self,
        call: Arc<dyn PeerCall>,
        local_stream: &MediaStream,
        token: DialToken,
    ) -> Result<ConnectionKey, CallError> {
        let metadata = call.metadata().clone();
        let kind = if metadata.is_screen_share {
            ChannelKind::RemoteScreen
        } else {
            ChannelKind::Primary
        };
        let key = ConnectionKey::new(call.peer_id(), kind);

        if self.calls.contains_key(call.id()) {
            debug!(%key, call_id = %call.id(), "Inbound call already answered");
            return Ok(key);
        }

        let answer = if kind == ChannelKind::RemoteScreen {
            call.answer(None)
        } else {
            call.answer(Some(local_stream))
        };
        if let Err(e) = answer {
            warn!(%key, error = %e, "Failed to answer inbound call");
            call.close();
            return Err(CallError::PeerDialFailure {
                peer_id: key.peer_id.clone(),
                reason: e.to_string(),
            });
        }

        let call_id = call.id().clone();
        let display_name = if metadata.user_name.trim().is_empty() {
            "Participant".to_string()
        } else {
            metadata.user_name
        };
        let record = self
            .records
            .entry(key.clone())
            .or_insert_with(|| ConnectionRecord::new(display_name, token));
        record.legs.push(CallLeg {
            call,
            sends_primary: kind == ChannelKind::Primary,
        });
        self.calls.insert(call_id.clone(), key.clone());
        self.closed.remove(&key);

        info!(%key, call_id = %call_id, "Answered inbound call");
        Ok(key)
    }

    /// Handle a remote stream arriving on `call_id`.
    ///
    /// `current` yields the live token for a peer; a record whose token no
    /// longer matches is closed instead of published.
    pub fn on_stream(
        &mut self,
        call_id: &CallId,
        stream: MediaStream,
        current: impl Fn(&str) -> DialToken,
    ) -> StreamOutcome {
        let Some(key) = self.calls.get(call_id).cloned() else {
            debug!(call_id = %call_id, "Stream for unknown call, discarding");
            return StreamOutcome::Unknown;
        };
        let Some(record) = self.records.get_mut(&key) else {
            self.calls.remove(call_id);
            return StreamOutcome::Unknown;
        };

        if record.token != current(&key.peer_id) {
            info!(%key, call_id = %call_id, "Stream arrived for a departed peer, closing");
            self.close(&key);
            return StreamOutcome::Stale(key);
        }
        if key.kind == ChannelKind::Screen {
            debug!(%key, "Ignoring media on outgoing screen channel");
            return StreamOutcome::AnswerOnly;
        }
        if record.state == ConnectionState::Connected {
            debug!(%key, call_id = %call_id, "Duplicate stream ignored");
            return StreamOutcome::Duplicate;
        }

        record.state = ConnectionState::Connected;
        record.published_call = Some(call_id.clone());
        info!(%key, call_id = %call_id, "Remote stream published");
        StreamOutcome::Published(PublishedStream {
            key,
            display_name: record.display_name.clone(),
            stream,
        })
    }

    /// Handle the transport closing (or failing) one call.
    pub fn on_closed(&mut self, call_id: &CallId) -> CloseOutcome {
        let Some(key) = self.calls.remove(call_id) else {
            return CloseOutcome::Unknown;
        };
        let Some(record) = self.records.get_mut(&key) else {
            return CloseOutcome::Unknown;
        };

        record.legs.retain(|leg| leg.call.id() != call_id);
        let published = record.published_call.as_ref() == Some(call_id);
        if !published && !record.legs.is_empty() {
            debug!(%key, call_id = %call_id, "Redundant leg closed");
            return CloseOutcome::LegDropped;
        }

        let was_published = self.close(&key).unwrap_or(false);
        CloseOutcome::Removed { key, was_published }
    }

    /// Close every leg of `key`. Returns whether it had been published, or
    /// `None` if no record existed.
    pub fn close(&mut self, key: &ConnectionKey) -> Option<bool> {
        let record = self.records.remove(key)?;
        for leg in &record.legs {
            self.calls.remove(leg.call.id());
            leg.call.close();
        }
        self.closed.insert(key.clone());
        debug!(%key, legs = record.legs.len(), "Connection closed");
        Some(record.state == ConnectionState::Connected)
    }

    /// Close every connection with `peer_id`.
    pub fn close_peer(&mut self, peer_id: &str) -> Vec<(ConnectionKey, bool)> {
        let keys: Vec<ConnectionKey> = self
            .records
            .keys()
            .filter(|k| k.peer_id == peer_id)
            .cloned()
            .collect();
        self.close_keys(keys)
    }

    /// Close every connection of one kind.
    pub fn close_kind(&mut self, kind: ChannelKind) -> Vec<(ConnectionKey, bool)> {
        let keys: Vec<ConnectionKey> = self
            .records
            .keys()
            .filter(|k| k.kind == kind)
            .cloned()
            .collect();
        self.close_keys(keys)
    }

    pub fn close_all(&mut self) -> Vec<(ConnectionKey, bool)> {
        let keys: Vec<ConnectionKey> = self.records.keys().cloned().collect();
        self.close_keys(keys)
    }

    fn close_keys(&mut self, mut keys: Vec<ConnectionKey>) -> Vec<(ConnectionKey, bool)> {
        keys.sort();
        keys.into_iter()
            .filter_map(|key| self.close(&key).map(|published| (key, published)))
            .collect()
    }

    /// Swap `track` into every leg carrying our primary media.
    /// Returns the number of legs updated.
    pub fn replace_track(&self, track: &MediaTrack) -> usize {
        let mut updated = 0;
        for (key, record) in &self.records {
            for leg in record.legs.iter().filter(|leg| leg.sends_primary) {
                match leg.call.replace_track(track) {
                    Ok(()) => updated += 1,
                    Err(e) => warn!(%key, error = %e, "Failed to replace outgoing track"),
                }
            }
        }
        updated
    }

    pub fn state(&self, key: &ConnectionKey) -> ConnectionState {
        match self.records.get(key) {
            Some(record) => record.state,
            None if self.closed.contains(key) => ConnectionState::Closed,
            None => ConnectionState::Idle,
        }
    }

    pub fn is_active(&self, key: &ConnectionKey) -> bool {
        self.records.contains_key(key)
    }

    /// Number of legs (transport calls) held for `key`.
    pub fn leg_count(&self, key: &ConnectionKey) -> usize {
        self.records.get(key).map(|r| r.legs.len()).unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Forget closed-key tombstones.
    pub fn reset(&mut self) {
        self.closed.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{camera_stream, FakeCall, FakeTransport};

    fn token() -> DialToken {
        DialToken::default()
    }

    fn manager() -> (PeerConnectionManager, Arc<FakeTransport>) {
        let transport = Arc::new(FakeTransport::new());
        (PeerConnectionManager::new(transport.clone()), transport)
    }

    #[test]
    fn connect_to_is_idempotent() {
        let (mut mgr, transport) = manager();
        let stream = camera_stream();

        let first = mgr
            .connect_to("b", "Bob", &stream, ChannelKind::Primary, "Ada", token())
            .unwrap();
        let second = mgr
            .connect_to("b", "Bob", &stream, ChannelKind::Primary, "Ada", token())
            .unwrap();

        assert!(matches!(first, DialOutcome::Dialing(_)));
        assert_eq!(second, DialOutcome::AlreadyActive);
        assert_eq!(transport.dials().len(), 1);
        assert_eq!(
            mgr.state(&ConnectionKey::primary("b")),
            ConnectionState::Dialing
        );
    }

    #[test]
    fn screen_dial_is_separate_from_primary() {
        let (mut mgr, transport) = manager();
        let stream = camera_stream();
        mgr.connect_to("b", "Bob", &stream, ChannelKind::Primary, "Ada", token())
            .unwrap();
        mgr.connect_to("b", "Bob", &stream, ChannelKind::Screen, "Ada", token())
            .unwrap();

        let dials = transport.dials();
        assert_eq!(dials.len(), 2);
        assert!(dials[1].metadata().is_screen_share);
        assert_eq!(mgr.len(), 2);
    }

    #[test]
    fn failed_dial_keeps_no_record() {
        let (mut mgr, transport) = manager();
        transport.fail_dials_to("b");

        let err = mgr
            .connect_to("b", "Bob", &camera_stream(), ChannelKind::Primary, "Ada", token())
            .unwrap_err();

        assert!(matches!(err, CallError::PeerDialFailure { .. }));
        assert!(mgr.is_empty());
        assert_eq!(mgr.state(&ConnectionKey::primary("b")), ConnectionState::Idle);
    }

    #[test]
    fn remote_screen_cannot_be_dialed() {
        let (mut mgr, _) = manager();
        let err = mgr
            .connect_to("b", "Bob", &camera_stream(), ChannelKind::RemoteScreen, "Ada", token())
            .unwrap_err();
        assert!(matches!(err, CallError::InvalidState(_)));
    }

    #[test]
    fn glare_keeps_one_published_stream() {
        let (mut mgr, transport) = manager();
        let local = camera_stream();
        mgr.connect_to("b", "Bob", &local, ChannelKind::Primary, "Ada", token())
            .unwrap();
        let outbound = transport.dials()[0].clone();

        let inbound = FakeCall::inbound("b", "Bob", false);
        let key = mgr.accept_inbound(inbound.clone(), &local, token()).unwrap();
        assert_eq!(mgr.leg_count(&key), 2);
        assert_eq!(inbound.answer_count(), 1);

        let first = mgr.on_stream(inbound.id(), camera_stream(), |_| token());
        assert!(matches!(first, StreamOutcome::Published(_)));
        let second = mgr.on_stream(outbound.id(), camera_stream(), |_| token());
        assert!(matches!(second, StreamOutcome::Duplicate));

        // Closing the unpublished leg leaves the connection up.
        assert_eq!(mgr.on_closed(outbound.id()), CloseOutcome::LegDropped);
        assert_eq!(mgr.state(&key), ConnectionState::Connected);
    }

    #[test]
    fn inbound_screen_is_answered_without_media() {
        let (mut mgr, _) = manager();
        let call = FakeCall::inbound("b", "Bob", true);

        let key = mgr.accept_inbound(call.clone(), &camera_stream(), token()).unwrap();

        assert_eq!(key.kind, ChannelKind::RemoteScreen);
        assert_eq!(call.answered_with_media(), Some(false));
    }

    #[test]
    fn inbound_answered_once_on_redelivery() {
        let (mut mgr, _) = manager();
        let call = FakeCall::inbound("b", "Bob", false);
        mgr.accept_inbound(call.clone(), &camera_stream(), token()).unwrap();
        mgr.accept_inbound(call.clone(), &camera_stream(), token()).unwrap();
        assert_eq!(call.answer_count(), 1);
    }

    #[test]
    fn stale_stream_closes_record() {
        let (mut mgr, transport) = manager();
        mgr.connect_to("b", "Bob", &camera_stream(), ChannelKind::Primary, "Ada", token())
            .unwrap();
        let call = transport.dials()[0].clone();

        let newer = DialToken {
            epoch: 0,
            generation: 1,
        };
        let outcome = mgr.on_stream(call.id(), camera_stream(), |_| newer);

        assert!(matches!(outcome, StreamOutcome::Stale(_)));
        assert!(call.is_closed());
        assert_eq!(
            mgr.state(&ConnectionKey::primary("b")),
            ConnectionState::Closed
        );
    }

    #[test]
    fn outgoing_screen_never_publishes() {
        let (mut mgr, transport) = manager();
        mgr.connect_to("b", "Bob", &camera_stream(), ChannelKind::Screen, "Ada", token())
            .unwrap();
        let call = transport.dials()[0].clone();
        let outcome = mgr.on_stream(call.id(), camera_stream(), |_| token());
        assert!(matches!(outcome, StreamOutcome::AnswerOnly));
    }

    #[test]
    fn close_peer_closes_every_kind() {
        let (mut mgr, transport) = manager();
        let stream = camera_stream();
        mgr.connect_to("b", "Bob", &stream, ChannelKind::Primary, "Ada", token())
            .unwrap();
        mgr.connect_to("b", "Bob", &stream, ChannelKind::Screen, "Ada", token())
            .unwrap();
        mgr.connect_to("c", "Cy", &stream, ChannelKind::Primary, "Ada", token())
            .unwrap();

        let closed = mgr.close_peer("b");

        assert_eq!(closed.len(), 2);
        assert!(transport.dials()[..2].iter().all(|c| c.is_closed()));
        assert!(mgr.is_active(&ConnectionKey::primary("c")));
    }

    #[test]
    fn closed_tombstones_are_capped() {
        let (mut mgr, _transport) = manager();
        let stream = camera_stream();
        let total = MAX_TOMBSTONES + 10;
        for i in 0..total {
            let peer = format!("p{i}");
            mgr.connect_to(&peer, "Peer", &stream, ChannelKind::Primary, "Ada", token())
                .unwrap();
            mgr.close_peer(&peer);
        }

        assert_eq!(mgr.closed.len(), MAX_TOMBSTONES);
        assert_eq!(
            mgr.state(&ConnectionKey::primary("p0")),
            ConnectionState::Idle
        );
        let newest = format!("p{}", total - 1);
        assert_eq!(
            mgr.state(&ConnectionKey::primary(&newest)),
            ConnectionState::Closed
        );
    }

    #[test]
    fn redial_clears_tombstone() {
        let (mut mgr, _transport) = manager();
        let stream = camera_stream();
        let key = ConnectionKey::primary("b");
        mgr.connect_to("b", "Bob", &stream, ChannelKind::Primary, "Ada", token())
            .unwrap();
        mgr.close_peer("b");
        assert_eq!(mgr.state(&key), ConnectionState::Closed);

        mgr.connect_to("b", "Bob", &stream, ChannelKind::Primary, "Ada", token())
            .unwrap();
        assert_ne!(mgr.state(&key), ConnectionState::Closed);
        assert_eq!(mgr.closed.len(), 0);
    }

    #[test]
    fn replace_track_reaches_primary_senders_only() {
        let (mut mgr, transport) = manager();
        let stream = camera_stream();
        mgr.connect_to("b", "Bob", &stream, ChannelKind::Primary, "Ada", token())
            .unwrap();
        mgr.connect_to("b", "Bob", &stream, ChannelKind::Screen, "Ada", token())
            .unwrap();
        let inbound_screen = FakeCall::inbound("c", "Cy", true);
        mgr.accept_inbound(inbound_screen.clone(), &stream, token())
            .unwrap();

        let track = MediaTrack::new(crate::media::TrackKind::Video, "new cam");
        assert_eq!(mgr.replace_track(&track), 1);
        assert_eq!(transport.dials()[0].replaced_tracks(), vec![track.id().to_string()]);
        assert!(transport.dials()[1].replaced_tracks().is_empty());
    }

    #[test]
    fn unknown_call_events_are_ignored() {
        let (mut mgr, _) = manager();
        let stray = CallId::from_string("stray");
        assert!(matches!(
            mgr.on_stream(&stray, camera_stream(), |_| token()),
            StreamOutcome::Unknown
        ));
        assert_eq!(mgr.on_closed(&stray), CloseOutcome::Unknown);
    }
}
