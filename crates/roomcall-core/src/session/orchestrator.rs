//! Session orchestrator — room lifecycle, signaling reactions and call actions.
//!
//! Owned by a single task. Every mutation goes through `&mut self`; slow
//! work (display capture, media re-acquire) is spawned and reports back on
//! an internal channel, tagged with the session epoch it was started in.

use std::sync::Arc;

use roomcall_common::{CallError, CallId, Notification};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::chat::{ChatLog, ChatMessage, MessageOrigin};
use crate::media::{
    AcquiredMedia, DeviceError, MediaAcquirer, MediaDevices, MediaStream, TrackKind,
};
use crate::peer::{
    ChannelKind, CloseOutcome, ConnectionKey, DialToken, PeerConnectionManager, PeerTransport,
    StreamOutcome, TransportEvent,
};
use crate::screen_share::{ScreenShareController, ShareContext};
use crate::signaling::{
    InboundSignal, OutboundSignal, RosterEntry, SignalEvent, SignalingChannel,
    SignalingConnector, Theme,
};

use super::types::{
    CallCommand, CallEvent, EventSink, Generations, LocalSession, Participants, RemoteParticipant,
    RoomState, Roster, SessionConfig, UNKNOWN_PARTICIPANT,
};

/// External ports the orchestrator drives.
pub struct Collaborators {
    pub devices: Arc<dyn MediaDevices>,
    pub transport: Arc<dyn PeerTransport>,
    pub transport_events: mpsc::UnboundedReceiver<TransportEvent>,
    pub signaling: Arc<dyn SignalingConnector>,
}

#[derive(Debug)]
struct PendingDial {
    peer_id: String,
    due: Instant,
    token: DialToken,
}

/// Results of spawned work.
#[derive(Debug)]
enum Deferred {
    ScreenCaptured {
        epoch: u64,
        share_id: u64,
        result: Result<MediaStream, DeviceError>,
    },
    ScreenEnded {
        epoch: u64,
        share_id: u64,
    },
    MediaRefreshed {
        epoch: u64,
        result: Result<AcquiredMedia, CallError>,
    },
}

/// Builds a [`ShareContext`] from disjoint field borrows of the orchestrator.
macro_rules! share_context {
    ($self:ident, $session:expr) => {
        ShareContext {
            session: $session,
            roster: &$self.roster,
            peers: &mut $self.peers,
            participants: &mut $self.participants,
            generations: &$self.generations,
            signaling: $self.signaling.as_deref(),
            events: &$self.event_tx,
        }
    };
}

// ---------------------------------------------------------------------------
// Session Orchestrator
// ---------------------------------------------------------------------------

pub struct SessionOrchestrator {
    config: SessionConfig,
    acquirer: MediaAcquirer,
    devices: Arc<dyn MediaDevices>,
    transport: Arc<dyn PeerTransport>,
    transport_rx: mpsc::UnboundedReceiver<TransportEvent>,
    connector: Arc<dyn SignalingConnector>,
    signaling: Option<Box<dyn SignalingChannel>>,
    signal_rx: Option<mpsc::Receiver<SignalEvent>>,

    state: RoomState,
    theme: Theme,
    prepared: Option<AcquiredMedia>,
    session: Option<LocalSession>,
    roster: Roster,
    participants: Participants,
    peers: PeerConnectionManager,
    screen: ScreenShareController,
    chat: ChatLog,
    pending_dials: Vec<PendingDial>,
    generations: Generations,

    deferred_tx: mpsc::UnboundedSender<Deferred>,
    deferred_rx: mpsc::UnboundedReceiver<Deferred>,
    event_tx: EventSink,
}

impl SessionOrchestrator {
    pub fn new(
        config: SessionConfig,
        parts: Collaborators,
    ) -> (Self, mpsc::UnboundedReceiver<CallEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (deferred_tx, deferred_rx) = mpsc::unbounded_channel();
        let orchestrator = Self {
            acquirer: MediaAcquirer::new(Arc::clone(&parts.devices), config.media.clone()),
            chat: ChatLog::new(config.chat_history_limit),
            peers: PeerConnectionManager::new(Arc::clone(&parts.transport)),
            config,
            devices: parts.devices,
            transport: parts.transport,
            transport_rx: parts.transport_events,
            connector: parts.signaling,
            signaling: None,
            signal_rx: None,
            state: RoomState::Idle,
            theme: Theme::default(),
            prepared: None,
            session: None,
            roster: Roster::default(),
            participants: Participants::default(),
            screen: ScreenShareController::new(),
            pending_dials: Vec::new(),
            generations: Generations::default(),
            deferred_tx,
            deferred_rx,
            event_tx,
        };
        (orchestrator, event_rx)
    }

    // -- accessors ----------------------------------------------------------

    pub fn state(&self) -> RoomState {
        self.state
    }

    pub fn session(&self) -> Option<&LocalSession> {
        self.session.as_ref()
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn participants(&self) -> &Participants {
        &self.participants
    }

    pub fn peers(&self) -> &PeerConnectionManager {
        &self.peers
    }

    pub fn chat(&self) -> &ChatLog {
        &self.chat
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn is_sharing(&self) -> bool {
        self.screen.is_active()
    }

    pub fn has_prepared_media(&self) -> bool {
        self.prepared.is_some()
    }

    pub fn pending_dial_count(&self) -> usize {
        self.pending_dials.len()
    }

    pub fn next_dial_deadline(&self) -> Option<Instant> {
        self.pending_dials.iter().map(|d| d.due).min()
    }

    // -- run loop -----------------------------------------------------------

    /// Drive the session until the command channel closes, then leave.
    pub async fn run(mut self, mut commands: mpsc::Receiver<CallCommand>) {
        info!(room = %self.config.room_id, "Call session loop started");
        loop {
            let deadline = self.next_dial_deadline();
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
                event = next_signal(&mut self.signal_rx) => match event {
                    Some(event) => self.handle_signal(event).await,
                    None => self.signal_rx = None,
                },
                Some(event) = self.transport_rx.recv() => self.handle_transport(event).await,
                Some(deferred) = self.deferred_rx.recv() => self.handle_deferred(deferred).await,
                _ = sleep_until(deadline) => {
                    self.fire_due_dials(Instant::now());
                }
            }
        }
        self.leave().await;
        info!("Call session loop stopped");
    }

    /// Apply one UI command. Failures become [`CallEvent`]s.
    pub async fn handle_command(&mut self, command: CallCommand) {
        debug!(?command, "Handling call command");
        let result = match command {
            CallCommand::PrepareMedia => self.prepare_media().await.map(|_| ()),
            CallCommand::Join { display_name } => self.join(&display_name).await,
            CallCommand::Leave => {
                self.leave().await;
                Ok(())
            }
            CallCommand::ToggleMute => self.toggle_mute().map(|_| ()),
            CallCommand::ToggleVideo => self.toggle_video().map(|_| ()),
            CallCommand::ToggleScreenShare => self.toggle_screen_share().await,
            CallCommand::RefreshMedia => self.refresh_media(),
            CallCommand::SendChat(text) => self.send_chat(&text).await,
            CallCommand::ChangeTheme(theme) => {
                self.change_theme(theme).await;
                Ok(())
            }
            CallCommand::SendReaction(emoji) => self.send_reaction(&emoji).await,
        };
        if let Err(e) = result {
            self.report(e);
        }
    }

    // -- media --------------------------------------------------------------

    /// Acquire local media ahead of joining. Returns whether video is live.
    pub async fn prepare_media(&mut self) -> Result<bool, CallError> {
        if self.state != RoomState::Idle {
            return Err(CallError::InvalidState(
                "local media can only be prepared before joining".into(),
            ));
        }
        if let Some(previous) = self.prepared.take() {
            previous.stream.stop_all();
        }

        let events = self.event_tx.clone();
        let media = self
            .acquirer
            .acquire(|notice| {
                let _ = events.send(CallEvent::Notice(notice));
            })
            .await?;
        let has_video = media.has_video;
        self.prepared = Some(media);
        Ok(has_video)
    }

    /// Re-run acquisition in the background and swap the new tracks into
    /// every primary sender when it completes.
    pub fn refresh_media(&mut self) -> Result<(), CallError> {
        self.require_in_room()?;
        let acquirer = self.acquirer.clone();
        let events = self.event_tx.clone();
        let deferred = self.deferred_tx.clone();
        let epoch = self.generations.epoch();
        tokio::spawn(async move {
            let result = acquirer
                .acquire(|notice| {
                    let _ = events.send(CallEvent::Notice(notice));
                })
                .await;
            let _ = deferred.send(Deferred::MediaRefreshed { epoch, result });
        });
        Ok(())
    }

    fn apply_refreshed(&mut self, media: AcquiredMedia) {
        let Some(session) = self.session.as_mut() else {
            media.stream.stop_all();
            return;
        };

        if media.has_video && session.audio_only {
            session.audio_only = false;
            session.video_off = false;
        }

        let mut updated = 0;
        for track in media.stream.tracks() {
            match track.kind() {
                TrackKind::Audio => track.set_enabled(!session.muted),
                TrackKind::Video => track.set_enabled(!session.video_off),
            }
            if let Some(old) = session.stream.replace_track(track.clone()) {
                old.stop();
            }
            updated += self.peers.replace_track(track);
        }
        if !media.has_video {
            if let Some(old) = session.stream.remove_track(TrackKind::Video) {
                old.stop();
            }
            session.audio_only = true;
            session.video_off = true;
        }

        let (muted, video_off) = (session.muted, session.video_off);
        info!(senders = updated, has_video = media.has_video, "Local media refreshed");
        self.emit(CallEvent::LocalMediaChanged { muted, video_off });
    }

    /// Flip the microphone. Returns the new muted state.
    pub fn toggle_mute(&mut self) -> Result<bool, CallError> {
        let session = self.session.as_mut().ok_or_else(not_in_room)?;
        let track = session
            .stream
            .audio_track()
            .cloned()
            .ok_or_else(|| CallError::InvalidState("no microphone track".into()))?;

        let enabled = !track.is_enabled();
        track.set_enabled(enabled);
        session.muted = !enabled;

        let (muted, video_off) = (session.muted, session.video_off);
        info!(muted, "Microphone toggled");
        self.emit(CallEvent::LocalMediaChanged { muted, video_off });
        Ok(muted)
    }

    /// Flip the camera. In audio-only mode this only warns.
    /// Returns the new video-off state.
    pub fn toggle_video(&mut self) -> Result<bool, CallError> {
        let session = self.session.as_mut().ok_or_else(not_in_room)?;
        let track = if session.audio_only {
            None
        } else {
            session.stream.video_track().cloned()
        };

        let Some(track) = track else {
            let video_off = session.video_off;
            warn!("Video toggle ignored in audio-only mode");
            self.emit(CallEvent::Notice(Notification::warning(
                "Camera",
                "Audio-only mode: there is no camera to turn on",
            )));
            return Ok(video_off);
        };

        let enabled = !track.is_enabled();
        track.set_enabled(enabled);
        session.video_off = !enabled;

        let (muted, video_off) = (session.muted, session.video_off);
        info!(video_off, "Camera toggled");
        self.emit(CallEvent::LocalMediaChanged { muted, video_off });
        Ok(video_off)
    }

    // -- room lifecycle -----------------------------------------------------

    /// Enter the room with previously prepared media.
    ///
    /// Completes when the transport reports its local id
    /// ([`TransportEvent::Opened`]).
    pub async fn join(&mut self, display_name: &str) -> Result<(), CallError> {
        if self.state != RoomState::Idle {
            return Err(CallError::InvalidState(format!(
                "cannot join while {:?}",
                self.state
            )));
        }
        let name = display_name.trim();
        if name.is_empty() {
            return Err(CallError::InvalidState("display name is required".into()));
        }
        let media = self.prepared.take().ok_or(CallError::NoLocalMedia)?;

        let room_id = self.config.room_id.clone();
        self.session = Some(LocalSession::new(
            room_id.as_str(),
            name,
            media.stream,
            media.has_video,
            self.theme,
        ));
        self.set_state(RoomState::Joining);

        let (channel, events) = self.connector.connect(&room_id, name);
        self.signaling = Some(channel);
        self.signal_rx = Some(events);

        if let Err(e) = self.transport.open().await {
            error!(error = %e, "Peer transport failed to open");
            self.leave().await;
            return Err(CallError::TransportUnavailable(e.to_string()));
        }

        info!(room = %room_id, name, "Joining room");
        Ok(())
    }

    /// Tear the session down and return to Idle. No-op when not in a room.
    pub async fn leave(&mut self) {
        if matches!(self.state, RoomState::Idle | RoomState::Leaving) {
            debug!(state = ?self.state, "Leave ignored");
            return;
        }
        self.set_state(RoomState::Leaving);
        self.generations.bump_epoch();

        // 1. Local capture.
        if let Some(session) = &self.session {
            session.stream.stop_all();
        }
        self.screen.abandon();

        // 2. Peer connections and the transport.
        let closed = self.peers.close_all();
        self.transport.shutdown().await;

        // 3. Signaling.
        if let Some(signaling) = self.signaling.take() {
            signaling.disconnect().await;
        }
        self.signal_rx = None;

        // 4. Local state.
        for key in self.participants.drain() {
            self.emit(CallEvent::ParticipantRemoved(key));
        }
        self.roster.clear();
        self.chat.clear();
        self.pending_dials.clear();
        self.peers.reset();
        self.session = None;

        info!(connections = closed.len(), "Left room");
        self.set_state(RoomState::Idle);
    }

    // -- outgoing room actions ----------------------------------------------

    /// Broadcast a chat line. Shown once the server echoes it back.
    pub async fn send_chat(&mut self, text: &str) -> Result<(), CallError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }
        let signaling = self.room_signaling()?;
        signaling
            .send(OutboundSignal::Message {
                text: text.to_string(),
            })
            .await;
        Ok(())
    }

    /// Apply a theme locally and, when in a room, share it.
    pub async fn change_theme(&mut self, theme: Theme) {
        self.apply_theme(theme);
        if let Ok(signaling) = self.room_signaling() {
            signaling.send(OutboundSignal::ChangeTheme { theme }).await;
        }
    }

    pub async fn send_reaction(&mut self, emoji: &str) -> Result<(), CallError> {
        let emoji = emoji.trim();
        if emoji.is_empty() {
            return Ok(());
        }
        let signaling = self.room_signaling()?;
        signaling
            .send(OutboundSignal::EmojiReaction {
                emoji: emoji.to_string(),
            })
            .await;
        Ok(())
    }

    /// Start or stop sharing. Starting requests display capture in the
    /// background; toggling again before it resolves cancels it.
    pub async fn toggle_screen_share(&mut self) -> Result<(), CallError> {
        self.require_in_room()?;
        if self.screen.is_active() || self.screen.is_starting() {
            self.stop_screen_share().await;
            return Ok(());
        }
        let Some(share_id) = self.screen.begin() else {
            return Ok(());
        };

        let devices = Arc::clone(&self.devices);
        let deferred = self.deferred_tx.clone();
        let epoch = self.generations.epoch();
        tokio::spawn(async move {
            let result = devices.get_display_media().await;
            let _ = deferred.send(Deferred::ScreenCaptured {
                epoch,
                share_id,
                result,
            });
        });
        debug!(share_id, "Display capture requested");
        Ok(())
    }

    async fn stop_screen_share(&mut self) {
        let Some(session) = self.session.as_mut() else {
            self.screen.abandon();
            return;
        };
        let ctx = share_context!(self, session);
        self.screen.stop(ctx).await;
    }

    // -- signaling ----------------------------------------------------------

    pub async fn handle_signal(&mut self, event: SignalEvent) {
        match event {
            SignalEvent::Connected => {
                info!("Signaling connected");
                self.emit(CallEvent::SignalingStatus { connected: true });
            }
            SignalEvent::Disconnected => {
                if self.state != RoomState::Idle {
                    warn!("Signaling connection lost");
                    self.emit(CallEvent::SignalingStatus { connected: false });
                }
            }
            SignalEvent::Reconnecting { attempt, delay } => {
                debug!(attempt, delay_ms = delay.as_millis() as u64, "Signaling reconnecting");
            }
            SignalEvent::Unreachable { attempts } => {
                error!(attempts, "Signaling server unreachable");
                self.emit(CallEvent::SessionFailed(CallError::SignalingUnreachable {
                    attempts,
                }));
                self.leave().await;
            }
            SignalEvent::Message(signal) => {
                if self.state != RoomState::InRoom {
                    debug!(?signal, state = ?self.state, "Dropping signal outside room");
                    return;
                }
                self.handle_room_signal(signal);
            }
        }
    }

    fn handle_room_signal(&mut self, signal: InboundSignal) {
        match signal {
            InboundSignal::UserJoined { user_id, user_name } => {
                self.on_user_joined(user_id, user_name);
            }
            InboundSignal::AllUsers { users } => self.on_roster_snapshot(&users),
            InboundSignal::UserDisconnected { user_id, user_name } => {
                self.on_user_departed(&user_id, user_name);
            }
            InboundSignal::CreateMessage { text, user_name } => {
                let is_own = self
                    .session
                    .as_ref()
                    .is_some_and(|s| s.display_name == user_name);
                let origin = if is_own {
                    MessageOrigin::Local
                } else {
                    MessageOrigin::Remote
                };
                self.push_chat(ChatMessage::chat(user_name, text, origin));
            }
            InboundSignal::ThemeChanged { theme } => self.apply_theme(theme),
            InboundSignal::UserStartedScreenShare { user_id, user_name } => {
                info!(peer_id = %user_id, name = %user_name, "Participant started sharing");
                self.push_chat(ChatMessage::system(format!(
                    "{user_name} is sharing their screen."
                )));
                self.emit(CallEvent::RemoteScreenShare {
                    user_id,
                    display_name: Some(user_name),
                    active: true,
                });
            }
            InboundSignal::UserStoppedScreenShare { user_id } => {
                let display_name = self.roster.name(&user_id).map(str::to_string);
                self.emit(CallEvent::RemoteScreenShare {
                    user_id,
                    display_name,
                    active: false,
                });
            }
            InboundSignal::UserReaction { user_id, emoji } => {
                let display_name = if self.is_self(&user_id) {
                    self.session.as_ref().map(|s| s.display_name.clone())
                } else {
                    self.roster.name(&user_id).map(str::to_string)
                };
                self.emit(CallEvent::Reaction {
                    user_id,
                    display_name,
                    emoji,
                });
            }
        }
    }

    fn on_user_joined(&mut self, peer_id: String, name: String) {
        if self.is_self(&peer_id) {
            return;
        }
        info!(peer_id = %peer_id, name = %name, "Participant joined");
        self.roster.insert(peer_id.as_str(), name.as_str());
        self.push_chat(ChatMessage::system(format!("{name} joined.")));

        let token = self.generations.token_for(&peer_id);
        self.pending_dials.push(PendingDial {
            peer_id,
            due: Instant::now() + self.config.settle_delay,
            token,
        });
        self.emit(CallEvent::RosterChanged {
            members: self.roster.len(),
        });
    }

    fn on_roster_snapshot(&mut self, users: &[RosterEntry]) {
        let local_id = self.session.as_ref().and_then(|s| s.local_id.clone());
        self.roster.replace(users, local_id.as_deref());
        info!(members = self.roster.len(), "Roster snapshot received");

        for peer_id in self.roster.peer_ids() {
            self.dial_peer(&peer_id);
        }
        self.emit(CallEvent::RosterChanged {
            members: self.roster.len(),
        });
    }

    /// Remove every trace of a departed peer in one step.
    fn on_user_departed(&mut self, peer_id: &str, name: Option<String>) {
        self.generations.bump_peer(peer_id);
        self.pending_dials.retain(|d| d.peer_id != peer_id);
        let closed = self.peers.close_peer(peer_id);
        let roster_name = self.roster.remove(peer_id);

        for kind in [ChannelKind::Primary, ChannelKind::RemoteScreen] {
            let key = ConnectionKey::new(peer_id, kind);
            if self.participants.remove(&key).is_some() {
                self.emit(CallEvent::ParticipantRemoved(key));
            }
        }

        let name = name
            .filter(|n| !n.trim().is_empty())
            .or(roster_name)
            .unwrap_or_else(|| UNKNOWN_PARTICIPANT.to_string());
        info!(peer_id, name = %name, connections = closed.len(), "Participant left");
        self.push_chat(ChatMessage::system(format!("{name} left.")));
        self.emit(CallEvent::RosterChanged {
            members: self.roster.len(),
        });
    }

    /// Dial a roster member on the primary channel, plus the screen channel
    /// while sharing.
    fn dial_peer(&mut self, peer_id: &str) {
        let Some(session) = self.session.as_ref() else {
            return;
        };
        let peer_name = self.roster.name(peer_id).unwrap_or_default().to_string();
        let token = self.generations.token_for(peer_id);

        if let Err(e) = self.peers.connect_to(
            peer_id,
            &peer_name,
            &session.stream,
            ChannelKind::Primary,
            &session.display_name,
            token,
        ) {
            let _ = self.event_tx.send(CallEvent::Error(e));
        }
        self.screen.dial_peer(
            &mut self.peers,
            peer_id,
            &peer_name,
            &session.display_name,
            &self.generations,
        );
    }

    /// Issue every settle dial due at `now`. Dials whose peer left (or whose
    /// session ended) meanwhile are dropped. Returns how many were issued.
    pub fn fire_due_dials(&mut self, now: Instant) -> usize {
        let (due, pending): (Vec<PendingDial>, Vec<PendingDial>) =
            std::mem::take(&mut self.pending_dials)
                .into_iter()
                .partition(|d| d.due <= now);
        self.pending_dials = pending;

        let mut fired = 0;
        for dial in due {
            let current = self.state == RoomState::InRoom
                && self.generations.is_current(&dial.peer_id, dial.token)
                && self.roster.contains(&dial.peer_id);
            if !current {
                debug!(peer_id = %dial.peer_id, "Discarding stale settle dial");
                continue;
            }
            self.dial_peer(&dial.peer_id);
            fired += 1;
        }
        fired
    }

    // -- transport ----------------------------------------------------------

    pub async fn handle_transport(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Opened { local_id } => {
                if self.state != RoomState::Joining {
                    debug!(local_id = %local_id, "Transport opened outside join, ignoring");
                    return;
                }
                let Some(session) = self.session.as_mut() else {
                    return;
                };
                session.local_id = Some(local_id.clone());
                self.set_state(RoomState::InRoom);
                if let Some(signaling) = &self.signaling {
                    signaling.announce(&local_id).await;
                }
                info!(local_id = %local_id, "Joined room");
                self.emit(CallEvent::Joined { local_id });
            }
            TransportEvent::Incoming(call) => {
                let session = match &self.session {
                    Some(session) if self.state == RoomState::InRoom => session,
                    _ => {
                        debug!(peer_id = %call.peer_id(), "Rejecting call outside room");
                        call.close();
                        return;
                    }
                };
                let token = self.generations.token_for(call.peer_id());
                if let Err(e) = self.peers.accept_inbound(call, &session.stream, token) {
                    let _ = self.event_tx.send(CallEvent::Error(e));
                }
            }
            TransportEvent::Stream { call_id, stream } => {
                let generations = &self.generations;
                let outcome =
                    self.peers
                        .on_stream(&call_id, stream, |peer| generations.token_for(peer));
                match outcome {
                    StreamOutcome::Published(published) => {
                        let participant = RemoteParticipant {
                            key: published.key,
                            display_name: published.display_name,
                            stream: published.stream,
                            connected: true,
                            is_local: false,
                        };
                        if self.participants.insert(participant.clone()) {
                            self.emit(CallEvent::ParticipantAdded(participant));
                        }
                    }
                    StreamOutcome::Stale(key) => {
                        debug!(%key, "Late stream discarded");
                    }
                    StreamOutcome::Duplicate | StreamOutcome::AnswerOnly | StreamOutcome::Unknown => {}
                }
            }
            TransportEvent::Closed { call_id } => {
                self.on_call_closed(&call_id, None);
            }
            TransportEvent::Failed { call_id, reason } => {
                warn!(call_id = %call_id, reason = %reason, "Peer call failed");
                self.on_call_closed(&call_id, Some(reason));
            }
            TransportEvent::Error(message) => {
                warn!(message = %message, "Peer transport error");
            }
        }
    }

    fn on_call_closed(&mut self, call_id: &CallId, failure: Option<String>) {
        if let CloseOutcome::Removed { key, was_published } = self.peers.on_closed(call_id) {
            debug!(%key, was_published, "Connection closed by transport");
            if self.participants.remove(&key).is_some() {
                self.emit(CallEvent::ParticipantRemoved(key.clone()));
            }
            if let Some(reason) = failure {
                self.emit(CallEvent::Error(CallError::PeerDialFailure {
                    peer_id: key.peer_id,
                    reason,
                }));
            }
        }
    }

    // -- deferred work ------------------------------------------------------

    async fn handle_deferred(&mut self, deferred: Deferred) {
        let epoch = self.generations.epoch();
        match deferred {
            Deferred::ScreenCaptured {
                epoch: started,
                share_id,
                result,
            } => {
                let Some(session) = self.session.as_mut().filter(|_| started == epoch) else {
                    debug!(share_id, "Display capture resolved after leave, discarding");
                    if let Ok(stream) = result {
                        stream.stop_all();
                    }
                    return;
                };
                let ctx = share_context!(self, session);
                if let Some(stream) = self.screen.complete(ctx, share_id, result).await {
                    self.watch_capture_end(started, share_id, &stream);
                }
            }
            Deferred::ScreenEnded {
                epoch: started,
                share_id,
            } => {
                if started == epoch && self.screen.is_current_share(share_id) {
                    info!(share_id, "Display capture ended by the device");
                    self.stop_screen_share().await;
                }
            }
            Deferred::MediaRefreshed {
                epoch: started,
                result,
            } => match result {
                Ok(media) if started == epoch && self.state == RoomState::InRoom => {
                    self.apply_refreshed(media);
                }
                Ok(media) => {
                    debug!("Media refresh resolved after leave, discarding");
                    media.stream.stop_all();
                }
                Err(e) if started == epoch && self.state == RoomState::InRoom => {
                    warn!(error = %e, "Media refresh failed, keeping current media");
                    self.emit(CallEvent::Error(CallError::MediaRefreshFailed(e.to_string())));
                }
                Err(e) => {
                    debug!(error = %e, "Media refresh failed after leave, discarding");
                }
            },
        }
    }

    fn watch_capture_end(&self, epoch: u64, share_id: u64, stream: &MediaStream) {
        let Some(track) = stream.video_track().cloned() else {
            return;
        };
        let deferred = self.deferred_tx.clone();
        tokio::spawn(async move {
            track.ended().await;
            let _ = deferred.send(Deferred::ScreenEnded { epoch, share_id });
        });
    }

    /// Wait for one piece of spawned work and apply it.
    #[cfg(test)]
    pub(crate) async fn settle_deferred(&mut self) {
        let deferred = tokio::time::timeout(std::time::Duration::from_secs(5), self.deferred_rx.recv())
            .await
            .expect("timed out waiting for deferred work")
            .expect("deferred channel closed");
        self.handle_deferred(deferred).await;
    }

    // -- helpers ------------------------------------------------------------

    fn apply_theme(&mut self, theme: Theme) {
        self.theme = theme;
        if let Some(session) = self.session.as_mut() {
            session.theme = theme;
        }
        debug!(%theme, "Theme applied");
        self.emit(CallEvent::ThemeChanged(theme));
    }

    fn push_chat(&mut self, message: ChatMessage) {
        self.chat.push(message.clone());
        self.emit(CallEvent::Chat(message));
    }

    fn is_self(&self, peer_id: &str) -> bool {
        self.session
            .as_ref()
            .and_then(|s| s.local_id.as_deref())
            .is_some_and(|id| id == peer_id)
    }

    fn require_in_room(&self) -> Result<(), CallError> {
        if self.state == RoomState::InRoom {
            Ok(())
        } else {
            Err(not_in_room())
        }
    }

    fn room_signaling(&self) -> Result<&dyn SignalingChannel, CallError> {
        self.require_in_room()?;
        self.signaling
            .as_deref()
            .ok_or_else(|| CallError::InvalidState("signaling is not connected".into()))
    }

    fn set_state(&mut self, state: RoomState) {
        if self.state != state {
            debug!(from = ?self.state, to = ?state, "Room state changed");
            self.state = state;
            self.emit(CallEvent::RoomStateChanged(state));
        }
    }

    fn report(&self, error: CallError) {
        if error.is_fatal() {
            error!(%error, "Call session failed");
            self.emit(CallEvent::SessionFailed(error));
        } else {
            warn!(%error, "Call action failed");
            self.emit(CallEvent::Error(error));
        }
    }

    fn emit(&self, event: CallEvent) {
        let _ = self.event_tx.send(event);
    }
}

fn not_in_room() -> CallError {
    CallError::InvalidState("not in a room".into())
}

async fn next_signal(rx: &mut Option<mpsc::Receiver<SignalEvent>>) -> Option<SignalEvent> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
