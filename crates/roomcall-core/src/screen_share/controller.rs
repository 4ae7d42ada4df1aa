//! Outgoing screen share: capture lifecycle, the local preview entry and
//! the secondary fan-out to the roster.

use roomcall_common::CallError;
use tracing::{debug, info, warn};

use crate::media::{DeviceError, MediaStream};
use crate::peer::{ChannelKind, ConnectionKey, PeerConnectionManager};
use crate::session::{
    CallEvent, EventSink, Generations, LocalSession, Participants, RemoteParticipant, Roster,
    LOCAL_SCREEN_ID,
};
use crate::signaling::{OutboundSignal, SignalingChannel};

#[derive(Debug)]
enum ShareState {
    Idle,
    /// Display capture requested, result pending.
    Starting { share_id: u64 },
    Active { share_id: u64, stream: MediaStream },
}

/// Borrowed session state the controller acts on.
pub struct ShareContext<'a> {
    pub session: &'a mut LocalSession,
    pub roster: &'a Roster,
    pub peers: &'a mut PeerConnectionManager,
    pub participants: &'a mut Participants,
    pub generations: &'a Generations,
    pub signaling: Option<&'a dyn SignalingChannel>,
    pub events: &'a EventSink,
}

pub struct ScreenShareController {
    state: ShareState,
    next_share_id: u64,
}

impl ScreenShareController {
    pub fn new() -> Self {
        Self {
            state: ShareState::Idle,
            next_share_id: 1,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, ShareState::Active { .. })
    }

    pub fn is_starting(&self) -> bool {
        matches!(self.state, ShareState::Starting { .. })
    }

    pub fn stream(&self) -> Option<&MediaStream> {
        match &self.state {
            ShareState::Active { stream, .. } => Some(stream),
            _ => None,
        }
    }

    /// Whether `share_id` names the share currently running.
    pub fn is_current_share(&self, share_id: u64) -> bool {
        matches!(self.state, ShareState::Active { share_id: id, .. } if id == share_id)
    }

    /// Mark a capture request in flight. Returns its share id, or `None`
    /// if a share is already starting or active.
    pub fn begin(&mut self) -> Option<u64> {
        if !matches!(self.state, ShareState::Idle) {
            return None;
        }
        let share_id = self.next_share_id;
        self.next_share_id += 1;
        self.state = ShareState::Starting { share_id };
        Some(share_id)
    }

    /// Apply a display-capture result.
    ///
    /// Returns the stream when the share went live so the caller can watch
    /// for the capture ending. A result for a share that is no longer
    /// pending is stopped and discarded.
    pub async fn complete(
        &mut self,
        ctx: ShareContext<'_>,
        share_id: u64,
        result: Result<MediaStream, DeviceError>,
    ) -> Option<MediaStream> {
        if !matches!(self.state, ShareState::Starting { share_id: id } if id == share_id) {
            debug!(share_id, "Discarding stale display capture");
            if let Ok(stream) = result {
                stream.stop_all();
            }
            return None;
        }

        let stream = match result {
            Ok(stream) => stream,
            Err(e) => {
                self.state = ShareState::Idle;
                warn!(error = %e, "Display capture failed");
                let _ = ctx
                    .events
                    .send(CallEvent::Error(CallError::ScreenCaptureDenied(e.to_string())));
                return None;
            }
        };

        self.state = ShareState::Active {
            share_id,
            stream: stream.clone(),
        };
        ctx.session.screen = Some(stream.clone());

        let preview = RemoteParticipant {
            key: ConnectionKey::new(LOCAL_SCREEN_ID, ChannelKind::Screen),
            display_name: format!("{} (screen)", ctx.session.display_name),
            stream: stream.clone(),
            connected: true,
            is_local: true,
        };
        if ctx.participants.insert(preview.clone()) {
            let _ = ctx.events.send(CallEvent::ParticipantAdded(preview));
        }

        if let (Some(signaling), Some(local_id)) = (ctx.signaling, ctx.session.local_id.as_ref()) {
            signaling
                .send(OutboundSignal::StartScreenShare {
                    user_id: local_id.clone(),
                    user_name: ctx.session.display_name.clone(),
                })
                .await;
        }

        for peer_id in ctx.roster.peer_ids() {
            let peer_name = ctx.roster.name(&peer_id).unwrap_or_default().to_string();
            Self::dial(
                ctx.peers,
                &stream,
                &peer_id,
                &peer_name,
                &ctx.session.display_name,
                ctx.generations,
            );
        }

        info!(share_id, peers = ctx.roster.len(), "Screen share started");
        let _ = ctx.events.send(CallEvent::ScreenShareChanged { active: true });
        Some(stream)
    }

    /// Give a newly joined peer the current share.
    pub fn dial_peer(
        &self,
        peers: &mut PeerConnectionManager,
        peer_id: &str,
        peer_name: &str,
        local_name: &str,
        generations: &Generations,
    ) {
        if let ShareState::Active { stream, .. } = &self.state {
            Self::dial(peers, stream, peer_id, peer_name, local_name, generations);
        }
    }

    fn dial(
        peers: &mut PeerConnectionManager,
        stream: &MediaStream,
        peer_id: &str,
        peer_name: &str,
        local_name: &str,
        generations: &Generations,
    ) {
        let token = generations.token_for(peer_id);
        // Dial failures are logged by the manager; the share continues.
        let _ = peers.connect_to(
            peer_id,
            peer_name,
            stream,
            ChannelKind::Screen,
            local_name,
            token,
        );
    }

    /// Stop the share: end capture, drop the preview, close every outgoing
    /// screen connection and tell the room. Returns whether a share was live.
    pub async fn stop(&mut self, ctx: ShareContext<'_>) -> bool {
        let stream = match std::mem::replace(&mut self.state, ShareState::Idle) {
            ShareState::Active { stream, .. } => stream,
            ShareState::Starting { share_id } => {
                debug!(share_id, "Abandoning pending display capture");
                return false;
            }
            ShareState::Idle => return false,
        };

        stream.stop_all();
        ctx.session.screen = None;

        let preview_key = ConnectionKey::new(LOCAL_SCREEN_ID, ChannelKind::Screen);
        if ctx.participants.remove(&preview_key).is_some() {
            let _ = ctx.events.send(CallEvent::ParticipantRemoved(preview_key));
        }

        let closed = ctx.peers.close_kind(ChannelKind::Screen);

        if let Some(signaling) = ctx.signaling {
            signaling.send(OutboundSignal::StopScreenShare).await;
        }

        info!(closed = closed.len(), "Screen share stopped");
        let _ = ctx.events.send(CallEvent::ScreenShareChanged { active: false });
        true
    }

    /// Drop the share without notifying anyone. Used on leave, where the
    /// signaling connection and every peer connection are torn down anyway.
    pub fn abandon(&mut self) {
        if let ShareState::Active { stream, .. } =
            std::mem::replace(&mut self.state, ShareState::Idle)
        {
            stream.stop_all();
        }
    }
}

impl Default for ScreenShareController {
    fn default() -> Self {
        Self::new()
    }
}
