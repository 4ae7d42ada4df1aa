//! Session state, UI events and commands.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use roomcall_common::{CallError, Notification};
use tokio::sync::mpsc;

use crate::chat::ChatMessage;
use crate::media::{AcquirerConfig, MediaStream};
use crate::peer::{ChannelKind, ConnectionKey, DialToken};
use crate::signaling::{RosterEntry, Theme};

/// Sentinel peer id of the local screen-share preview entry.
pub const LOCAL_SCREEN_ID: &str = "local-screen";

/// Fallback used when a departing peer's name is unknown.
pub(crate) const UNKNOWN_PARTICIPANT: &str = "A participant";

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub room_id: String,
    /// Delay between a `user-joined` notice and the dial to that peer.
    pub settle_delay: Duration,
    pub chat_history_limit: usize,
    pub media: AcquirerConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            room_id: "main-room".to_string(),
            settle_delay: Duration::from_secs(1),
            chat_history_limit: 500,
            media: AcquirerConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomState {
    Idle,
    Joining,
    InRoom,
    Leaving,
}

/// The local participant. Exists from join until leave.
#[derive(Debug, Clone)]
pub struct LocalSession {
    pub room_id: String,
    pub display_name: String,
    /// Assigned by the peer transport once it opens.
    pub local_id: Option<String>,
    pub stream: MediaStream,
    pub screen: Option<MediaStream>,
    pub muted: bool,
    pub video_off: bool,
    pub audio_only: bool,
    pub theme: Theme,
}

impl LocalSession {
    pub fn new(
        room_id: impl Into<String>,
        display_name: impl Into<String>,
        stream: MediaStream,
        has_video: bool,
        theme: Theme,
    ) -> Self {
        Self {
            room_id: room_id.into(),
            display_name: display_name.into(),
            local_id: None,
            stream,
            screen: None,
            muted: false,
            video_off: !has_video,
            audio_only: !has_video,
            theme,
        }
    }

    pub fn is_sharing(&self) -> bool {
        self.screen.is_some()
    }
}

/// A video tile: a remote peer's stream, or our own screen preview.
#[derive(Debug, Clone)]
pub struct RemoteParticipant {
    pub key: ConnectionKey,
    pub display_name: String,
    pub stream: MediaStream,
    pub connected: bool,
    /// True only for the local screen-share preview.
    pub is_local: bool,
}

impl RemoteParticipant {
    pub fn kind(&self) -> ChannelKind {
        self.key.kind
    }
}

/// Room membership as reported by signaling.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    members: BTreeMap<String, String>,
}

impl Roster {
    pub fn insert(&mut self, peer_id: impl Into<String>, display_name: impl Into<String>) {
        self.members.insert(peer_id.into(), display_name.into());
    }

    pub fn remove(&mut self, peer_id: &str) -> Option<String> {
        self.members.remove(peer_id)
    }

    /// Replace the roster wholesale, skipping `local_id`.
    pub fn replace(&mut self, entries: &[RosterEntry], local_id: Option<&str>) {
        self.members = entries
            .iter()
            .filter(|e| Some(e.user_id.as_str()) != local_id)
            .map(|e| (e.user_id.clone(), e.user_name.clone()))
            .collect();
    }

    pub fn name(&self, peer_id: &str) -> Option<&str> {
        self.members.get(peer_id).map(String::as_str)
    }

    pub fn contains(&self, peer_id: &str) -> bool {
        self.members.contains_key(peer_id)
    }

    pub fn peer_ids(&self) -> Vec<String> {
        self.members.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn clear(&mut self) {
        self.members.clear();
    }
}

/// Tiles currently shown, keyed like connection records.
#[derive(Debug, Clone, Default)]
pub struct Participants {
    entries: BTreeMap<ConnectionKey, RemoteParticipant>,
}

impl Participants {
    /// Insert unless an entry for the key already exists.
    pub fn insert(&mut self, participant: RemoteParticipant) -> bool {
        if self.entries.contains_key(&participant.key) {
            return false;
        }
        self.entries.insert(participant.key.clone(), participant);
        true
    }

    pub fn remove(&mut self, key: &ConnectionKey) -> Option<RemoteParticipant> {
        self.entries.remove(key)
    }

    pub fn get(&self, key: &ConnectionKey) -> Option<&RemoteParticipant> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &ConnectionKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RemoteParticipant> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove everything, returning the removed keys.
    pub fn drain(&mut self) -> Vec<ConnectionKey> {
        std::mem::take(&mut self.entries).into_keys().collect()
    }
}

/// Session epoch plus per-peer generations.
#[derive(Debug, Clone, Default)]
pub struct Generations {
    epoch: u64,
    peers: HashMap<String, u64>,
}

impl Generations {
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn token_for(&self, peer_id: &str) -> DialToken {
        DialToken {
            epoch: self.epoch,
            generation: self.peers.get(peer_id).copied().unwrap_or(0),
        }
    }

    pub fn is_current(&self, peer_id: &str, token: DialToken) -> bool {
        self.token_for(peer_id) == token
    }

    pub fn bump_peer(&mut self, peer_id: &str) {
        *self.peers.entry(peer_id.to_string()).or_insert(0) += 1;
    }

    /// Invalidate everything issued so far.
    pub fn bump_epoch(&mut self) {
        self.epoch += 1;
        self.peers.clear();
    }
}

// ---------------------------------------------------------------------------
// UI surface
// ---------------------------------------------------------------------------

/// Output stream consumed by the UI.
#[derive(Debug, Clone)]
pub enum CallEvent {
    RoomStateChanged(RoomState),
    /// The transport assigned our id and the join was announced.
    Joined { local_id: String },
    SignalingStatus { connected: bool },
    RosterChanged { members: usize },
    ParticipantAdded(RemoteParticipant),
    ParticipantRemoved(ConnectionKey),
    Chat(ChatMessage),
    ThemeChanged(Theme),
    Reaction {
        user_id: String,
        display_name: Option<String>,
        emoji: String,
    },
    LocalMediaChanged { muted: bool, video_off: bool },
    ScreenShareChanged { active: bool },
    RemoteScreenShare {
        user_id: String,
        display_name: Option<String>,
        active: bool,
    },
    Notice(Notification),
    /// A non-fatal failure of one action.
    Error(CallError),
    /// A fatal failure; the session has been (or is being) torn down.
    SessionFailed(CallError),
}

pub type EventSink = mpsc::UnboundedSender<CallEvent>;

/// Actions posted to the run loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallCommand {
    PrepareMedia,
    Join { display_name: String },
    Leave,
    ToggleMute,
    ToggleVideo,
    ToggleScreenShare,
    RefreshMedia,
    SendChat(String),
    ChangeTheme(Theme),
    SendReaction(String),
}
