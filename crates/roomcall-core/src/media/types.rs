//! Track and stream handles plus the device-layer port.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;

// ---------------------------------------------------------------------------
// Tracks
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackKind {
    Audio,
    Video,
}

struct TrackInner {
    id: String,
    kind: TrackKind,
    label: String,
    enabled: AtomicBool,
    live: watch::Sender<bool>,
}

/// Handle to one capture track.
///
/// Clones share state: the local preview and every peer sender hold the
/// same track, so `set_enabled` is observed by all of them at once.
#[derive(Clone)]
pub struct MediaTrack {
    inner: Arc<TrackInner>,
}

impl MediaTrack {
    pub fn new(kind: TrackKind, label: impl Into<String>) -> Self {
        let (live, _) = watch::channel(true);
        Self {
            inner: Arc::new(TrackInner {
                id: roomcall_common::new_id(),
                kind,
                label: label.into(),
                enabled: AtomicBool::new(true),
                live,
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn kind(&self) -> TrackKind {
        self.inner.kind
    }

    pub fn label(&self) -> &str {
        &self.inner.label
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.enabled.load(Ordering::SeqCst)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.inner.enabled.store(enabled, Ordering::SeqCst);
    }

    /// Whether the track is still producing media.
    pub fn is_live(&self) -> bool {
        *self.inner.live.borrow()
    }

    /// End the track. Idempotent; wakes every `ended()` waiter.
    pub fn stop(&self) {
        self.inner.live.send_replace(false);
    }

    /// Resolves once the track has ended, whether stopped locally or by the
    /// device layer (e.g. the OS "stop sharing" control).
    pub async fn ended(&self) {
        let mut rx = self.inner.live.subscribe();
        let _ = rx.wait_for(|live| !*live).await;
    }

    /// Whether two handles refer to the same underlying track.
    pub fn same_track(&self, other: &MediaTrack) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for MediaTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaTrack")
            .field("id", &self.inner.id)
            .field("kind", &self.inner.kind)
            .field("label", &self.inner.label)
            .field("enabled", &self.is_enabled())
            .field("live", &self.is_live())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Streams
// ---------------------------------------------------------------------------

/// A set of tracks captured or received together.
#[derive(Debug, Clone)]
pub struct MediaStream {
    id: String,
    tracks: Vec<MediaTrack>,
}

impl MediaStream {
    pub fn new(tracks: Vec<MediaTrack>) -> Self {
        Self {
            id: roomcall_common::new_id(),
            tracks,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn tracks(&self) -> &[MediaTrack] {
        &self.tracks
    }

    pub fn audio_track(&self) -> Option<&MediaTrack> {
        self.tracks.iter().find(|t| t.kind() == TrackKind::Audio)
    }

    pub fn video_track(&self) -> Option<&MediaTrack> {
        self.tracks.iter().find(|t| t.kind() == TrackKind::Video)
    }

    pub fn has_live_video(&self) -> bool {
        self.tracks
            .iter()
            .any(|t| t.kind() == TrackKind::Video && t.is_live())
    }

    pub fn stop_all(&self) {
        for track in &self.tracks {
            track.stop();
        }
    }

    /// Swap in `track` for the existing track of the same kind (or append it).
    /// Returns the replaced track, which the caller is expected to stop.
    pub fn replace_track(&mut self, track: MediaTrack) -> Option<MediaTrack> {
        match self.tracks.iter().position(|t| t.kind() == track.kind()) {
            Some(index) => Some(std::mem::replace(&mut self.tracks[index], track)),
            None => {
                self.tracks.push(track);
                None
            }
        }
    }

    /// Detach the first track of `kind`.
    pub fn remove_track(&mut self, kind: TrackKind) -> Option<MediaTrack> {
        let index = self.tracks.iter().position(|t| t.kind() == kind)?;
        Some(self.tracks.remove(index))
    }
}

// ---------------------------------------------------------------------------
// Device port
// ---------------------------------------------------------------------------

/// Video request for one acquisition attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoConstraint {
    Disabled,
    /// Let the device pick its default mode.
    Default,
    Ideal {
        width: u32,
        height: u32,
        frame_rate: u32,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaConstraints {
    pub audio: bool,
    pub video: VideoConstraint,
}

impl MediaConstraints {
    pub fn low_resolution(width: u32, height: u32, frame_rate: u32) -> Self {
        Self {
            audio: true,
            video: VideoConstraint::Ideal {
                width,
                height,
                frame_rate,
            },
        }
    }

    pub fn default_video() -> Self {
        Self {
            audio: true,
            video: VideoConstraint::Default,
        }
    }

    pub fn audio_only() -> Self {
        Self {
            audio: true,
            video: VideoConstraint::Disabled,
        }
    }
}

/// Failure reported by the device layer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeviceError {
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("no matching device: {0}")]
    NotFound(String),

    #[error("device busy or unreadable: {0}")]
    NotReadable(String),

    #[error("constraints cannot be satisfied: {0}")]
    Overconstrained(String),

    #[error("capture not supported: {0}")]
    NotSupported(String),

    #[error("{0}")]
    Other(String),
}

impl DeviceError {
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, Self::PermissionDenied(_))
    }
}

/// Camera, microphone and display capture.
#[async_trait]
pub trait MediaDevices: Send + Sync {
    async fn get_user_media(
        &self,
        constraints: &MediaConstraints,
    ) -> Result<MediaStream, DeviceError>;

    async fn get_display_media(&self) -> Result<MediaStream, DeviceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera_stream() -> MediaStream {
        MediaStream::new(vec![
            MediaTrack::new(TrackKind::Audio, "mic"),
            MediaTrack::new(TrackKind::Video, "cam"),
        ])
    }

    #[test]
    fn clones_share_enabled_flag() {
        let track = MediaTrack::new(TrackKind::Audio, "mic");
        let sender_copy = track.clone();
        track.set_enabled(false);
        assert!(!sender_copy.is_enabled());
        assert!(track.same_track(&sender_copy));
    }

    #[test]
    fn stopped_video_is_not_live() {
        let stream = camera_stream();
        assert!(stream.has_live_video());
        stream.video_track().unwrap().stop();
        assert!(!stream.has_live_video());
    }

    #[test]
    fn audio_only_stream_has_no_video() {
        let stream = MediaStream::new(vec![MediaTrack::new(TrackKind::Audio, "mic")]);
        assert!(!stream.has_live_video());
        assert!(stream.video_track().is_none());
    }

    #[test]
    fn replace_track_swaps_same_kind() {
        let mut stream = camera_stream();
        let new_cam = MediaTrack::new(TrackKind::Video, "usb cam");
        let old = stream.replace_track(new_cam.clone()).unwrap();
        assert_eq!(old.label(), "cam");
        assert!(stream.video_track().unwrap().same_track(&new_cam));
        assert_eq!(stream.tracks().len(), 2);
    }

    #[test]
    fn remove_track_detaches_kind() {
        let mut stream = camera_stream();
        let cam = stream.remove_track(TrackKind::Video).unwrap();
        assert_eq!(cam.label(), "cam");
        assert!(stream.video_track().is_none());
        assert!(stream.remove_track(TrackKind::Video).is_none());
    }

    #[test]
    fn replace_track_appends_missing_kind() {
        let mut stream = MediaStream::new(vec![MediaTrack::new(TrackKind::Audio, "mic")]);
        assert!(stream
            .replace_track(MediaTrack::new(TrackKind::Video, "cam"))
            .is_none());
        assert!(stream.has_live_video());
    }

    #[tokio::test]
    async fn ended_resolves_after_stop() {
        let track = MediaTrack::new(TrackKind::Video, "screen");
        let waiter = track.clone();
        let handle = tokio::spawn(async move { waiter.ended().await });
        track.stop();
        handle.await.unwrap();
        assert!(!track.is_live());
    }

    #[tokio::test]
    async fn ended_resolves_immediately_for_stopped_track() {
        let track = MediaTrack::new(TrackKind::Video, "screen");
        track.stop();
        track.ended().await;
    }
}
