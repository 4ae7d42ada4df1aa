use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("config parse error: {0}")]
    ParseError(String),

    #[error("config validation error: {0}")]
    ValidationError(String),
}

/// Failures surfaced by the call session.
///
/// `PermissionDenied`, `MediaUnavailable`, `SignalingUnreachable` and
/// `TransportUnavailable` end a session. The other variants are reported
/// and the call continues.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CallError {
    #[error("media permission denied: {0}")]
    PermissionDenied(String),

    #[error("no usable camera or microphone ({reason}); {hint}")]
    MediaUnavailable { reason: String, hint: String },

    #[error("signaling server unreachable after {attempts} attempts")]
    SignalingUnreachable { attempts: u32 },

    #[error("could not connect to peer {peer_id}: {reason}")]
    PeerDialFailure { peer_id: String, reason: String },

    #[error("peer transport unavailable: {0}")]
    TransportUnavailable(String),

    #[error("screen capture denied: {0}")]
    ScreenCaptureDenied(String),

    /// Re-acquiring devices mid-call failed; the current media stays live.
    #[error("media refresh failed: {0}")]
    MediaRefreshFailed(String),

    #[error("no local media acquired; call prepare_media first")]
    NoLocalMedia,

    #[error("invalid call state: {0}")]
    InvalidState(String),
}

impl CallError {
    /// Whether this error ends the current session.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::PermissionDenied(_)
                | Self::MediaUnavailable { .. }
                | Self::SignalingUnreachable { .. }
                | Self::TransportUnavailable(_)
        )
    }
}

/// Top-level error for the `roomcall` binary.
#[derive(Debug, thiserror::Error)]
pub enum RoomcallError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Call(#[from] CallError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}
