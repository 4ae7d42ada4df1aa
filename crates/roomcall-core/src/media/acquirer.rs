//! Tiered local media acquisition.
//!
//! Tries a low-resolution camera first, then the device default, then
//! audio only. A permission denial at any tier stops the ladder.

use std::sync::Arc;

use roomcall_common::{CallError, Notification};
use tracing::{info, warn};

use super::types::{DeviceError, MediaConstraints, MediaDevices, MediaStream};

const UNAVAILABLE_HINT: &str =
    "check that a microphone is connected and not in use by another application";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquirerConfig {
    pub low_res_width: u32,
    pub low_res_height: u32,
    pub low_res_frame_rate: u32,
    /// Skip the camera tiers entirely.
    pub audio_only: bool,
}

impl Default for AcquirerConfig {
    fn default() -> Self {
        Self {
            low_res_width: 320,
            low_res_height: 240,
            low_res_frame_rate: 15,
            audio_only: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquisitionTier {
    LowResolution,
    DefaultVideo,
    AudioOnly,
}

impl AcquisitionTier {
    /// Notice shown when the ladder falls through to this tier.
    fn fallback_notice(self) -> Option<Notification> {
        match self {
            Self::LowResolution => None,
            Self::DefaultVideo => Some(Notification::info(
                "Camera",
                "Low-resolution camera failed, retrying with default settings",
            )),
            Self::AudioOnly => Some(Notification::warning(
                "Camera",
                "Camera unavailable, trying audio only",
            )),
        }
    }
}

/// Result of a successful acquisition.
#[derive(Debug, Clone)]
pub struct AcquiredMedia {
    pub stream: MediaStream,
    pub has_video: bool,
}

#[derive(Clone)]
pub struct MediaAcquirer {
    devices: Arc<dyn MediaDevices>,
    config: AcquirerConfig,
}

impl MediaAcquirer {
    pub fn new(devices: Arc<dyn MediaDevices>, config: AcquirerConfig) -> Self {
        Self { devices, config }
    }

    pub fn tiers(&self) -> Vec<(AcquisitionTier, MediaConstraints)> {
        if self.config.audio_only {
            return vec![(AcquisitionTier::AudioOnly, MediaConstraints::audio_only())];
        }
        vec![
            (
                AcquisitionTier::LowResolution,
                MediaConstraints::low_resolution(
                    self.config.low_res_width,
                    self.config.low_res_height,
                    self.config.low_res_frame_rate,
                ),
            ),
            (
                AcquisitionTier::DefaultVideo,
                MediaConstraints::default_video(),
            ),
            (AcquisitionTier::AudioOnly, MediaConstraints::audio_only()),
        ]
    }

    /// Walk the tiers until one yields a stream.
    ///
    /// `on_notice` receives a notice for every tier transition and for the
    /// audio-only outcome when it was not requested.
    pub async fn acquire(
        &self,
        mut on_notice: impl FnMut(Notification) + Send,
    ) -> Result<AcquiredMedia, CallError> {
        let mut video_error: Option<DeviceError> = None;
        let mut last_error: Option<DeviceError> = None;

        for (tier, constraints) in self.tiers() {
            if let Some(notice) = tier.fallback_notice() {
                if !self.config.audio_only {
                    on_notice(notice);
                }
            }

            match self.devices.get_user_media(&constraints).await {
                Ok(stream) => {
                    let has_video = stream.has_live_video();
                    info!(tier = ?tier, has_video, "Local media acquired");
                    if !has_video && !self.config.audio_only {
                        on_notice(Notification::warning(
                            "Audio only",
                            "Joined without camera; video is unavailable",
                        ));
                    }
                    return Ok(AcquiredMedia { stream, has_video });
                }
                Err(e) if e.is_permission_denied() => {
                    warn!(tier = ?tier, error = %e, "Media permission denied");
                    return Err(CallError::PermissionDenied(e.to_string()));
                }
                Err(e) => {
                    warn!(tier = ?tier, error = %e, "Media acquisition tier failed");
                    if tier == AcquisitionTier::DefaultVideo {
                        video_error = Some(e.clone());
                    }
                    last_error = Some(e);
                }
            }
        }

        let reason = video_error
            .or(last_error)
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no capture devices".to_string());
        Err(CallError::MediaUnavailable {
            reason,
            hint: UNAVAILABLE_HINT.to_string(),
        })
    }
}
