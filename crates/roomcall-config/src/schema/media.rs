//! Local media acquisition settings.

use serde::{Deserialize, Serialize};

/// Constraints for the first (low resolution) acquisition tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Ideal capture width in pixels (valid range: 160-1920).
    pub low_res_width: u32,
    /// Ideal capture height in pixels (valid range: 120-1080).
    pub low_res_height: u32,
    /// Ideal frame rate (valid range: 1-60).
    pub low_res_frame_rate: u32,
    /// Skip the video tiers and join with a microphone only.
    pub audio_only: bool,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            low_res_width: 320,
            low_res_height: 240,
            low_res_frame_rate: 15,
            audio_only: false,
        }
    }
}
