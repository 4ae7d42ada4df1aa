//! Configuration schema types for roomcall.
//!
//! All structs use `serde(default)` so partial configs work correctly.

mod call;
mod logging;
mod media;
mod signaling;

pub use call::*;
pub use logging::*;
pub use media::*;
pub use signaling::*;

use serde::{Deserialize, Serialize};

/// Root configuration.
///
/// Only override what you want to change.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomcallConfig {
    pub signaling: SignalingConfig,
    pub call: CallConfig,
    pub media: MediaConfig,
    pub chat: ChatConfig,
    pub logging: LoggingConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_signaling_defaults() {
        let config = RoomcallConfig::default();
        assert_eq!(config.signaling.room_id, "main-room");
        assert_eq!(config.signaling.connect_timeout_secs, 15);
        assert_eq!(config.signaling.reconnect_delay_ms, 1_000);
        assert_eq!(config.signaling.max_reconnect_delay_ms, 30_000);
        assert_eq!(config.signaling.initial_connect_attempts, 8);
    }

    #[test]
    fn default_config_has_call_defaults() {
        let config = RoomcallConfig::default();
        assert_eq!(config.call.settle_delay_ms, 1_000);
        assert!(config.call.display_name.is_empty());
        assert_eq!(config.chat.history_limit, 500);
    }

    #[test]
    fn default_config_has_low_res_tier() {
        let config = RoomcallConfig::default();
        assert_eq!(config.media.low_res_width, 320);
        assert_eq!(config.media.low_res_height, 240);
        assert_eq!(config.media.low_res_frame_rate, 15);
        assert!(!config.media.audio_only);
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let config: RoomcallConfig = toml::from_str(
            r#"
[call]
settle_delay_ms = 250
"#,
        )
        .unwrap();
        assert_eq!(config.call.settle_delay_ms, 250);
        assert_eq!(config.signaling.room_id, "main-room");
        assert_eq!(config.logging.level, "roomcall=info");
    }

    #[test]
    fn config_serializes_to_json() {
        let config = RoomcallConfig::default();
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["signaling"]["room_id"], "main-room");
        assert_eq!(json["media"]["low_res_width"], 320);
    }
}
