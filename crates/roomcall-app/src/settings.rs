//! Turns the loaded config plus CLI overrides into runtime settings.

use std::time::Duration;

use roomcall_config::RoomcallConfig;
use roomcall_core::{AcquirerConfig, SessionConfig, SignalingConfig};

use crate::cli::Args;

pub struct Settings {
    pub display_name: String,
    pub session: SessionConfig,
    pub signaling: SignalingConfig,
}

/// Command-line flags win over the config file.
pub fn apply_overrides(config: &mut RoomcallConfig, args: &Args) {
    if let Some(server) = &args.server {
        config.signaling.server_url = server.clone();
    }
    if let Some(room) = &args.room {
        config.signaling.room_id = room.clone();
    }
    if let Some(name) = &args.name {
        config.call.display_name = name.clone();
    }
    if args.audio_only {
        config.media.audio_only = true;
    }
}

pub fn resolve(config: &RoomcallConfig) -> Settings {
    let session = SessionConfig {
        room_id: config.signaling.room_id.clone(),
        settle_delay: Duration::from_millis(u64::from(config.call.settle_delay_ms)),
        chat_history_limit: config.chat.history_limit as usize,
        media: AcquirerConfig {
            low_res_width: config.media.low_res_width,
            low_res_height: config.media.low_res_height,
            low_res_frame_rate: config.media.low_res_frame_rate,
            audio_only: config.media.audio_only,
        },
    };

    let signaling = SignalingConfig {
        server_url: config.signaling.server_url.clone(),
        connect_timeout: Duration::from_secs(u64::from(config.signaling.connect_timeout_secs)),
        heartbeat_interval: Duration::from_secs(u64::from(
            config.signaling.heartbeat_interval_secs,
        )),
        reconnect_delay: Duration::from_millis(u64::from(config.signaling.reconnect_delay_ms)),
        max_reconnect_delay: Duration::from_millis(u64::from(
            config.signaling.max_reconnect_delay_ms,
        )),
        initial_connect_attempts: config.signaling.initial_connect_attempts,
    };

    Settings {
        display_name: config.call.display_name.trim().to_string(),
        session,
        signaling,
    }
}
