//! Validation for the signaling, call, media and chat sections.

use crate::schema::RoomcallConfig;

use super::helpers::{validate_non_empty, validate_range};

/// Validate signaling constraints.
pub(crate) fn validate_signaling(errors: &mut Vec<String>, config: &RoomcallConfig) {
    let s = &config.signaling;
    validate_non_empty(errors, "signaling.server_url", &s.server_url);
    if !s.server_url.is_empty()
        && !(s.server_url.starts_with("ws://") || s.server_url.starts_with("wss://"))
    {
        errors.push(format!(
            "signaling.server_url = {} must use ws:// or wss://",
            s.server_url
        ));
    }
    validate_non_empty(errors, "signaling.room_id", &s.room_id);
    validate_range(errors, "signaling.connect_timeout_secs", s.connect_timeout_secs, 1, 120);
    validate_range(
        errors,
        "signaling.heartbeat_interval_secs",
        s.heartbeat_interval_secs,
        5,
        300,
    );
    validate_range(
        errors,
        "signaling.initial_connect_attempts",
        s.initial_connect_attempts,
        1,
        100,
    );
    if s.reconnect_delay_ms == 0 {
        errors.push("signaling.reconnect_delay_ms must be greater than 0".into());
    }
    if s.max_reconnect_delay_ms < s.reconnect_delay_ms {
        errors.push(format!(
            "signaling.max_reconnect_delay_ms = {} is below reconnect_delay_ms = {}",
            s.max_reconnect_delay_ms, s.reconnect_delay_ms
        ));
    }
}

/// Validate call constraints.
pub(crate) fn validate_call(errors: &mut Vec<String>, config: &RoomcallConfig) {
    validate_range(
        errors,
        "call.settle_delay_ms",
        config.call.settle_delay_ms,
        0,
        10_000,
    );
}

/// Validate media constraints.
pub(crate) fn validate_media(errors: &mut Vec<String>, config: &RoomcallConfig) {
    let m = &config.media;
    validate_range(errors, "media.low_res_width", m.low_res_width, 160, 1920);
    validate_range(errors, "media.low_res_height", m.low_res_height, 120, 1080);
    validate_range(errors, "media.low_res_frame_rate", m.low_res_frame_rate, 1, 60);
}

/// Validate chat constraints.
pub(crate) fn validate_chat(errors: &mut Vec<String>, config: &RoomcallConfig) {
    validate_range(
        errors,
        "chat.history_limit",
        config.chat.history_limit,
        10,
        10_000,
    );
}
