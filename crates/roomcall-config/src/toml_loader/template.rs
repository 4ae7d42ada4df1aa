//! Default TOML config template with inline documentation comments.

/// Generate the default TOML config content with comments.
pub(crate) fn default_config_toml() -> String {
    r##"# roomcall configuration
# Schema version 1
# Only override what you want to change -- missing fields use defaults.

[signaling]
server_url = "ws://127.0.0.1:3030/ws"
room_id = "main-room"
# connect_timeout_secs = 15        # 1-120
# heartbeat_interval_secs = 25     # 5-300
# reconnect_delay_ms = 1000
# max_reconnect_delay_ms = 30000
# initial_connect_attempts = 8     # 1-100

[call]
# display_name = ""
# settle_delay_ms = 1000           # 0-10000

[media]
# low_res_width = 320              # 160-1920
# low_res_height = 240             # 120-1080
# low_res_frame_rate = 15          # 1-60
# audio_only = false

[chat]
# history_limit = 500              # 10-10000

[logging]
# level = "roomcall=info"
"##
    .to_string()
}
