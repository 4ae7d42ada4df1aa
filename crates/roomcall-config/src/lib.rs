//! roomcall configuration system.
//!
//! Provides TOML-based configuration with validation. All config sections
//! use defaults so partial configs work out of the box.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use roomcall_config::load_config;
//!
//! let config = load_config().expect("failed to load config");
//! println!("room: {}", config.signaling.room_id);
//! ```

pub mod schema;
pub mod toml_loader;
pub mod validation;

pub use schema::RoomcallConfig;

use roomcall_common::ConfigError;
use std::path::Path;

/// Load config from the platform default path, creating it on first run,
/// and validate the result.
pub fn load_config() -> Result<RoomcallConfig, ConfigError> {
    let config = toml_loader::load_default()?;
    validation::validate(&config)?;
    Ok(config)
}

/// Load and validate config from an explicit path.
pub fn load_config_from(path: &Path) -> Result<RoomcallConfig, ConfigError> {
    let config = toml_loader::load_from_path(path)?;
    validation::validate(&config)?;
    Ok(config)
}

/// Serialize a config to a pretty-printed JSON string.
pub fn config_to_json(config: &RoomcallConfig) -> String {
    serde_json::to_string_pretty(config)
        .unwrap_or_else(|e| format!("{{\"error\": \"failed to serialize config: {e}\"}}"))
}
