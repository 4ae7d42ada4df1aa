//! Full configuration validation.
//!
//! Each section has its own validator; this entry point calls them all
//! and collects errors into a single `ConfigError`.

mod helpers;
mod sections;


use crate::schema::RoomcallConfig;
use roomcall_common::ConfigError;

/// Run all validations on a config, collecting all errors.
pub fn validate(config: &RoomcallConfig) -> Result<(), ConfigError> {
    let mut errors: Vec<String> = Vec::new();

    sections::validate_signaling(&mut errors, config);
    sections::validate_call(&mut errors, config);
    sections::validate_media(&mut errors, config);
    sections::validate_chat(&mut errors, config);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(errors.join("; ")))
    }
}
