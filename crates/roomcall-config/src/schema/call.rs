//! Call behaviour and chat settings.

use serde::{Deserialize, Serialize};

/// Session-level call behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CallConfig {
    /// Display name used when none is given on the command line.
    pub display_name: String,
    /// Pause before dialing a freshly joined peer, in milliseconds
    /// (valid range: 0-10000).
    pub settle_delay_ms: u32,
}

impl Default for CallConfig {
    fn default() -> Self {
        Self {
            display_name: String::new(),
            settle_delay_ms: 1_000,
        }
    }
}

/// Chat history settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Messages kept in memory (valid range: 10-10000).
    pub history_limit: u32,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self { history_limit: 500 }
    }
}
