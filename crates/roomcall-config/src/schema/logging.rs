//! Logging settings.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing` filter directive used when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "roomcall=info".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_defaults_to_roomcall_info() {
        assert_eq!(LoggingConfig::default().level, "roomcall=info");
    }

    #[test]
    fn level_reads_from_toml() {
        let config: LoggingConfig = toml::from_str("level = \"roomcall=debug,tokio=warn\"").unwrap();
        assert_eq!(config.level, "roomcall=debug,tokio=warn");
    }
}
