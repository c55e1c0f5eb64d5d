//! Gateway configuration. Every field has a default; TOML input may override any of them.

use std::time::Duration;

use serde::Deserialize;

use crate::files::DEFAULT_FILE_SUFFIX;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Period between heartbeat ticks, in milliseconds (default 5000).
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
    /// Evict a peer after this many ticks without a heartbeat. Unset: never evict.
    #[serde(default)]
    pub eviction_after_missed: Option<u32>,
    /// Suffix appended to storage keys for FILE_TRANSFER names.
    #[serde(default = "default_file_suffix")]
    pub file_suffix: String,
}

fn default_heartbeat_interval_ms() -> u64 {
    5000
}
fn default_file_suffix() -> String {
    DEFAULT_FILE_SUFFIX.to_owned()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            eviction_after_missed: None,
            file_suffix: default_file_suffix(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("heartbeat_interval_ms must be greater than zero")]
    ZeroInterval,
}

impl GatewayConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let cfg: GatewayConfig = toml::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.heartbeat_interval_ms == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        Ok(())
    }
}
