//! Load host config from a TOML file, falling back to defaults.

use std::path::{Path, PathBuf};

use anyhow::Context;
use gateway_core::GatewayConfig;
use serde::Deserialize;

/// Host configuration. The `[gateway]` table holds the protocol settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HostConfig {
    /// Origin of the local context (default "http://localhost").
    #[serde(default = "default_origin")]
    pub origin: String,
    /// Directory receiving artifacts (default "./gateway-artifacts").
    #[serde(default = "default_artifact_dir")]
    pub artifact_dir: PathBuf,
    #[serde(default)]
    pub gateway: GatewayConfig,
}

fn default_origin() -> String {
    "http://localhost".to_owned()
}
fn default_artifact_dir() -> PathBuf {
    PathBuf::from("gateway-artifacts")
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            origin: default_origin(),
            artifact_dir: default_artifact_dir(),
            gateway: GatewayConfig::default(),
        }
    }
}

impl HostConfig {
    pub fn from_toml_str(s: &str) -> anyhow::Result<Self> {
        let cfg: HostConfig = toml::from_str(s).context("parsing host config")?;
        cfg.gateway.validate()?;
        Ok(cfg)
    }
}

/// Load config from `path`. A missing file yields defaults; an unreadable or invalid one is an error.
pub fn load(path: &Path) -> anyhow::Result<HostConfig> {
    if !path.exists() {
        tracing::info!(path = %path.display(), "no config file, using defaults");
        return Ok(HostConfig::default());
    }
    let s = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    HostConfig::from_toml_str(&s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg.origin, "http://localhost");
        assert_eq!(cfg.gateway, GatewayConfig::default());
    }

    #[test]
    fn file_overrides_nested_gateway_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("host.toml");
        std::fs::write(
            &path,
            "origin = \"https://app.example\"\n\n[gateway]\nheartbeat_interval_ms = 100\neviction_after_missed = 2\n",
        )
        .unwrap();
        let cfg = load(&path).unwrap();
        assert_eq!(cfg.origin, "https://app.example");
        assert_eq!(cfg.gateway.heartbeat_interval_ms, 100);
        assert_eq!(cfg.gateway.eviction_after_missed, Some(2));
        assert_eq!(cfg.gateway.file_suffix, ".gatewayware.dwl");
    }

    #[test]
    fn invalid_gateway_settings_are_errors() {
        assert!(HostConfig::from_toml_str("[gateway]\nheartbeat_interval_ms = 0").is_err());
        assert!(HostConfig::from_toml_str("proxy_port = 3128").is_err());
    }
}
