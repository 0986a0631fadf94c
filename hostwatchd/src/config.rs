use std::path::Path;
use std::time::Duration;
use serde::Deserialize;
use anyhow::{Context, Result};
use shared::protocol::{
    TYPE_AIRPLAY, TYPE_AIRPORT, TYPE_GOOGLECAST, TYPE_HOME_ASSISTANT, TYPE_HOMEKIT,
    TYPE_HOSTWATCH, TYPE_HTTP, TYPE_HTTPS, TYPE_IPP, TYPE_SLEEP_PROXY, TYPE_SMB, TYPE_SONOS,
    TYPE_SSH,
};

/// Types browsed from the start, before the meta-query reports anything
const SEED_TYPES: &[&str] = &[
    TYPE_AIRPLAY,
    TYPE_AIRPORT,
    TYPE_SLEEP_PROXY,
    TYPE_HOME_ASSISTANT,
    TYPE_HOMEKIT,
    TYPE_SSH,
    TYPE_SMB,
    TYPE_IPP,
    TYPE_GOOGLECAST,
    TYPE_HOSTWATCH,
    TYPE_SONOS,
    TYPE_HTTP,
    TYPE_HTTPS,
];

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub advertise: AdvertiseConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscoveryMode {
    #[default]
    Mdns,
    /// Hardcoded fixture set instead of the network
    Demo,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscoveryConfig {
    #[serde(default)]
    pub mode: DiscoveryMode,
    /// Restrict mDNS to a single interface
    #[serde(default)]
    pub interface: Option<String>,
    /// Browsed in addition to the built-in seed types
    #[serde(default)]
    pub service_types: Vec<String>,
    /// Stopped longer than this, clustering evidence is thrown away on start
    #[serde(default = "default_stale_after")]
    pub stale_after_secs: u64,
    #[serde(default = "default_restart_delay")]
    pub restart_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdvertiseConfig {
    #[serde(default = "default_advertise")]
    pub enabled: bool,
    /// Defaults to "hostwatch-<hostname>"
    #[serde(default)]
    pub instance: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_listen")]
    pub listen: String,
}

/// Debug builds go stale quickly so the reset path gets exercised
fn default_stale_after() -> u64 {
    if cfg!(debug_assertions) {
        10
    } else {
        300
    }
}

fn default_restart_delay() -> u64 {
    500
}

fn default_advertise() -> bool {
    true
}

fn default_listen() -> String {
    "[::]:8054".to_string()
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            mode: DiscoveryMode::default(),
            interface: None,
            service_types: Vec::new(),
            stale_after_secs: default_stale_after(),
            restart_delay_ms: default_restart_delay(),
        }
    }
}

impl Default for AdvertiseConfig {
    fn default() -> Self {
        Self {
            enabled: default_advertise(),
            instance: None,
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

impl DiscoveryConfig {
    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.stale_after_secs)
    }

    pub fn restart_delay(&self) -> Duration {
        Duration::from_millis(self.restart_delay_ms)
    }

    /// Built-in seed types followed by configured extras, deduplicated
    pub fn browse_types(&self) -> Vec<String> {
        let mut types: Vec<String> = SEED_TYPES.iter().map(|t| t.to_string()).collect();
        for extra in &self.service_types {
            if !types.contains(extra) {
                types.push(extra.clone());
            }
        }
        types
    }
}

impl ApiConfig {
    pub fn port(&self) -> u16 {
        self.listen
            .rsplit(':')
            .next()
            .and_then(|s| s.parse::<u16>().ok())
            .unwrap_or(8054)
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        Ok(config)
    }
}
