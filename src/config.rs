//! Sensor configuration
//!
//! TOML file with one section per concern; every section and field has
//! a default so a missing file or empty section still yields a working
//! sensor.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub sessions: SessionsConfig,

    #[serde(default)]
    pub events: EventsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Qualified event output file (NDJSON).
    pub log_file: PathBuf,
    /// Capacity of each per-protocol event channel.
    pub channel_capacity: usize,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_file: PathBuf::from("nightjar.ndjson"),
            channel_capacity: 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    /// Seconds of inactivity before a flow's session is evicted.
    pub idle_timeout_secs: u64,
    /// Seconds between eviction sweeps.
    pub flush_interval_secs: u64,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: 30,
            flush_interval_secs: 30,
        }
    }
}

impl SessionsConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_secs)
    }
}

/// Payload capture limits for output records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsConfig {
    pub max_tcp_data_size: usize,
    pub max_udp_data_size: usize,
    pub max_http_body_size: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            max_tcp_data_size: 1024,
            max_udp_data_size: 1024,
            max_http_body_size: 4096,
        }
    }
}

impl Config {
    /// Load configuration from a file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read config file: {}", path.as_ref().display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.as_ref().display()))?;
        Ok(config)
    }

    /// Load from an explicit path, or fall back to defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }
}
