//! Hub configuration.

use crate::HubError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Shortest broadcast period the hub will run with.
pub const MIN_BROADCAST_INTERVAL_MS: u64 = 10;

/// Hub configuration.
///
/// Every field has a default, so a config file only needs the keys it
/// wants to change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Interface both endpoints bind to.
    pub host: String,
    /// Producer (bus) endpoint port. 0 picks an ephemeral port.
    pub bus_port: u16,
    /// Consumer (browser) endpoint port. 0 picks an ephemeral port.
    pub browser_port: u16,
    /// Period between viewport broadcasts, per consumer.
    pub broadcast_interval_ms: u64,
    /// Period between stats log lines.
    pub stats_interval_secs: u64,
    /// Logging level.
    pub log_level: String,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            bus_port: 8080,
            browser_port: 8000,
            broadcast_interval_ms: 1000,
            stats_interval_secs: 60,
            log_level: "info".to_string(),
        }
    }
}

impl HubConfig {
    /// Load configuration from a JSON file.
    pub fn load(path: &Path) -> Result<Self, HubError> {
        let raw = std::fs::read_to_string(path).map_err(|source| HubError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| HubError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load configuration from a JSON file, falling back to defaults if the
    /// file does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self, HubError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn bus_addr(&self) -> String {
        format!("{}:{}", self.host, self.bus_port)
    }

    pub fn browser_addr(&self) -> String {
        format!("{}:{}", self.host, self.browser_port)
    }

    pub fn broadcast_interval(&self) -> Duration {
        Duration::from_millis(self.broadcast_interval_ms.max(MIN_BROADCAST_INTERVAL_MS))
    }

    pub fn stats_interval(&self) -> Duration {
        Duration::from_secs(self.stats_interval_secs.max(1))
    }
}
