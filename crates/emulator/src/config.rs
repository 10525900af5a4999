//! Emulator configuration.

use crate::EmulatorError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Emulator configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmulatorConfig {
    /// Producer endpoint of the hub (e.g., "ws://127.0.0.1:8080").
    pub server_url: String,
    /// Directory holding `*.json` route files.
    pub routes_dir: PathBuf,
    /// Maximum number of route files to load. `None` loads all of them.
    pub routes_number: Option<usize>,
    /// Emulated buses per route.
    pub buses_per_route: usize,
    /// Producer connections the buses are spread over.
    pub websockets_number: usize,
    /// Prefix for bus ids, so several emulators can feed one hub.
    pub emulator_id: Option<String>,
    /// Delay between two waypoints of one bus.
    pub refresh_interval_ms: u64,
    /// Pause after each report sent on one connection.
    pub send_interval_ms: u64,
    /// Delay before reopening a dropped connection.
    pub reconnect_delay_ms: u64,
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            server_url: "ws://127.0.0.1:8080".to_string(),
            routes_dir: PathBuf::from("routes"),
            routes_number: Some(10),
            buses_per_route: 10,
            websockets_number: 5,
            emulator_id: None,
            refresh_interval_ms: 1000,
            send_interval_ms: 1000,
            reconnect_delay_ms: 5000,
        }
    }
}

impl EmulatorConfig {
    /// Check the server URL is a WebSocket URL.
    pub fn validate(&self) -> Result<Url, EmulatorError> {
        let url = Url::parse(&self.server_url)?;
        match url.scheme() {
            "ws" | "wss" => Ok(url),
            other => Err(EmulatorError::InvalidUrl(format!(
                "unsupported scheme '{other}', expected ws or wss"
            ))),
        }
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    pub fn send_interval(&self) -> Duration {
        Duration::from_millis(self.send_interval_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}
