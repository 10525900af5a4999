//! Error types for emulator operations.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while emulating buses.
#[derive(Debug, Error)]
pub enum EmulatorError {
    #[error("Failed to read routes from {}: {source}", path.display())]
    Routes {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid route file {}: {source}", path.display())]
    RouteParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("No routes found in {}", .0.display())]
    NoRoutes(PathBuf),

    #[error("Invalid server URL: {0}")]
    InvalidUrl(String),

    #[error("WebSocket connection failed: {0}")]
    ConnectionFailed(String),

    #[error("WebSocket disconnected: {0}")]
    Disconnected(String),

    #[error("Failed to encode report: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Channel closed")]
    ChannelClosed,

    #[error("Emulator task panicked: {0}")]
    Panicked(String),
}

impl From<tokio_tungstenite::tungstenite::Error> for EmulatorError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        EmulatorError::ConnectionFailed(err.to_string())
    }
}

impl From<url::ParseError> for EmulatorError {
    fn from(err: url::ParseError) -> Self {
        EmulatorError::InvalidUrl(err.to_string())
    }
}

impl EmulatorError {
    /// Returns true if this error is transient and the connection should be
    /// reopened after the reconnect delay.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            EmulatorError::ConnectionFailed(_) | EmulatorError::Disconnected(_)
        )
    }
}
