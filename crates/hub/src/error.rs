//! Error types for hub operations.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while running the hub or one of its sessions.
#[derive(Debug, Error)]
pub enum HubError {
    #[error("failed to bind {endpoint} endpoint on {addr}: {source}")]
    Bind {
        endpoint: &'static str,
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to read config {}: {source}", path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {}: {source}", path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("WebSocket transport error: {0}")]
    Transport(String),

    #[error("Failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Session task panicked: {0}")]
    Panicked(String),

    #[error("Channel closed")]
    ChannelClosed,
}

impl From<axum::Error> for HubError {
    fn from(err: axum::Error) -> Self {
        HubError::Transport(err.to_string())
    }
}
