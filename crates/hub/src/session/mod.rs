//! Per-connection session tasks.
//!
//! - `ingest` - one task per producer connection, feeds the registry
//! - `viewport` - broadcaster + bounds-listener pair per consumer connection

pub mod ingest;
pub mod viewport;

use crate::HubError;
use axum::extract::ws::Message;
use bus_tracker_core::{decode, decode_bytes, ServerMessage, Validate, ValidationError};
use futures_util::{Sink, SinkExt};
use std::fmt;

/// Identifier assigned to each accepted connection.
pub type SessionId = u64;

/// Which endpoint a session was accepted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionKind {
    /// Bus reporting positions.
    Producer,
    /// Browser watching a viewport.
    Consumer,
}

impl fmt::Display for SessionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionKind::Producer => f.write_str("producer"),
            SessionKind::Consumer => f.write_str("consumer"),
        }
    }
}

/// What an inbound WebSocket frame means to a session.
#[derive(Debug)]
pub(crate) enum Inbound<T> {
    /// A data frame, validated as `T`.
    Message(Result<T, ValidationError>),
    /// The peer is closing the connection.
    Close,
    /// Ping/pong; handled by the transport.
    Control,
}

/// Classify a frame and validate its payload as message kind `T`.
pub(crate) fn classify<T: Validate>(frame: Message) -> Inbound<T> {
    match frame {
        Message::Text(text) => Inbound::Message(decode(&text)),
        Message::Binary(data) => Inbound::Message(decode_bytes(&data)),
        Message::Close(_) => Inbound::Close,
        Message::Ping(_) | Message::Pong(_) => Inbound::Control,
    }
}

/// Encode and send one envelope as a text frame.
pub(crate) async fn send_message<S>(sink: &mut S, msg: &ServerMessage) -> Result<(), HubError>
where
    S: Sink<Message, Error = axum::Error> + Unpin,
{
    let json = msg.to_json()?;
    sink.send(Message::Text(json)).await?;
    Ok(())
}
