//! Consumer session: streams the buses inside a private viewport.
//!
//! Each connection runs two sibling tasks in one [`JoinSet`]:
//!
//! - the **broadcaster** owns the outbound half, sends a `Buses` message
//!   every tick and relays error replies;
//! - the **listener** owns the inbound half and applies `newBounds` updates.
//!
//! The viewport lives in a `watch` channel, so every update replaces the
//! whole box at once. When either task ends the other is aborted, and
//! dropping the session aborts both.

use super::{classify, send_message, Inbound};
use crate::registry::Registry;
use crate::stats::HubStats;
use crate::HubError;
use axum::extract::ws::{Message, WebSocket};
use bus_tracker_core::{ClientMessage, ServerMessage, ValidationError, Viewport};
use futures_util::{Sink, Stream, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tracing::debug;

/// Error replies waiting for the broadcaster.
const REPLY_BUFFER: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SubTask {
    Broadcaster,
    Listener,
}

/// Run one consumer connection until either sub-task ends.
pub async fn run(
    socket: WebSocket,
    registry: Arc<Registry>,
    stats: Arc<HubStats>,
    period: Duration,
) -> Result<(), HubError> {
    let (sender, receiver) = socket.split();
    run_halves(sender, receiver, registry, stats, period).await
}

/// Run the broadcaster/listener pair over the two halves of a connection.
pub(crate) async fn run_halves<Si, St>(
    sender: Si,
    receiver: St,
    registry: Arc<Registry>,
    stats: Arc<HubStats>,
    period: Duration,
) -> Result<(), HubError>
where
    Si: Sink<Message, Error = axum::Error> + Unpin + Send + 'static,
    St: Stream<Item = Result<Message, axum::Error>> + Unpin + Send + 'static,
{
    let (viewport_tx, viewport_rx) = watch::channel(Viewport::unset());
    let (reply_tx, reply_rx) = mpsc::channel(REPLY_BUFFER);

    let mut tasks = JoinSet::new();
    {
        let stats = stats.clone();
        tasks.spawn(async move {
            let result =
                broadcast_loop(sender, registry, viewport_rx, reply_rx, stats, period).await;
            (SubTask::Broadcaster, result)
        });
    }
    tasks.spawn(async move {
        let result = listen_loop(receiver, viewport_tx, reply_tx, stats).await;
        (SubTask::Listener, result)
    });

    let first = tasks.join_next().await;
    tasks.shutdown().await;

    match first {
        Some(Ok((task, result))) => {
            debug!("Viewport session ended by {:?}", task);
            result
        }
        Some(Err(e)) => Err(HubError::Panicked(e.to_string())),
        None => Ok(()),
    }
}

/// Send the visible buses every `period`, and relay error replies in between.
async fn broadcast_loop<Si>(
    mut sender: Si,
    registry: Arc<Registry>,
    viewport: watch::Receiver<Viewport>,
    mut replies: mpsc::Receiver<ServerMessage>,
    stats: Arc<HubStats>,
    period: Duration,
) -> Result<(), HubError>
where
    Si: Sink<Message, Error = axum::Error> + Unpin,
{
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let current = *viewport.borrow();
                let update = visible_buses(&registry, &current);
                send_message(&mut sender, &update).await?;
                stats.record_broadcast();
            }
            reply = replies.recv() => match reply {
                Some(msg) => send_message(&mut sender, &msg).await?,
                None => return Ok(()),
            },
        }
    }
}

/// Apply bounds updates until the consumer goes away.
async fn listen_loop<St>(
    mut receiver: St,
    viewport: watch::Sender<Viewport>,
    replies: mpsc::Sender<ServerMessage>,
    stats: Arc<HubStats>,
) -> Result<(), HubError>
where
    St: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    while let Some(frame) = receiver.next().await {
        let result = match classify::<ClientMessage>(frame?) {
            Inbound::Message(result) => result,
            Inbound::Close => break,
            Inbound::Control => continue,
        };

        if let Some(reply) = apply_client_message(result, &viewport, &stats) {
            replies
                .send(reply)
                .await
                .map_err(|_| HubError::ChannelClosed)?;
        }
    }

    Ok(())
}

/// The `Buses` message for one tick.
pub(crate) fn visible_buses(registry: &Registry, viewport: &Viewport) -> ServerMessage {
    ServerMessage::buses(registry.within(viewport))
}

/// Apply one validated consumer message. Returns the reply to send, if any.
pub(crate) fn apply_client_message(
    result: Result<ClientMessage, ValidationError>,
    viewport: &watch::Sender<Viewport>,
    stats: &HubStats,
) -> Option<ServerMessage> {
    match result {
        Ok(ClientMessage::NewBounds(bounds)) => {
            viewport.send_replace(Viewport::from(bounds));
            stats.record_bounds_accepted();
            None
        }
        Err(err) => {
            debug!("Rejected bounds update: {}", err);
            stats.record_bounds_rejected();
            Some(ServerMessage::from(&err))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bus_tracker_core::{decode, Bounds, Bus, FieldError, MISSING_FIELD};
    use pretty_assertions::assert_eq;

    fn registry_with_a1() -> Registry {
        let registry = Registry::new();
        registry.upsert(Bus::new("A1", 55.0, 37.0, "5"));
        registry
    }

    #[test]
    fn test_unset_viewport_broadcasts_empty_list() {
        let registry = registry_with_a1();
        let msg = visible_buses(&registry, &Viewport::unset());
        assert_eq!(msg, ServerMessage::buses(Vec::new()));
        assert_eq!(msg.to_json().unwrap(), r#"{"msgType":"Buses","buses":[]}"#);
    }

    #[test]
    fn test_bounds_update_then_tick_includes_bus() {
        let registry = registry_with_a1();
        let stats = HubStats::new();
        let (tx, rx) = watch::channel(Viewport::unset());

        let raw = r#"{"msgType":"newBounds","data":{"south_lat":54.0,"north_lat":56.0,"west_lng":36.0,"east_lng":38.0}}"#;
        assert!(apply_client_message(decode(raw), &tx, &stats).is_none());

        let current = *rx.borrow();
        assert_eq!(
            visible_buses(&registry, &current),
            ServerMessage::buses(vec![Bus::new("A1", 55.0, 37.0, "5")])
        );
    }

    #[test]
    fn test_bounds_excluding_bus_yields_empty_list() {
        let registry = registry_with_a1();
        let stats = HubStats::new();
        let (tx, rx) = watch::channel(Viewport::unset());

        let raw = r#"{"msgType":"newBounds","data":{"south_lat":0,"north_lat":1,"west_lng":0,"east_lng":1}}"#;
        assert!(apply_client_message(decode(raw), &tx, &stats).is_none());

        let current = *rx.borrow();
        assert_eq!(visible_buses(&registry, &current), ServerMessage::buses(Vec::new()));
    }

    #[test]
    fn test_partial_bounds_keep_previous_viewport() {
        let stats = HubStats::new();
        let previous = Viewport::from(Bounds::new(54.0, 56.0, 36.0, 38.0));
        let (tx, rx) = watch::channel(previous);

        let raw = r#"{"msgType":"newBounds","data":{"south_lat":0,"north_lat":1,"west_lng":0}}"#;
        let reply = apply_client_message(decode(raw), &tx, &stats);

        assert_eq!(
            reply,
            Some(ServerMessage::errors(vec![FieldError::new(
                "data.east_lng",
                MISSING_FIELD
            )]))
        );
        assert_eq!(*rx.borrow(), previous);
    }

    #[test]
    fn test_malformed_bounds_keep_unset_viewport() {
        let stats = HubStats::new();
        let (tx, rx) = watch::channel(Viewport::unset());

        let reply = apply_client_message(decode("Test message"), &tx, &stats);
        assert!(matches!(reply, Some(ServerMessage::Errors { .. })));
        assert!(!rx.borrow().is_set());
    }

    #[tokio::test]
    async fn test_send_failure_stops_listener() {
        let failing = Box::pin(futures_util::sink::unfold((), |(), _frame: Message| async {
            Err::<(), _>(axum::Error::new("peer gone"))
        }));
        // Dropped together with the listener's inbound stream.
        let (alive_tx, alive_rx) = tokio::sync::oneshot::channel::<()>();
        let inbound = futures_util::stream::pending::<Result<Message, axum::Error>>().map(
            move |frame| {
                let _alive = &alive_tx;
                frame
            },
        );

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            run_halves(
                failing,
                inbound,
                Arc::new(registry_with_a1()),
                Arc::new(HubStats::new()),
                Duration::from_millis(10),
            ),
        )
        .await
        .unwrap();

        assert!(matches!(result, Err(HubError::Transport(_))));
        assert!(alive_rx.await.is_err());
    }
}
