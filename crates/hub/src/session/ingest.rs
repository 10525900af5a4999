//! Producer session: reads position reports and feeds the registry.
//!
//! A report that fails validation is answered with an `Errors` envelope and
//! the connection stays open. Accepted reports get no reply.

use super::{classify, send_message, Inbound};
use crate::registry::Registry;
use crate::stats::HubStats;
use crate::HubError;
use axum::extract::ws::WebSocket;
use bus_tracker_core::{Bus, ServerMessage, ValidationError};
use futures_util::StreamExt;
use std::sync::Arc;
use tracing::debug;

/// Run one producer connection until the peer goes away.
pub async fn run(
    socket: WebSocket,
    registry: Arc<Registry>,
    stats: Arc<HubStats>,
) -> Result<(), HubError> {
    let (mut sender, mut receiver) = socket.split();

    while let Some(frame) = receiver.next().await {
        let result = match classify::<Bus>(frame?) {
            Inbound::Message(result) => result,
            Inbound::Close => break,
            Inbound::Control => continue,
        };

        if let Some(reply) = apply_report(result, &registry, &stats) {
            send_message(&mut sender, &reply).await?;
        }
    }

    Ok(())
}

/// Apply one validated report. Returns the reply to send, if any.
pub(crate) fn apply_report(
    result: Result<Bus, ValidationError>,
    registry: &Registry,
    stats: &HubStats,
) -> Option<ServerMessage> {
    match result {
        Ok(bus) => {
            registry.upsert(bus);
            stats.record_report_accepted();
            None
        }
        Err(err) => {
            debug!("Rejected position report: {}", err);
            stats.record_report_rejected();
            Some(ServerMessage::from(&err))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bus_tracker_core::{decode, FieldError, MISSING_FIELD};
    use pretty_assertions::assert_eq;
    use std::sync::atomic::Ordering;

    #[test]
    fn test_apply_valid_report_is_silent() {
        let registry = Registry::new();
        let stats = HubStats::new();

        let reply = apply_report(
            decode(r#"{"busId":"A1","lat":55.0,"lng":37.0,"route":"5"}"#),
            &registry,
            &stats,
        );

        assert!(reply.is_none());
        assert_eq!(registry.get("A1"), Some(Bus::new("A1", 55.0, 37.0, "5")));
        assert_eq!(stats.reports_accepted.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_apply_invalid_report_replies_and_leaves_registry() {
        let registry = Registry::new();
        registry.upsert(Bus::new("A1", 1.0, 1.0, "5"));
        let stats = HubStats::new();

        let reply = apply_report(
            decode(r#"{"lat": 11, "lng": 12, "route": "abc"}"#),
            &registry,
            &stats,
        );

        assert_eq!(
            reply,
            Some(ServerMessage::errors(vec![FieldError::new("busId", MISSING_FIELD)]))
        );
        assert_eq!(registry.snapshot(), vec![Bus::new("A1", 1.0, 1.0, "5")]);
        assert_eq!(stats.reports_rejected.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_apply_malformed_report() {
        let registry = Registry::new();
        let stats = HubStats::new();

        let reply = apply_report(decode("Test message"), &registry, &stats);
        match reply {
            Some(ServerMessage::Errors { errors }) => {
                assert_eq!(errors.len(), 1);
                assert_eq!(errors[0].field, "_payload");
            }
            other => panic!("expected errors envelope, got {other:?}"),
        }
        assert!(registry.is_empty());
    }
}
