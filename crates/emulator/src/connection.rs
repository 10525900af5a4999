//! Reconnecting producer connection to the hub.

use crate::EmulatorError;
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

/// One producer connection shared by several buses.
///
/// Reports queue on `reports` while the connection is down and go out once
/// it is reopened, at most one per `send_interval`.
pub struct ProducerConnection {
    id: usize,
    url: String,
    reconnect_delay: Duration,
    send_interval: Duration,
    reports: mpsc::Receiver<String>,
}

impl ProducerConnection {
    pub fn new(
        id: usize,
        url: impl Into<String>,
        reconnect_delay: Duration,
        send_interval: Duration,
        reports: mpsc::Receiver<String>,
    ) -> Self {
        Self {
            id,
            url: url.into(),
            reconnect_delay,
            send_interval,
            reports,
        }
    }

    /// Forward reports until every sender is dropped, reconnecting after
    /// transient failures.
    pub async fn run(mut self) -> Result<(), EmulatorError> {
        loop {
            match self.connect_and_forward().await {
                Ok(()) => {
                    debug!("Connection {}: no buses left, closing", self.id);
                    return Ok(());
                }
                Err(e) if e.is_transient() => {
                    warn!(
                        "Connection {}: {}. Reconnecting in {:?}...",
                        self.id, e, self.reconnect_delay
                    );
                    tokio::time::sleep(self.reconnect_delay).await;
                }
                Err(e) => {
                    error!("Connection {}: {}", self.id, e);
                    return Err(e);
                }
            }
        }
    }

    async fn connect_and_forward(&mut self) -> Result<(), EmulatorError> {
        let (ws_stream, _) = connect_async(self.url.as_str()).await?;
        info!("Connection {}: connected to {}", self.id, self.url);

        let (mut write, mut read) = ws_stream.split();

        loop {
            tokio::select! {
                report = self.reports.recv() => match report {
                    Some(text) => {
                        write.send(Message::Text(text)).await?;
                        tokio::time::sleep(self.send_interval).await;
                    }
                    None => {
                        let _ = write.close().await;
                        return Ok(());
                    }
                },
                frame = read.next() => match frame {
                    Some(Ok(Message::Text(reply))) => {
                        warn!("Connection {}: hub rejected a report: {}", self.id, reply);
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        return Err(EmulatorError::Disconnected("closed by hub".to_string()));
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(EmulatorError::Disconnected(e.to_string())),
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;

    async fn next_text<S>(ws: &mut S) -> String
    where
        S: futures_util::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
    {
        loop {
            match ws.next().await {
                Some(Ok(Message::Text(text))) => return text,
                Some(Ok(_)) => continue,
                other => panic!("unexpected frame: {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_forwards_reports() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());

        let (tx, rx) = mpsc::channel(8);
        let conn = ProducerConnection::new(0, url, Duration::from_millis(10), Duration::ZERO, rx);
        let task = tokio::spawn(conn.run());

        let (stream, _) = listener.accept().await.unwrap();
        let mut server = accept_async(stream).await.unwrap();

        tx.send("one".to_string()).await.unwrap();
        tx.send("two".to_string()).await.unwrap();
        assert_eq!(next_text(&mut server).await, "one");
        assert_eq!(next_text(&mut server).await, "two");

        drop(tx);
        let result = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_reconnects_and_keeps_queue() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());

        let (tx, rx) = mpsc::channel(8);
        let conn = ProducerConnection::new(1, url, Duration::from_millis(10), Duration::ZERO, rx);
        let task = tokio::spawn(conn.run());

        // First connection is dropped by the hub side.
        let (stream, _) = listener.accept().await.unwrap();
        let mut first = accept_async(stream).await.unwrap();
        first.close(None).await.unwrap();
        // Wait until the client has seen the close and hung up.
        while let Some(Ok(_)) = first.next().await {}
        drop(first);

        // Queued while disconnected, delivered on the next connection.
        tx.send("after".to_string()).await.unwrap();

        let (stream, _) = listener.accept().await.unwrap();
        let mut second = accept_async(stream).await.unwrap();
        assert_eq!(next_text(&mut second).await, "after");

        drop(tx);
        let result = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_paces_queued_reports() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());

        let (tx, rx) = mpsc::channel(8);
        for n in 0..3 {
            tx.send(format!("report-{n}")).await.unwrap();
        }
        let pace = Duration::from_millis(100);
        let conn = ProducerConnection::new(2, url, Duration::from_millis(10), pace, rx);
        let task = tokio::spawn(conn.run());

        let (stream, _) = listener.accept().await.unwrap();
        let mut server = accept_async(stream).await.unwrap();

        assert_eq!(next_text(&mut server).await, "report-0");
        let first = tokio::time::Instant::now();
        assert_eq!(next_text(&mut server).await, "report-1");
        assert_eq!(next_text(&mut server).await, "report-2");
        // The third report trails the first by two pauses; allow for jitter.
        assert!(first.elapsed() >= pace);

        drop(tx);
        task.abort();
    }
}
