//! Hub supervisor: binds both endpoints and supervises sessions.
//!
//! Every upgraded connection runs as its own task, tracked in the session
//! table so shutdown can cancel it. A session that fails or panics is logged
//! and forgotten; the supervisor and other sessions keep running.

use crate::session::{ingest, viewport, SessionKind};
use crate::state::{create_state, SharedState};
use crate::{HubConfig, HubError};
use axum::{
    extract::{
        ws::{WebSocket, WebSocketUpgrade},
        ConnectInfo, State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use std::future::Future;
use std::time::Duration;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, error, info, warn};

/// How long stopped endpoints get to close their open HTTP connections.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Bound but not yet serving hub.
pub struct Hub {
    state: SharedState,
    bus_listener: TcpListener,
    browser_listener: TcpListener,
}

impl Hub {
    /// Bind the producer and consumer endpoints and create the registry.
    pub async fn bind(config: HubConfig) -> Result<Self, HubError> {
        let bus_addr = config.bus_addr();
        let bus_listener = TcpListener::bind(&bus_addr)
            .await
            .map_err(|source| HubError::Bind {
                endpoint: "bus",
                addr: bus_addr,
                source,
            })?;

        let browser_addr = config.browser_addr();
        let browser_listener =
            TcpListener::bind(&browser_addr)
                .await
                .map_err(|source| HubError::Bind {
                    endpoint: "browser",
                    addr: browser_addr,
                    source,
                })?;

        Ok(Self {
            state: create_state(config),
            bus_listener,
            browser_listener,
        })
    }

    /// Address producers connect to.
    pub fn bus_addr(&self) -> Result<SocketAddr, HubError> {
        Ok(self.bus_listener.local_addr()?)
    }

    /// Address consumers connect to.
    pub fn browser_addr(&self) -> Result<SocketAddr, HubError> {
        Ok(self.browser_listener.local_addr()?)
    }

    /// Shared state handle (registry, stats, sessions).
    pub fn state(&self) -> SharedState {
        self.state.clone()
    }

    /// Serve both endpoints until `shutdown` resolves or a listener fails,
    /// then abort every live session.
    pub async fn serve<F>(self, shutdown: F) -> Result<(), HubError>
    where
        F: Future<Output = ()> + Send,
    {
        let Hub {
            state,
            bus_listener,
            browser_listener,
        } = self;

        info!(
            "Bus endpoint listening on ws://{}",
            bus_listener.local_addr()?
        );
        info!(
            "Browser endpoint listening on ws://{}",
            browser_listener.local_addr()?
        );

        state.start();
        let reporter = tokio::spawn(run_stats_reporter(state.clone()));

        let mut endpoints = JoinSet::new();
        endpoints.spawn(run_endpoint(
            bus_listener,
            create_bus_router(state.clone()),
            state.shutdown_signal(),
        ));
        endpoints.spawn(run_endpoint(
            browser_listener,
            create_browser_router(state.clone()),
            state.shutdown_signal(),
        ));

        let result = tokio::select! {
            joined = endpoints.join_next() => match joined {
                Some(Ok(res)) => res,
                Some(Err(e)) => Err(HubError::Panicked(e.to_string())),
                None => Ok(()),
            },
            _ = shutdown => Ok(()),
        };

        // Wakes the endpoints' graceful shutdown and every session.
        state.stop();
        reporter.abort();

        let aborted = state.abort_all_sessions();
        info!("Hub stopped, {} session(s) cancelled", aborted);

        let drained = tokio::time::timeout(DRAIN_TIMEOUT, async {
            while endpoints.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            warn!("Endpoints still busy after {:?}, closing them", DRAIN_TIMEOUT);
            endpoints.shutdown().await;
        }

        if let Err(e) = &result {
            error!("Hub server error: {}", e);
        }
        result
    }
}

/// Serve one endpoint until it fails or `shutdown` resolves.
async fn run_endpoint<F>(
    listener: TcpListener,
    router: Router,
    shutdown: F,
) -> Result<(), HubError>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await?;
    Ok(())
}

/// Router for the producer endpoint. Any path upgrades to a bus session.
pub fn create_bus_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .fallback(bus_ws_handler)
        .layer(cors())
        .with_state(state)
}

/// Router for the consumer endpoint. Any path upgrades to a viewport session.
pub fn create_browser_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .fallback(browser_ws_handler)
        .layer(cors())
        .with_state(state)
}

fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Health check handler.
async fn health_handler() -> &'static str {
    "OK"
}

async fn bus_ws_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    State(state): State<SharedState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| supervise(state, SessionKind::Producer, peer, socket))
}

async fn browser_ws_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    State(state): State<SharedState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| supervise(state, SessionKind::Consumer, peer, socket))
}

/// Spawn one session, track it, and log how it ended.
///
/// The session races the hub's shutdown signal, so one that starts after
/// shutdown (e.g. a handshake that completed late) ends right away.
async fn supervise(state: SharedState, kind: SessionKind, peer: SocketAddr, socket: WebSocket) {
    let registry = state.registry.clone();
    let stats = state.stats.clone();
    let period = state.config.broadcast_interval();
    let stopped = state.shutdown_signal();

    let handle = tokio::spawn(async move {
        let session = async move {
            match kind {
                SessionKind::Producer => ingest::run(socket, registry, stats).await,
                SessionKind::Consumer => viewport::run(socket, registry, stats, period).await,
            }
        };
        tokio::select! {
            biased;
            _ = stopped => {
                debug!("{} session from {} closed by hub shutdown", kind, peer);
                Ok(())
            }
            result = session => result,
        }
    });
    let id = state.register_session(kind, peer, handle.abort_handle());
    debug!("{} session {} connected from {}", kind, id, peer);

    match handle.await {
        Ok(Ok(())) => debug!("{} session {} from {} ended", kind, id, peer),
        Ok(Err(e)) => warn!("{} session {} from {} ended: {}", kind, id, peer, e),
        Err(e) if e.is_cancelled() => debug!("{} session {} cancelled", kind, id),
        Err(e) => error!("{} session {} from {} panicked: {}", kind, id, peer, e),
    }

    state.remove_session(id);
}

/// Log a stats line every `stats_interval_secs` while the hub runs.
async fn run_stats_reporter(state: SharedState) {
    let mut ticker = tokio::time::interval(state.config.stats_interval());
    // The first tick completes immediately.
    ticker.tick().await;

    while state.is_running() {
        ticker.tick().await;

        let summary = state.stats_summary();
        info!(
            "📊 Stats | Uptime: {}s | Buses: {} | Producers: {} | Consumers: {} | Reports: {} ok / {} rejected | Bounds: {} ok / {} rejected | Broadcasts: {}",
            summary.uptime_secs,
            summary.buses_tracked,
            summary.producers,
            summary.consumers,
            summary.reports_accepted,
            summary.reports_rejected,
            summary.bounds_accepted,
            summary.bounds_rejected,
            summary.broadcasts_sent
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ephemeral() -> HubConfig {
        HubConfig {
            bus_port: 0,
            browser_port: 0,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_bind_ephemeral_ports() {
        let hub = Hub::bind(ephemeral()).await.unwrap();
        let bus = hub.bus_addr().unwrap();
        let browser = hub.browser_addr().unwrap();
        assert_ne!(bus.port(), 0);
        assert_ne!(browser.port(), 0);
        assert_ne!(bus.port(), browser.port());
    }

    #[tokio::test]
    async fn test_bind_conflict_reports_endpoint() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let config = HubConfig {
            bus_port: taken.local_addr().unwrap().port(),
            browser_port: 0,
            ..Default::default()
        };

        match Hub::bind(config).await {
            Err(HubError::Bind { endpoint, .. }) => assert_eq!(endpoint, "bus"),
            Err(other) => panic!("unexpected error {other}"),
            Ok(_) => panic!("bind should fail on a taken port"),
        }
    }

    #[tokio::test]
    async fn test_serve_stops_on_shutdown() {
        let hub = Hub::bind(ephemeral()).await.unwrap();
        let state = hub.state();

        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let server = tokio::spawn(hub.serve(async move {
            let _ = rx.await;
        }));

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(state.is_running());

        tx.send(()).unwrap();
        let result = tokio::time::timeout(std::time::Duration::from_secs(5), server)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
        assert!(!state.is_running());
    }
}
