//! Hub state shared by every connection handler.

use crate::config::HubConfig;
use crate::registry::Registry;
use crate::session::{SessionId, SessionKind};
use crate::stats::{HubStats, StatsSummary};
use dashmap::DashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tokio::task::AbortHandle;

/// Bookkeeping for one live connection.
#[derive(Debug)]
pub struct SessionInfo {
    pub kind: SessionKind,
    pub peer: SocketAddr,
    pub connected_at: Instant,
    abort: AbortHandle,
}

/// State shared across the supervisor and all sessions.
pub struct HubState {
    /// Configuration.
    pub config: HubConfig,
    /// Latest position per bus. The only domain data shared between sessions.
    pub registry: Arc<Registry>,
    /// Message counters.
    pub stats: Arc<HubStats>,
    /// Live sessions, used for shutdown and session counts.
    sessions: DashMap<SessionId, SessionInfo>,
    next_session_id: AtomicU64,
    /// Running flag.
    running: AtomicBool,
    /// Flips to `true` once when the hub stops.
    shutdown: watch::Sender<bool>,
}

impl HubState {
    pub fn new(config: HubConfig) -> Self {
        Self {
            config,
            registry: Arc::new(Registry::new()),
            stats: Arc::new(HubStats::new()),
            sessions: DashMap::new(),
            next_session_id: AtomicU64::new(1),
            running: AtomicBool::new(false),
            shutdown: watch::channel(false).0,
        }
    }

    pub fn start(&self) {
        self.running.store(true, Ordering::SeqCst);
        self.shutdown.send_replace(false);
    }

    /// Mark the hub stopped and wake every `shutdown_signal` future.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.shutdown.send_replace(true);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Resolves once the hub has stopped, immediately if it already has.
    pub fn shutdown_signal(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut stopped = self.shutdown.subscribe();
        async move {
            // An error means the state is gone, which counts as stopped.
            let _ = stopped.wait_for(|stopped| *stopped).await;
        }
    }

    /// Track a spawned session so it can be cancelled on shutdown.
    pub fn register_session(
        &self,
        kind: SessionKind,
        peer: SocketAddr,
        abort: AbortHandle,
    ) -> SessionId {
        let id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
        self.sessions.insert(
            id,
            SessionInfo {
                kind,
                peer,
                connected_at: Instant::now(),
                abort,
            },
        );
        id
    }

    /// Forget a finished session. Returns its info if it was still tracked.
    pub fn remove_session(&self, id: SessionId) -> Option<SessionInfo> {
        self.sessions.remove(&id).map(|(_, info)| info)
    }

    /// Number of live sessions of one kind.
    pub fn session_count(&self, kind: SessionKind) -> usize {
        self.sessions.iter().filter(|s| s.kind == kind).count()
    }

    /// Abort every live session. Returns how many were aborted.
    pub fn abort_all_sessions(&self) -> usize {
        let ids: Vec<SessionId> = self.sessions.iter().map(|s| *s.key()).collect();
        let mut aborted = 0;
        for id in ids {
            if let Some((_, info)) = self.sessions.remove(&id) {
                info.abort.abort();
                aborted += 1;
            }
        }
        aborted
    }

    /// Get statistics summary including live session counts.
    pub fn stats_summary(&self) -> StatsSummary {
        StatsSummary {
            buses_tracked: self.registry.len(),
            producers: self.session_count(SessionKind::Producer),
            consumers: self.session_count(SessionKind::Consumer),
            ..self.stats.summary()
        }
    }
}

/// Shared state handle.
pub type SharedState = Arc<HubState>;

/// Create shared state.
pub fn create_state(config: HubConfig) -> SharedState {
    Arc::new(HubState::new(config))
}
