//! Hub counters.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Message counters for the whole hub.
#[derive(Debug)]
pub struct HubStats {
    /// Position reports accepted into the registry.
    pub reports_accepted: AtomicU64,
    /// Position reports answered with an error envelope.
    pub reports_rejected: AtomicU64,
    /// Viewport updates applied.
    pub bounds_accepted: AtomicU64,
    /// Viewport updates answered with an error envelope.
    pub bounds_rejected: AtomicU64,
    /// `Buses` messages sent to consumers.
    pub broadcasts_sent: AtomicU64,
    started_at: Instant,
}

impl HubStats {
    pub fn new() -> Self {
        Self {
            reports_accepted: AtomicU64::new(0),
            reports_rejected: AtomicU64::new(0),
            bounds_accepted: AtomicU64::new(0),
            bounds_rejected: AtomicU64::new(0),
            broadcasts_sent: AtomicU64::new(0),
            started_at: Instant::now(),
        }
    }

    pub fn record_report_accepted(&self) {
        self.reports_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_report_rejected(&self) {
        self.reports_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_bounds_accepted(&self) {
        self.bounds_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_bounds_rejected(&self) {
        self.bounds_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_broadcast(&self) {
        self.broadcasts_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    /// Counters at this instant. Session counts are filled in by the caller.
    pub fn summary(&self) -> StatsSummary {
        StatsSummary {
            reports_accepted: self.reports_accepted.load(Ordering::Relaxed),
            reports_rejected: self.reports_rejected.load(Ordering::Relaxed),
            bounds_accepted: self.bounds_accepted.load(Ordering::Relaxed),
            bounds_rejected: self.bounds_rejected.load(Ordering::Relaxed),
            broadcasts_sent: self.broadcasts_sent.load(Ordering::Relaxed),
            uptime_secs: self.uptime_secs(),
            buses_tracked: 0,
            producers: 0,
            consumers: 0,
        }
    }
}

impl Default for HubStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Summary of statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsSummary {
    pub reports_accepted: u64,
    pub reports_rejected: u64,
    pub bounds_accepted: u64,
    pub bounds_rejected: u64,
    pub broadcasts_sent: u64,
    pub uptime_secs: u64,
    pub buses_tracked: usize,
    pub producers: usize,
    pub consumers: usize,
}
