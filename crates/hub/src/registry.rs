//! Latest-position registry shared by every session.
//!
//! Producers write through [`Registry::upsert`], consumers read through
//! [`Registry::snapshot`] or [`Registry::within`]. Both are whole-record
//! operations on a short-lived lock that is never held across an `.await`,
//! so a reader always sees complete positions and a consistent view of the
//! whole map.

use bus_tracker_core::{Bus, Viewport};
use compact_str::CompactString;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Thread-safe map of bus id to latest known position.
#[derive(Debug, Default)]
pub struct Registry {
    buses: RwLock<HashMap<CompactString, Bus>>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the position for `bus.bus_id`. Last write wins.
    pub fn upsert(&self, bus: Bus) {
        let key = bus.bus_id.clone();
        self.write().insert(key, bus);
    }

    /// Point-in-time copy of every known position.
    pub fn snapshot(&self) -> Vec<Bus> {
        self.read().values().cloned().collect()
    }

    /// Point-in-time copy of the positions visible in `viewport`.
    pub fn within(&self, viewport: &Viewport) -> Vec<Bus> {
        if !viewport.is_set() {
            return Vec::new();
        }
        viewport.filter(self.read().values())
    }

    /// Latest position of one bus.
    pub fn get(&self, bus_id: &str) -> Option<Bus> {
        self.read().get(bus_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    // Entries are replaced whole, so a writer that panicked mid-insert
    // cannot leave a half-written position behind.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<CompactString, Bus>> {
        self.buses.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<CompactString, Bus>> {
        self.buses.write().unwrap_or_else(PoisonError::into_inner)
    }
}
