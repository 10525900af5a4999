//! Vehicle position reports.

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

/// Latest known position of a single bus.
///
/// Identity is `bus_id`. A position is only ever replaced as a whole,
/// never patched field by field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bus {
    /// Unique, non-empty vehicle identifier (e.g., "156-3")
    #[serde(rename = "busId")]
    pub bus_id: CompactString,
    /// Latitude in degrees
    pub lat: f64,
    /// Longitude in degrees
    pub lng: f64,
    /// Route name shown to viewers (e.g., "156")
    pub route: CompactString,
}

impl Bus {
    /// Create a new position report.
    pub fn new(bus_id: &str, lat: f64, lng: f64, route: &str) -> Self {
        Self {
            bus_id: CompactString::new(bus_id),
            lat,
            lng,
            route: CompactString::new(route),
        }
    }

    #[inline]
    pub fn coordinates(&self) -> (f64, f64) {
        (self.lat, self.lng)
    }
}
