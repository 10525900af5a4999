//! Viewport bounds declared by consumers.

use crate::Bus;
use serde::{Deserialize, Serialize};

/// Rectangular lat/lng box.
///
/// Field names match the `newBounds` payload sent by browsers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub south_lat: f64,
    pub north_lat: f64,
    pub west_lng: f64,
    pub east_lng: f64,
}

impl Bounds {
    pub fn new(south_lat: f64, north_lat: f64, west_lng: f64, east_lng: f64) -> Self {
        Self {
            south_lat,
            north_lat,
            west_lng,
            east_lng,
        }
    }

    /// Inclusive containment test on all four edges.
    ///
    /// An inverted box (south above north, or west east of east) contains
    /// nothing.
    #[inline]
    pub fn contains(&self, lat: f64, lng: f64) -> bool {
        self.south_lat <= lat && lat <= self.north_lat && self.west_lng <= lng && lng <= self.east_lng
    }

    #[inline]
    pub fn contains_bus(&self, bus: &Bus) -> bool {
        let (lat, lng) = bus.coordinates();
        self.contains(lat, lng)
    }
}

/// Per-session viewport: either unset or a declared box.
///
/// An unset viewport matches no buses, so a consumer sees nothing until it
/// declares where it is looking.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Viewport {
    bounds: Option<Bounds>,
}

impl Viewport {
    /// Viewport that has not been declared yet.
    pub const fn unset() -> Self {
        Self { bounds: None }
    }

    pub const fn with_bounds(bounds: Bounds) -> Self {
        Self {
            bounds: Some(bounds),
        }
    }

    pub fn is_set(&self) -> bool {
        self.bounds.is_some()
    }

    pub fn bounds(&self) -> Option<Bounds> {
        self.bounds
    }

    /// Check whether a bus is visible in this viewport.
    pub fn contains(&self, bus: &Bus) -> bool {
        self.bounds.is_some_and(|b| b.contains_bus(bus))
    }

    /// Copies of the buses visible in this viewport.
    pub fn filter<'a, I>(&self, buses: I) -> Vec<Bus>
    where
        I: IntoIterator<Item = &'a Bus>,
    {
        buses
            .into_iter()
            .filter(|bus| self.contains(bus))
            .cloned()
            .collect()
    }
}

impl From<Bounds> for Viewport {
    fn from(bounds: Bounds) -> Self {
        Self::with_bounds(bounds)
    }
}
