//! Route emulator ("fake bus" service).
//!
//! Loads route files, runs one task per emulated bus that walks its route's
//! waypoints, and multiplexes the resulting position reports over a small
//! pool of reconnecting producer connections to the hub.
//!
//! ## Architecture
//!
//! - `route` - route file loading and waypoint cycling
//! - `bus` - per-bus report generator and bus-to-connection planning
//! - `connection` - reconnecting producer WebSocket connection
//! - `emulator` - wires routes, buses and connections together

pub mod bus;
pub mod config;
pub mod connection;
pub mod emulator;
pub mod error;
pub mod route;

pub use bus::*;
pub use config::*;
pub use connection::*;
pub use emulator::*;
pub use error::*;
pub use route::*;
