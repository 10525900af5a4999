//! Core data types for the bus tracker.
//!
//! Everything here is pure: the position and viewport model, the wire
//! envelopes exchanged with producers and consumers, and the validator that
//! turns raw frames into typed messages.

pub mod bounds;
pub mod bus;
pub mod message;
pub mod validation;

pub use bounds::*;
pub use bus::*;
pub use message::*;
pub use validation::*;
