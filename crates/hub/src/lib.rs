//! Real-time bus tracking hub.
//!
//! Accepts producer connections that report bus positions and consumer
//! connections that watch a viewport, and keeps the two sides connected
//! through a shared latest-position [`Registry`].
//!
//! ## Architecture
//!
//! - `registry` - latest position per bus, shared by every session
//! - `session/` - per-connection tasks (`ingest` for producers, `viewport` for consumers)
//! - `server` - binds both endpoints and supervises sessions
//! - `state` - shared handle passed to every connection handler

pub mod config;
pub mod error;
pub mod registry;
pub mod server;
pub mod session;
pub mod state;
pub mod stats;

pub use config::HubConfig;
pub use error::HubError;
pub use registry::Registry;
pub use server::Hub;
pub use session::{SessionId, SessionKind};
pub use state::{create_state, HubState, SharedState};
pub use stats::{HubStats, StatsSummary};
