//! Emulated buses.

use crate::{EmulatorError, Route};
use bus_tracker_core::Bus;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

/// Bus id for the `index`-th bus on `route`, prefixed by the emulator id
/// when one is set.
pub fn bus_id(emulator_id: Option<&str>, route: &str, index: usize) -> String {
    match emulator_id {
        Some(prefix) if !prefix.is_empty() => format!("{prefix}-{route}-{index}"),
        _ => format!("{route}-{index}"),
    }
}

/// Where one emulated bus starts and which connection carries its reports.
#[derive(Debug, Clone)]
pub struct BusPlan {
    pub bus_id: String,
    pub route: Arc<Route>,
    /// Index of the first waypoint.
    pub offset: usize,
    /// Index into the connection pool.
    pub connection: usize,
}

/// Plan `buses_per_route` buses for every route, each at a random waypoint
/// and on a random connection.
pub fn plan_buses<R: Rng>(
    rng: &mut R,
    routes: Vec<Route>,
    buses_per_route: usize,
    connections: usize,
    emulator_id: Option<&str>,
) -> Vec<BusPlan> {
    let connections = connections.max(1);
    let mut plans = Vec::with_capacity(routes.len() * buses_per_route);

    for route in routes.into_iter().filter(|r| !r.coordinates.is_empty()) {
        let route = Arc::new(route);
        for index in 0..buses_per_route {
            plans.push(BusPlan {
                bus_id: bus_id(emulator_id, &route.name, index),
                offset: rng.gen_range(0..route.coordinates.len()),
                connection: rng.gen_range(0..connections),
                route: route.clone(),
            });
        }
    }

    plans
}

/// Drive one bus along its route forever, queueing one JSON report per
/// waypoint on `reports`.
///
/// Returns `ChannelClosed` once the connection side is gone.
pub async fn run_bus(
    plan: BusPlan,
    reports: mpsc::Sender<String>,
    refresh: Duration,
) -> Result<(), EmulatorError> {
    debug!("Bus {} starting on route {}", plan.bus_id, plan.route.name);

    for (lat, lng) in plan.route.waypoints_from(plan.offset) {
        let report = serde_json::to_string(&Bus::new(&plan.bus_id, lat, lng, &plan.route.name))?;
        reports
            .send(report)
            .await
            .map_err(|_| EmulatorError::ChannelClosed)?;
        tokio::time::sleep(refresh).await;
    }

    Ok(())
}
