//! Wires routes, buses and producer connections together.

use crate::{load_routes, plan_buses, run_bus, EmulatorConfig, EmulatorError, ProducerConnection};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{error, info};

/// Reports buffered per connection. Kept minimal so a bus waits for its
/// connection instead of queueing stale positions.
pub const REPORT_BUFFER: usize = 1;

/// Run the emulator until a task fails for good.
///
/// Bus and connection tasks normally run forever; callers stop the emulator
/// by dropping this future.
pub async fn run(config: EmulatorConfig) -> Result<(), EmulatorError> {
    let url = config.validate()?;
    let routes = load_routes(&config.routes_dir, config.routes_number)?;
    if routes.is_empty() {
        return Err(EmulatorError::NoRoutes(config.routes_dir.clone()));
    }
    let route_count = routes.len();

    let connections = config.websockets_number.max(1);
    let plans = plan_buses(
        &mut rand::thread_rng(),
        routes,
        config.buses_per_route,
        connections,
        config.emulator_id.as_deref(),
    );

    let mut tasks = JoinSet::new();
    let mut senders = Vec::with_capacity(connections);
    for id in 0..connections {
        let (tx, rx) = mpsc::channel(REPORT_BUFFER);
        senders.push(tx);
        let connection = ProducerConnection::new(
            id,
            url.as_str(),
            config.reconnect_delay(),
            config.send_interval(),
            rx,
        );
        tasks.spawn(connection.run());
    }

    info!(
        "🚌 Emulating {} buses on {} routes over {} connection(s) to {}",
        plans.len(),
        route_count,
        connections,
        url
    );

    for plan in plans {
        let reports = senders[plan.connection].clone();
        tasks.spawn(run_bus(plan, reports, config.refresh_interval()));
    }
    // Connections end once their buses are gone.
    drop(senders);

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!("Emulator task failed: {}", e);
                return Err(e);
            }
            Err(e) => {
                error!("Emulator task panicked: {}", e);
                return Err(EmulatorError::Panicked(e.to_string()));
            }
        }
    }

    Ok(())
}
