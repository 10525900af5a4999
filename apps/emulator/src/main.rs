//! Bus Tracker - Route Emulator
//!
//! Drives fake buses along recorded routes and reports their positions to a
//! running hub.

use bus_tracker_emulator::{EmulatorConfig, EmulatorError};
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info, warn, Level};
use tracing_subscriber::filter::{Directive, LevelFilter};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Fake bus CLI
#[derive(Parser, Debug)]
#[command(name = "fake-bus")]
#[command(about = "Emulates buses driving along routes", long_about = None)]
struct Args {
    /// Address of the tracking server
    #[arg(short, long, default_value = "127.0.0.1")]
    server: String,

    /// Bus port of the tracking server
    #[arg(short = 'p', long, alias = "bus_port", default_value_t = 8080)]
    bus_port: u16,

    /// Directory with route JSON files
    #[arg(short = 'd', long, alias = "routes_dir", default_value = "routes")]
    routes_dir: PathBuf,

    /// Number of routes to load
    #[arg(short, long, alias = "routes_number", default_value_t = 10)]
    routes_number: usize,

    /// Number of buses per route
    #[arg(short, long, alias = "buses_per_route", default_value_t = 10)]
    buses_per_route: usize,

    /// Number of open WebSocket connections
    #[arg(short, long, alias = "websockets_number", default_value_t = 5)]
    websockets_number: usize,

    /// Emulator id, prefixed to every bus id
    #[arg(short, long, alias = "emulator_id")]
    emulator_id: Option<String>,

    /// Delay between two position reports of one bus, in seconds
    #[arg(short = 't', long, alias = "refresh_timeout", default_value_t = 1.0)]
    refresh_timeout: f64,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn into_config(self) -> EmulatorConfig {
        EmulatorConfig {
            server_url: format!("ws://{}:{}", self.server, self.bus_port),
            routes_dir: self.routes_dir,
            routes_number: Some(self.routes_number),
            buses_per_route: self.buses_per_route,
            websockets_number: self.websockets_number,
            emulator_id: self.emulator_id,
            refresh_interval_ms: secs_to_millis(self.refresh_timeout),
            send_interval_ms: secs_to_millis(self.refresh_timeout),
            ..Default::default()
        }
    }
}

fn secs_to_millis(secs: f64) -> u64 {
    if secs.is_finite() && secs > 0.0 {
        (secs * 1000.0).round() as u64
    } else {
        0
    }
}

/// Debug output of the emulator itself stays readable: the WebSocket
/// library only logs warnings unless `RUST_LOG` says otherwise.
fn log_filter(verbose: bool) -> EnvFilter {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level).into())
        .from_env_lossy();

    match "tungstenite=warn".parse::<Directive>() {
        Ok(directive) if std::env::var_os(EnvFilter::DEFAULT_ENV).is_none() => {
            filter.add_directive(directive)
        }
        _ => filter,
    }
}

fn init_logging(verbose: bool) {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(log_filter(verbose))
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {e}");
    }
}

#[tokio::main]
async fn main() -> Result<(), EmulatorError> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = args.into_config();
    info!("🚀 Fake bus starting...");
    info!("  Server: {}", config.server_url);
    info!("  Routes: {}", config.routes_dir.display());

    tokio::select! {
        result = bus_tracker_emulator::run(config) => {
            if let Err(e) = &result {
                error!("Emulator stopped: {}", e);
            }
            result
        }
        signal = tokio::signal::ctrl_c() => {
            match signal {
                Ok(()) => warn!("Shutdown signal received"),
                Err(e) => error!("Failed to listen for Ctrl+C: {}", e),
            }
            info!("👋 Goodbye!");
            Ok(())
        }
    }
}
