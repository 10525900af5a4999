//! Bus Tracker - Hub Server
//!
//! Accepts bus position reports and streams viewport-filtered positions to
//! browser clients.

use bus_tracker_hub::{Hub, HubConfig, HubError};
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info, warn, Level};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Bus Tracker CLI
#[derive(Parser, Debug)]
#[command(name = "bus-tracker")]
#[command(about = "Real-time bus tracking hub", long_about = None)]
struct Args {
    /// Configuration file path (defaults are used if it does not exist)
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Interface to bind both endpoints on
    #[arg(long)]
    host: Option<String>,

    /// Port for bus (producer) connections
    #[arg(long)]
    bus_port: Option<u16>,

    /// Port for browser (consumer) connections
    #[arg(long)]
    browser_port: Option<u16>,

    /// Delay between two viewport updates, in milliseconds
    #[arg(long)]
    broadcast_interval_ms: Option<u64>,

    /// Log level: trace, debug, info, warn, error
    #[arg(short, long)]
    log_level: Option<String>,
}

impl Args {
    /// Command-line flags take precedence over the config file.
    fn apply(&self, mut config: HubConfig) -> HubConfig {
        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.bus_port {
            config.bus_port = port;
        }
        if let Some(port) = self.browser_port {
            config.browser_port = port;
        }
        if let Some(interval) = self.broadcast_interval_ms {
            config.broadcast_interval_ms = interval;
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
        config
    }
}

fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// `RUST_LOG` directives win; `level` is the default for everything else.
fn log_filter(level: &str) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(parse_level(level)).into())
        .from_env_lossy()
}

fn init_logging(level: &str) {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(log_filter(level))
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

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => warn!("Shutdown signal received"),
        Err(e) => error!("Failed to listen for Ctrl+C: {}", e),
    }
}

#[tokio::main]
async fn main() -> Result<(), HubError> {
    let args = Args::parse();

    let loaded = HubConfig::load_or_default(&args.config);
    let config = args.apply(loaded.as_ref().cloned().unwrap_or_default());
    init_logging(&config.log_level);

    if let Err(e) = loaded {
        error!("Failed to load config: {}", e);
        return Err(e);
    }

    info!("🚀 Bus Tracker starting...");
    info!("  Bus port: {}", config.bus_port);
    info!("  Browser port: {}", config.browser_port);
    info!("  Broadcast interval: {:?}", config.broadcast_interval());

    let hub = match Hub::bind(config).await {
        Ok(hub) => hub,
        Err(e) => {
            error!("Failed to start hub: {}", e);
            return Err(e);
        }
    };
    let state = hub.state();

    info!("Press Ctrl+C to stop...");
    hub.serve(shutdown_signal()).await?;

    let summary = state.stats_summary();
    info!("📈 Final Stats:");
    info!("  Total uptime: {} seconds", summary.uptime_secs);
    info!("  Buses tracked: {}", summary.buses_tracked);
    info!(
        "  Reports: {} accepted, {} rejected",
        summary.reports_accepted, summary.reports_rejected
    );
    info!("  Broadcasts: {}", summary.broadcasts_sent);
    info!("👋 Goodbye!");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_flags_override_config() {
        let args = Args::parse_from([
            "bus-tracker",
            "--bus-port",
            "9090",
            "--broadcast-interval-ms",
            "250",
            "-l",
            "debug",
        ]);
        let config = args.apply(HubConfig::default());

        assert_eq!(config.bus_port, 9090);
        assert_eq!(config.browser_port, 8000);
        assert_eq!(config.broadcast_interval_ms, 250);
        assert_eq!(config.log_level, "debug");
        assert_eq!(args.config, PathBuf::from("config.json"));
    }

    #[test]
    fn test_no_flags_keep_config() {
        let file = HubConfig {
            host: "0.0.0.0".to_string(),
            bus_port: 1,
            ..Default::default()
        };
        let config = Args::parse_from(["bus-tracker"]).apply(file.clone());
        assert_eq!(config, file);
    }

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("DEBUG"), Level::DEBUG);
        assert_eq!(parse_level("warn"), Level::WARN);
        assert_eq!(parse_level("nonsense"), Level::INFO);
    }

    #[test]
    fn test_log_filter_uses_configured_level() {
        if std::env::var_os(EnvFilter::DEFAULT_ENV).is_some() {
            return;
        }
        assert_eq!(log_filter("warn").max_level_hint(), Some(LevelFilter::WARN));
        assert_eq!(log_filter("trace").max_level_hint(), Some(LevelFilter::TRACE));
    }
}
