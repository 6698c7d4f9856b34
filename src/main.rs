// src/main.rs
//! GPS HUD - telemetry dashboard for a serial GPS receiver

use anyhow::Context;
use clap::Parser;
use gps_hud::{
    display::{self, terminal::TerminalDisplay},
    logging::init_logging,
    monitor::list_serial_ports,
    GpsSource, HudConfig, HudMonitor,
};
use std::{path::PathBuf, time::Duration};
use tracing::{info, warn};

const FALLBACK_PORT: &str = "/dev/ttyUSB0";

#[derive(Parser, Debug)]
#[command(name = "gps-hud")]
#[command(about = "GPS telemetry: baud detection, fix quality, max speed and 0-60 timing", long_about = None)]
struct Args {
    /// Serial port of the receiver (overrides the config file)
    #[arg(short, long)]
    port: Option<String>,

    /// Only try this baud rate instead of the detection list
    #[arg(short, long)]
    baud: Option<u32>,

    /// Replay a recorded NMEA log instead of reading a serial port
    #[arg(long, value_name = "FILE", conflicts_with = "port")]
    replay: Option<PathBuf>,

    /// Baud rate the replayed receiver "transmits" at
    #[arg(long, default_value = "9600")]
    replay_baud: u32,

    /// Milliseconds between replayed sentences
    #[arg(long, default_value = "200")]
    replay_interval_ms: u64,

    /// Print one JSON snapshot per second instead of the dashboard
    #[arg(long)]
    json: bool,

    /// List serial ports and exit
    #[arg(long)]
    list_ports: bool,

    /// Config file (defaults to ~/.config/gps-hud/config.json)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn load_config(args: &Args) -> anyhow::Result<HudConfig> {
    let mut config = match &args.config {
        Some(path) => HudConfig::load_from(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => HudConfig::load().unwrap_or_else(|e| {
            warn!("Using default configuration: {}", e);
            HudConfig::default()
        }),
    };

    if let Some(port) = &args.port {
        config.update_serial(port.clone());
    }
    if let Some(baud) = args.baud {
        config.pin_baud(baud);
    }
    config.transport.validate().context("Invalid transport settings")?;
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    if args.list_ports {
        return list_serial_ports().context("Failed to list serial ports");
    }

    let config = load_config(&args)?;

    let source = match &args.replay {
        Some(path) => GpsSource::Replay {
            path: path.clone(),
            baud: args.replay_baud,
            line_interval: Duration::from_millis(args.replay_interval_ms),
        },
        None => GpsSource::Serial {
            port: config
                .serial_port
                .clone()
                .unwrap_or_else(|| FALLBACK_PORT.to_string()),
        },
    };

    info!("Starting GPS HUD...");
    let monitor = HudMonitor::new();
    let handle = monitor
        .start_source(source, &config)
        .context("Failed to start the GPS source")?;

    let result = if args.json {
        display::run_json(&monitor, Duration::from_secs(1)).await
    } else {
        TerminalDisplay::default().run(&monitor).await
    };

    monitor.shutdown(handle).await;
    result.context("Display error")
}
