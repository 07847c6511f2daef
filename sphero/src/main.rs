//! # Sphero Fleet Binary
//!
//! Starts the robot supervisor, sensor monitor and lifecycle state machine
//! and keeps them running until interrupted.
//!
//! # Usage
//!
//! ```bash
//! # Simulated robots, camera and microphone
//! sphero --config config/sphero.toml --simulate
//!
//! # Named transport, debug logging as JSON
//! sphero --transport simulation -v --json
//! ```

use clap::Parser;
use sphero::logging::{LogOptions, init_logging};
use sphero::{RuntimeOptions, SpheroRuntime};
use sphero_common::config::{ConfigError, ConfigLoader, FleetConfig};
use sphero_common::consts::DEFAULT_CONFIG_PATH;
use sphero_link::TransportRegistry;
use sphero_link::drivers::{register_builtin_transports, simulation};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;
use tracing::{error, info, warn};

/// Sphero fleet runtime
#[derive(Parser, Debug)]
#[command(name = "sphero")]
#[command(version)]
#[command(about = "Drives a fleet of Sphero robots and serves their sensor state")]
#[command(long_about = None)]
struct Args {
    /// Path to the fleet configuration file.
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Simulate robots, camera and microphone.
    #[arg(short = 's', long)]
    simulate: bool,

    /// Transport used to reach the robots.
    #[arg(short, long, default_value = simulation::TRANSPORT_NAME)]
    transport: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output console logs in JSON format
    #[arg(long)]
    json: bool,
}

fn main() {
    if let Err(e) = run() {
        error!("sphero startup failed: {}", e);
        eprintln!("sphero: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let (config, missing) = match FleetConfig::load(&args.config) {
        Ok(config) => (config, false),
        Err(ConfigError::FileNotFound) => (FleetConfig::default(), true),
        Err(e) => return Err(e.into()),
    };
    config.validate()?;

    let _guards = init_logging(
        &config,
        LogOptions {
            verbose: args.verbose,
            json: args.json,
        },
    )?;
    info!("sphero v{} starting...", env!("CARGO_PKG_VERSION"));
    if missing {
        warn!(path = %args.config.display(), "config file not found, using defaults");
    }

    let mut registry = TransportRegistry::new();
    register_builtin_transports(&mut registry)?;
    let transport = if args.simulate {
        info!("simulation mode enabled");
        simulation::TRANSPORT_NAME
    } else {
        args.transport.as_str()
    };
    let factory = registry.get(transport)?;
    info!(transport, available = ?registry.names(), "transport selected");

    let runtime = SpheroRuntime::start(
        &config,
        factory,
        RuntimeOptions {
            simulate_sensors: args.simulate,
            notifier: None,
        },
    )?;

    let running = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&running);
    ctrlc::set_handler(move || {
        info!("received shutdown signal");
        flag.store(false, Ordering::SeqCst);
    })?;

    let library = runtime.library();
    let mut last = library.lifecycle();
    info!(state = %last, "waiting for sensors");
    while running.load(Ordering::SeqCst) {
        thread::sleep(Duration::from_millis(100));
        let state = library.lifecycle();
        if state != last {
            info!(from = %last, to = %state, "library state changed");
            last = state;
        }
    }

    runtime.shutdown();
    info!("sphero shutdown complete");
    Ok(())
}
