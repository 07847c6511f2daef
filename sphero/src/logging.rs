//! Tracing setup for the fleet runtime.
//!
//! ```text
//! tracing events ─┬─► console (fmt, EnvFilter, optional JSON)
//!                 ├─► <dir>/Spheros.log   target sphero::robot
//!                 └─► <dir>/Library.log   every other target
//! ```
//!
//! File layers write through `tracing_appender::non_blocking`, so a slow
//! disk never stalls a robot link. Keep the returned [`LogGuards`] alive
//! until shutdown or buffered lines are lost.

use crate::error::{SpheroError, SpheroResult};
use sphero_common::config::FleetConfig;
use sphero_common::consts::{LIBRARY_LOG_FILE, ROBOT_LOG_FILE, ROBOT_LOG_TARGET};
use std::path::Path;
use std::str::FromStr;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::{LevelFilter, filter_fn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Console output switches.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogOptions {
    /// Force debug level regardless of the configured level.
    pub verbose: bool,
    /// Console output as JSON lines.
    pub json: bool,
}

/// Flush guards of the two log file writers.
#[must_use = "dropping the guards stops the log file writers"]
pub struct LogGuards {
    _robot: WorkerGuard,
    _library: WorkerGuard,
}

fn is_robot_target(target: &str) -> bool {
    target.starts_with(ROBOT_LOG_TARGET)
}

fn file_layer(dir: &Path, file: &str, max: LevelFilter, robot: bool) -> (BoxedLayer, WorkerGuard) {
    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file));
    let layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_filter(filter_fn(move |meta| {
            *meta.level() <= max && is_robot_target(meta.target()) == robot
        }))
        .boxed();
    (layer, guard)
}

/// Install the global subscriber.
///
/// # Errors
/// Fails if the log directory cannot be created or a global subscriber is
/// already installed.
pub fn init_logging(config: &FleetConfig, options: LogOptions) -> SpheroResult<LogGuards> {
    let directive = if options.verbose {
        "debug"
    } else {
        config.shared.log_level.as_directive()
    };
    let max = LevelFilter::from_str(directive).unwrap_or(LevelFilter::INFO);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));

    let console: BoxedLayer = if options.json {
        fmt::layer().json().with_filter(filter).boxed()
    } else {
        fmt::layer().with_filter(filter).boxed()
    };

    let dir = &config.logging.dir;
    std::fs::create_dir_all(dir)?;
    let (robot, robot_guard) = file_layer(dir, ROBOT_LOG_FILE, max, true);
    let (library, library_guard) = file_layer(dir, LIBRARY_LOG_FILE, max, false);

    tracing_subscriber::registry()
        .with(vec![console, robot, library])
        .try_init()
        .map_err(|e| SpheroError::Logging(e.to_string()))?;

    Ok(LogGuards {
        _robot: robot_guard,
        _library: library_guard,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn robot_targets_route_to_robot_log() {
        assert!(is_robot_target("sphero::robot"));
        assert!(!is_robot_target("sphero::monitor"));
        assert!(!is_robot_target("sphero_link::core"));
    }
}
