//! Robot and library events land in separate log files.

use sphero::logging::{LogOptions, init_logging};
use sphero_common::config::FleetConfig;
use sphero_common::consts::{LIBRARY_LOG_FILE, ROBOT_LOG_FILE, ROBOT_LOG_TARGET};
use std::fs;
use tracing::{debug, info};

#[test]
fn robot_and_library_logs_are_split() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = FleetConfig::default();
    config.logging.dir = dir.path().join("logs");

    let guards = init_logging(&config, LogOptions::default()).unwrap();
    info!(target: ROBOT_LOG_TARGET, robot = 1, "wake confirmed");
    info!("lifecycle transition");
    debug!("below the configured level");
    drop(guards);

    let robot = fs::read_to_string(config.logging.dir.join(ROBOT_LOG_FILE)).unwrap();
    let library = fs::read_to_string(config.logging.dir.join(LIBRARY_LOG_FILE)).unwrap();

    assert!(robot.contains("wake confirmed"));
    assert!(robot.contains("robot=1"));
    assert!(!robot.contains("lifecycle transition"));
    assert!(library.contains("lifecycle transition"));
    assert!(!library.contains("wake confirmed"));
    assert!(!library.contains("below the configured level"));

    // A second global subscriber is refused.
    assert!(init_logging(&config, LogOptions::default()).is_err());
}
