//! Fleet configuration loading tests.
//!
//! Covers TOML loading from disk, section defaults, telemetry field parsing
//! and cross-section validation.

use sphero_common::config::{ConfigError, ConfigLoader, FleetConfig, LogLevel};
use sphero_common::protocol::TelemetryField;
use std::fs;
use tempfile::TempDir;

fn write_config(dir: &TempDir, content: &str) -> std::path::PathBuf {
    let path = dir.path().join("sphero.toml");
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn empty_document_uses_defaults() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "");
    let config = FleetConfig::load(&path).expect("load");
    config.validate().expect("defaults are valid");
    assert_eq!(config.fleet.robot_count, 2);
    assert_eq!(config.camera.fps, 30);
    assert_eq!(config.battery.low_voltage, 3.75);
    assert_eq!(config.sensor.output_variables.len(), 13);
    assert_eq!(config.sensor.output_variables[0], TelemetryField::PositionX);
}

#[test]
fn full_document_overrides_sections() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
[shared]
log_level = "debug"
service_name = "arena-7"

[fleet]
robot_count = 1
addresses = ["AA:BB:CC:DD:EE:FF"]
colors = [[10, 20, 30]]

[state]
window_secs = 4

[camera]
fps = 60
target_fps = 10

[audio]
sample_rate = 16000
secs_per_sample = 0.1
channels = 1

[battery]
low_voltage = 3.6

[sensor]
rate_hz = 10
output_variables = ["yaw", "positionX", "positionY"]

[supervisor]
crash_cooldown_secs = 5

[logging]
dir = "/tmp/sphero-logs"
"#,
    );
    let config = FleetConfig::load(&path).expect("load");
    config.validate().expect("valid");

    assert_eq!(config.shared.log_level, LogLevel::Debug);
    assert_eq!(config.shared.service_name, "arena-7");
    assert_eq!(config.fleet.colors[0], [10, 20, 30]);
    assert_eq!(config.camera_length_state_full(), 240);
    assert_eq!(config.camera_length_state(), 40);
    assert_eq!(config.camera_output_skip(), 6);
    assert_eq!(config.audio_samples_per_chunk(), 1600);
    assert_eq!(config.audio_length_state(), 40);
    assert_eq!(config.robot_length_state(), 40);
    assert_eq!(config.supervisor.crash_cooldown().as_secs(), 5);
    assert_eq!(
        config.sensor.output_variables,
        vec![
            TelemetryField::Yaw,
            TelemetryField::PositionX,
            TelemetryField::PositionY
        ]
    );
}

#[test]
fn unknown_telemetry_field_is_a_parse_error() {
    let result = FleetConfig::from_toml(
        r#"
[sensor]
output_variables = ["altitude"]
"#,
    );
    assert!(matches!(result, Err(ConfigError::ParseError(_))));
}

#[test]
fn missing_colors_fail_validation() {
    let config = FleetConfig::from_toml(
        r#"
[fleet]
robot_count = 2
addresses = ["A", "B"]
colors = [[1, 2, 3]]
"#,
    )
    .expect("parse");
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("colors"));
}

#[test]
fn zero_window_fails_validation() {
    let config = FleetConfig::from_toml("[state]\nwindow_secs = 0\n").expect("parse");
    assert!(matches!(
        config.validate(),
        Err(ConfigError::ValidationError(_))
    ));
}

#[test]
fn zero_robots_is_allowed() {
    let config = FleetConfig::from_toml("[fleet]\nrobot_count = 0\n").expect("parse");
    config.validate().expect("camera-only fleet");
    assert_eq!(config.stream_count(), 3);
}
