//! Configuration loading traits and types.
//!
//! This module provides a standardized way to load TOML configuration files
//! across all Sphero applications, plus the [`FleetConfig`] describing the
//! robots, the ambient sensors and the derived buffer sizes.
//!
//! # Usage
//!
//! ```rust,no_run
//! use sphero_common::config::{ConfigLoader, ConfigError, FleetConfig};
//! use std::path::Path;
//!
//! fn main() -> Result<(), ConfigError> {
//!     let config = FleetConfig::load(Path::new("sphero.toml"))?;
//!     config.validate()?;
//!     println!("Robots: {}", config.fleet.robot_count);
//!     Ok(())
//! }
//! ```

use crate::consts::{
    AMBIENT_STREAMS, DEFAULT_CRASH_COOLDOWN_SECS, DEFAULT_SHM_DIR, DEFAULT_SHM_NAME, MAX_ROBOTS,
    SHM_SEGMENT_PREFIX,
};
use crate::protocol::telemetry::TelemetryField;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Error type for configuration loading operations.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at specified path.
    #[error("Configuration file not found")]
    FileNotFound,

    /// TOML parsing failed.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Semantic validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

/// Log level for application logging.
///
/// Uses lowercase serde values for TOML compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Most verbose, detailed tracing information.
    Trace,
    /// Debug information useful during development.
    Debug,
    /// General information about application operation.
    #[default]
    Info,
    /// Warning messages for potentially problematic situations.
    Warn,
    /// Error messages for serious problems.
    Error,
}

impl LogLevel {
    /// Directive string understood by `tracing_subscriber::EnvFilter`.
    pub fn as_directive(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Common configuration fields shared across all Sphero applications.
///
/// # TOML Example
///
/// ```toml
/// [shared]
/// log_level = "debug"
/// service_name = "sphero-arena-01"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedConfig {
    /// Logging verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Application instance identifier.
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

fn default_service_name() -> String {
    "sphero-fleet".to_string()
}

impl Default for SharedConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),
            service_name: default_service_name(),
        }
    }
}

impl SharedConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if `service_name` is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_name.is_empty() {
            return Err(ConfigError::ValidationError(
                "service_name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Trait for loading configuration from TOML files.
///
/// # Contract
///
/// - Returns `ConfigError::FileNotFound` if the file does not exist
/// - Returns `ConfigError::ParseError` if TOML syntax is invalid
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    /// Load configuration from a TOML file.
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound
            } else {
                ConfigError::ParseError(e.to_string())
            }
        })?;

        Self::from_toml(&content)
    }

    /// Parse configuration from an in-memory TOML document.
    fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

// Blanket implementation for all types that implement DeserializeOwned.
impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}

// ─── Fleet configuration ────────────────────────────────────────────

/// Robots taking part in the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RobotFleetConfig {
    /// Number of robots driven simultaneously.
    pub robot_count: usize,
    /// Hardware (radio) address per robot, indexed by robot number.
    pub addresses: Vec<String>,
    /// Matrix colour assigned to each robot.
    pub colors: Vec<[u8; 3]>,
}

impl Default for RobotFleetConfig {
    fn default() -> Self {
        Self {
            robot_count: 2,
            addresses: vec![
                "DA:E7:C9:C5:81:CD".to_string(),
                "D1:E3:4B:81:F3:29".to_string(),
                "E1:91:60:4F:3B:27".to_string(),
            ],
            colors: vec![[255, 0, 0], [0, 255, 0], [0, 0, 255], [255, 255, 255]],
        }
    }
}

/// Length of the sliding state window exposed to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateWindowConfig {
    /// Seconds of history kept for every stream.
    pub window_secs: u32,
}

impl Default for StateWindowConfig {
    fn default() -> Self {
        Self { window_secs: 2 }
    }
}

/// RGB-D camera geometry and rates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub rgb_width: usize,
    pub rgb_height: usize,
    pub depth_width: usize,
    pub depth_height: usize,
    /// Capture frame rate.
    pub fps: u32,
    /// Output frame rate; must divide `fps`.
    pub target_fps: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            rgb_width: 320,
            rgb_height: 180,
            depth_width: 424,
            depth_height: 240,
            fps: 30,
            target_fps: 6,
        }
    }
}

impl CameraConfig {
    /// Bytes in one RGB frame (three channels).
    pub fn rgb_frame_len(&self) -> usize {
        self.rgb_width * self.rgb_height * 3
    }

    /// Samples in one depth frame.
    pub fn depth_frame_len(&self) -> usize {
        self.depth_width * self.depth_height
    }
}

/// Microphone capture parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Samples per second.
    pub sample_rate: u32,
    /// Duration of one capture chunk in seconds.
    pub secs_per_sample: f64,
    pub channels: u16,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            secs_per_sample: 0.05,
            channels: 1,
        }
    }
}

/// Battery thresholds in volts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatteryConfig {
    /// Below this voltage a robot is stopped and an alert is raised.
    pub low_voltage: f32,
    /// Above this voltage (and off the charger) a robot is considered ready.
    pub charged_voltage: f32,
}

impl Default for BatteryConfig {
    fn default() -> Self {
        Self {
            low_voltage: 3.75,
            charged_voltage: 3.75,
        }
    }
}

/// Robot telemetry stream settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    /// Estimated telemetry rate in Hz.
    pub rate_hz: u32,
    /// Fields stored per telemetry sample, in order.
    pub output_variables: Vec<TelemetryField>,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            rate_hz: 9,
            output_variables: TelemetryField::DEFAULT_OUTPUT.to_vec(),
        }
    }
}

/// Robot supervisor policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Cooldown before a crashed robot unit is restarted.
    pub crash_cooldown_secs: u64,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            crash_cooldown_secs: DEFAULT_CRASH_COOLDOWN_SECS,
        }
    }
}

impl SupervisorConfig {
    pub fn crash_cooldown(&self) -> Duration {
        Duration::from_secs(self.crash_cooldown_secs)
    }
}

/// Log file destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Directory receiving the robot and library log files.
    pub dir: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("logs"),
        }
    }
}

/// Location of the named shared-memory segment.
///
/// The segment file is `<dir>/sphero_<name>`; a consumer process attaches
/// to the same path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SharedMemoryConfig {
    /// Directory holding the segment, normally a tmpfs.
    pub dir: PathBuf,
    /// Segment name; ASCII letters, digits, `-` and `_` only.
    pub name: String,
}

impl Default for SharedMemoryConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(DEFAULT_SHM_DIR),
            name: DEFAULT_SHM_NAME.to_string(),
        }
    }
}

impl SharedMemoryConfig {
    /// Full path of the segment file.
    pub fn segment_path(&self) -> PathBuf {
        self.dir.join(format!("{SHM_SEGMENT_PREFIX}{}", self.name))
    }

    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if `name` is empty or holds a
    /// character outside `[A-Za-z0-9_-]`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid = |c: char| c.is_ascii_alphanumeric() || c == '-' || c == '_';
        if self.name.is_empty() || !self.name.chars().all(valid) {
            return Err(invalid(format!(
                "shared_memory.name {:?} must be non-empty [A-Za-z0-9_-]",
                self.name
            )));
        }
        Ok(())
    }
}

/// Complete fleet configuration.
///
/// Every section falls back to its defaults, so an empty TOML document is a
/// valid configuration.
///
/// # TOML Example
///
/// ```toml
/// [shared]
/// service_name = "arena"
///
/// [fleet]
/// robot_count = 1
/// addresses = ["DA:E7:C9:C5:81:CD"]
/// colors = [[255, 0, 0]]
///
/// [camera]
/// fps = 30
/// target_fps = 6
///
/// [sensor]
/// output_variables = ["positionX", "positionY", "yaw"]
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetConfig {
    pub shared: SharedConfig,
    pub fleet: RobotFleetConfig,
    pub state: StateWindowConfig,
    pub camera: CameraConfig,
    pub audio: AudioConfig,
    pub battery: BatteryConfig,
    pub sensor: SensorConfig,
    pub supervisor: SupervisorConfig,
    pub logging: LoggingConfig,
    pub shared_memory: SharedMemoryConfig,
}

impl FleetConfig {
    /// Validate cross-section invariants.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if:
    /// - `robot_count` exceeds [`MAX_ROBOTS`] or the configured addresses/colours
    /// - `target_fps` is zero or does not divide `fps`
    /// - any rate, window or sample duration is not positive
    /// - `output_variables` is empty or lists a field twice
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;
        self.shared_memory.validate()?;

        let fleet = &self.fleet;
        if fleet.robot_count > MAX_ROBOTS {
            return Err(invalid(format!(
                "robot_count {} exceeds maximum {}",
                fleet.robot_count, MAX_ROBOTS
            )));
        }
        if fleet.addresses.len() < fleet.robot_count {
            return Err(invalid(format!(
                "robot_count {} but only {} addresses configured",
                fleet.robot_count,
                fleet.addresses.len()
            )));
        }
        if fleet.colors.len() < fleet.robot_count {
            return Err(invalid(format!(
                "robot_count {} but only {} colors configured",
                fleet.robot_count,
                fleet.colors.len()
            )));
        }
        if let Some(addr) = fleet.addresses[..fleet.robot_count]
            .iter()
            .find(|a| a.trim().is_empty())
        {
            return Err(invalid(format!("empty robot address {addr:?}")));
        }

        if self.state.window_secs == 0 {
            return Err(invalid("state.window_secs must be positive".into()));
        }

        let cam = &self.camera;
        if cam.fps == 0 || cam.target_fps == 0 {
            return Err(invalid("camera fps and target_fps must be positive".into()));
        }
        if cam.fps % cam.target_fps != 0 {
            return Err(invalid(format!(
                "camera.target_fps {} must evenly divide camera.fps {}",
                cam.target_fps, cam.fps
            )));
        }
        if cam.rgb_frame_len() == 0 || cam.depth_frame_len() == 0 {
            return Err(invalid("camera resolutions must be non-zero".into()));
        }

        let audio = &self.audio;
        if audio.sample_rate == 0 || audio.channels == 0 {
            return Err(invalid("audio sample_rate and channels must be positive".into()));
        }
        if !(audio.secs_per_sample > 0.0) || audio.secs_per_sample > self.state.window_secs as f64
        {
            return Err(invalid(format!(
                "audio.secs_per_sample {} must be in (0, window_secs]",
                audio.secs_per_sample
            )));
        }
        if self.audio_samples_per_chunk() == 0 {
            return Err(invalid("audio chunk holds no samples".into()));
        }

        if !(self.battery.low_voltage > 0.0) {
            return Err(invalid("battery.low_voltage must be positive".into()));
        }

        let sensor = &self.sensor;
        if sensor.rate_hz == 0 {
            return Err(invalid("sensor.rate_hz must be positive".into()));
        }
        if sensor.output_variables.is_empty() {
            return Err(invalid("sensor.output_variables cannot be empty".into()));
        }
        for (i, field) in sensor.output_variables.iter().enumerate() {
            if sensor.output_variables[..i].contains(field) {
                return Err(invalid(format!("duplicate output variable {field:?}")));
            }
        }

        Ok(())
    }

    /// Number of tracked streams: video, depth, audio, then one per robot.
    pub fn stream_count(&self) -> usize {
        AMBIENT_STREAMS + self.fleet.robot_count
    }

    /// Frames held by the video and depth rings.
    pub fn camera_length_state_full(&self) -> usize {
        (self.state.window_secs * self.camera.fps) as usize
    }

    /// Frames returned per snapshot after down-sampling.
    pub fn camera_length_state(&self) -> usize {
        (self.state.window_secs * self.camera.target_fps) as usize
    }

    /// Down-sampling stride between ring frames and output frames.
    pub fn camera_output_skip(&self) -> usize {
        (self.camera.fps / self.camera.target_fps.max(1)) as usize
    }

    /// Samples delivered by one microphone callback.
    pub fn audio_samples_per_chunk(&self) -> usize {
        (self.audio.sample_rate as f64 * self.audio.secs_per_sample) as usize
            * self.audio.channels as usize
    }

    /// Audio chunks covering the state window.
    pub fn audio_length_state(&self) -> usize {
        (self.state.window_secs as f64 / self.audio.secs_per_sample).round() as usize
    }

    /// Length of the audio sliding buffer in samples.
    pub fn audio_buffer_len(&self) -> usize {
        self.audio.sample_rate as usize * self.state.window_secs as usize * self.audio.channels as usize
    }

    /// Telemetry samples kept per robot.
    pub fn robot_length_state(&self) -> usize {
        (self.state.window_secs * self.sensor.rate_hz) as usize
    }

    /// The state window as a duration.
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.state.window_secs as u64)
    }
}

fn invalid(msg: String) -> ConfigError {
    ConfigError::ValidationError(msg)
}
