//! Error types for the fleet runtime and the library facade.

use sphero_common::config::ConfigError;
use sphero_common::watchdog::WatchdogError;
use sphero_link::LinkError;
use sphero_shared_memory::StateError;
use thiserror::Error;

/// Rejected library calls. Raised before any blocking.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FacadeError {
    #[error("robot {robot} out of range (fleet has {count})")]
    RobotOutOfRange { robot: usize, count: usize },

    #[error("heading {0} outside 0..=360")]
    HeadingOutOfRange(u16),

    #[error("speed {0} outside 0..=255")]
    SpeedOutOfRange(u16),
}

/// Runtime startup and shutdown failures.
#[derive(Debug, Error)]
pub enum SpheroError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("shared state error: {0}")]
    State(#[from] StateError),

    #[error("link error: {0}")]
    Link(#[from] LinkError),

    #[error("supervisor error: {0}")]
    Watchdog(#[from] WatchdogError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The lifecycle writer was already handed out.
    #[error("lifecycle writer unavailable")]
    LifecycleWriterTaken,

    #[error("logging setup failed: {0}")]
    Logging(String),
}

/// Result alias for runtime operations.
pub type SpheroResult<T> = Result<T, SpheroError>;
