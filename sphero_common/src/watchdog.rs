//! # Watchdog Trait
//!
//! Defines the supervisor contract for robot unit lifecycle management and
//! the cooperative kill-switch a unit uses to ask for a restart.
//!
//! A robot link never terminates itself: it raises a [`KillCode`] on its
//! [`KillSwitch`], disconnects and idles. The supervisor observes the code
//! and decides whether to restart the unit or stop it for good.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicI32, Ordering};

/// Reason a unit asks to be stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum KillCode {
    /// Unit is healthy.
    Clear = 0,
    /// Generic failure; restart immediately.
    Restart = 1,
    /// Battery below threshold; stop permanently.
    LowBattery = 2,
}

impl KillCode {
    fn from_raw(raw: i32) -> Self {
        match raw {
            1 => Self::Restart,
            2 => Self::LowBattery,
            _ => Self::Clear,
        }
    }
}

impl fmt::Display for KillCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Clear => write!(f, "clear"),
            Self::Restart => write!(f, "restart"),
            Self::LowBattery => write!(f, "low battery"),
        }
    }
}

/// Shared integer flag written by a unit and read by its supervisor.
///
/// Cloning shares the underlying value.
#[derive(Debug, Clone, Default)]
pub struct KillSwitch(Arc<AtomicI32>);

impl KillSwitch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self, code: KillCode) {
        self.0.store(code as i32, Ordering::Release);
    }

    pub fn code(&self) -> KillCode {
        KillCode::from_raw(self.0.load(Ordering::Acquire))
    }

    pub fn is_raised(&self) -> bool {
        self.code() != KillCode::Clear
    }
}

/// Health status returned by [`Watchdog::health_check`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitHealth {
    /// Unit thread is alive and has not raised its kill-switch.
    Healthy,
    /// Unit raised its kill-switch and awaits the supervisor.
    KillRequested(KillCode),
    /// Unit thread exited without raising its kill-switch.
    Dead,
    /// Crashed unit waiting out its restart cooldown.
    CoolingDown {
        /// Milliseconds until the restart.
        remaining_ms: u64,
    },
    /// Unit stopped for good (low battery).
    Stopped,
    /// Robot index is not managed.
    Unknown,
}

/// Error type for watchdog operations.
#[derive(Debug, thiserror::Error)]
pub enum WatchdogError {
    /// Failed to spawn the unit for a robot.
    #[error("failed to spawn robot {robot}: {reason}")]
    SpawnFailed { robot: usize, reason: String },

    /// Robot index is outside the fleet.
    #[error("robot {robot} is not managed")]
    UnknownRobot { robot: usize },

    /// Robot was stopped permanently and cannot be restarted.
    #[error("robot {robot} is permanently stopped")]
    PermanentlyStopped { robot: usize },

    /// A unit thread panicked while being joined.
    #[error("robot {robot} unit panicked")]
    UnitPanicked { robot: usize },

    /// Generic error.
    #[error("watchdog error: {0}")]
    Other(String),
}

/// Supervisor contract for robot unit lifecycle management.
pub trait Watchdog {
    /// Spawn the unit for `robot` with a fresh kill-switch.
    fn spawn_unit(&mut self, robot: usize) -> Result<(), WatchdogError>;

    /// Query the health of a managed unit.
    fn health_check(&self, robot: usize) -> UnitHealth;

    /// Stop, join and re-spawn the unit for `robot`.
    fn restart_unit(&mut self, robot: usize) -> Result<(), WatchdogError>;

    /// Stop and join every unit.
    fn shutdown_all(&mut self) -> Result<(), WatchdogError>;
}
