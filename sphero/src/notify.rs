//! External low-battery alerts.

use serde::Serialize;
use tracing::warn;

/// Payload of a low-battery alert.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LowBatteryAlert<'a> {
    pub event: &'static str,
    pub robot: usize,
    pub voltages: &'a [f32],
}

impl<'a> LowBatteryAlert<'a> {
    pub fn new(robot: usize, voltages: &'a [f32]) -> Self {
        Self {
            event: "low_battery",
            robot,
            voltages,
        }
    }
}

/// Receiver of operator alerts.
pub trait Notifier: Send {
    /// `robot` was stopped for low battery; `voltages` holds the last
    /// reading of every robot.
    fn low_battery(&self, robot: usize, voltages: &[f32]);
}

/// Writes alerts as JSON to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn low_battery(&self, robot: usize, voltages: &[f32]) {
        match serde_json::to_string(&LowBatteryAlert::new(robot, voltages)) {
            Ok(alert) => warn!(target: "sphero::alert", %alert, "battery alert"),
            Err(e) => warn!(target: "sphero::alert", robot, error = %e, "battery alert not serialized"),
        }
    }
}
