//! Link-local heartbeat status.
//!
//! [`LinkPhase`] is the single explicit state machine of a robot session.
//! It only moves on a heartbeat tick; transport events update the flags in
//! [`HeartbeatStatus`] that the next tick inspects.

use sphero_common::consts::{BATTERY_POLL_INTERVAL, TELEMETRY_FRESHNESS};
use std::fmt;
use std::time::Instant;

/// Phase of a robot session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LinkPhase {
    /// Created, not yet connecting.
    #[default]
    Init,
    /// Connect issued; waiting for session and service discovery.
    AwaitingResolution,
    /// Subscribing to notifications.
    InitializingCharacteristics,
    /// Sending the wake signal and wake command.
    WakingUp,
    /// Waiting for the wake confirmation.
    AwaitingWake,
    /// Sending battery, LED, yaw and stabilization setup.
    Configuring,
    /// Waiting for the first voltage report.
    AwaitingVoltage,
    /// Sensor stream requested; waiting for telemetry.
    AwaitingSensorStream,
    /// Streaming telemetry and accepting actions.
    Running,
    /// Kill-switch raised; inert until the supervisor stops the unit.
    Restarting,
}

impl LinkPhase {
    /// Tag used in heartbeat log lines.
    pub fn tag(self) -> &'static str {
        match self {
            Self::Init | Self::AwaitingResolution => "start",
            Self::InitializingCharacteristics | Self::WakingUp | Self::AwaitingWake => "wake",
            Self::Configuring | Self::AwaitingVoltage => "voltage",
            Self::AwaitingSensorStream => "sensor",
            Self::Running => "beat",
            Self::Restarting => "restart",
        }
    }
}

impl fmt::Display for LinkPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Flags and timestamps the heartbeat decides on.
#[derive(Debug, Clone)]
pub struct HeartbeatStatus {
    pub phase: LinkPhase,
    pub connected: bool,
    pub services_resolved: bool,
    /// Starts `true`; cleared by the first notification failure.
    pub notifications_enabled: bool,
    pub awake: bool,
    pub last_voltage: Option<f32>,
    pub last_battery_poll: Option<Instant>,
    pub last_telemetry: Option<Instant>,
}

impl Default for HeartbeatStatus {
    fn default() -> Self {
        Self {
            phase: LinkPhase::Init,
            connected: false,
            services_resolved: false,
            notifications_enabled: true,
            awake: false,
            last_voltage: None,
            last_battery_poll: None,
            last_telemetry: None,
        }
    }
}

impl HeartbeatStatus {
    /// Connected, discovered and subscribed.
    pub fn session_ready(&self) -> bool {
        self.connected && self.services_resolved && self.notifications_enabled
    }

    /// Telemetry arrived within [`TELEMETRY_FRESHNESS`] of `now`.
    pub fn telemetry_fresh(&self, now: Instant) -> bool {
        self.last_telemetry
            .is_some_and(|t| now.saturating_duration_since(t) <= TELEMETRY_FRESHNESS)
    }

    /// Time for the periodic voltage poll.
    pub fn battery_poll_due(&self, now: Instant) -> bool {
        self.last_battery_poll
            .is_none_or(|t| now.saturating_duration_since(t) >= BATTERY_POLL_INTERVAL)
    }

    /// Last voltage is known and strictly below `threshold`.
    pub fn battery_low(&self, threshold: f32) -> bool {
        self.last_voltage.is_some_and(|v| v < threshold)
    }
}
