//! Prelude module for common re-exports.
//!
//! ```rust
//! use sphero_common::prelude::*;
//! ```

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, FleetConfig, LogLevel, SharedConfig};

// ─── System Constants ───────────────────────────────────────────────
pub use crate::consts::{MAX_ROBOTS, POLL_INTERVAL, robot_stream};

// ─── Protocol ───────────────────────────────────────────────────────
pub use crate::protocol::{
    CommandMessage, FrameDecoder, ProtocolError, Request, Telemetry, TelemetryField,
};

// ─── Transport ──────────────────────────────────────────────────────
pub use crate::transport::{Transport, TransportError, TransportEvent, TransportFactory};

// ─── Supervision ────────────────────────────────────────────────────
pub use crate::watchdog::{KillCode, KillSwitch, UnitHealth, Watchdog, WatchdogError};
