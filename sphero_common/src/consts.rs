//! System-wide constants for the Sphero workspace.
//!
//! Single source of truth for stream indices, polling periods and timing
//! thresholds. Imported by all crates.

use std::time::Duration;

/// Maximum number of robots a single fleet can drive.
pub const MAX_ROBOTS: usize = 8;

/// Number of non-robot streams (video, depth, audio).
pub const AMBIENT_STREAMS: usize = 3;

/// Stream index of the RGB camera.
pub const STREAM_VIDEO: usize = 0;

/// Stream index of the depth camera.
pub const STREAM_DEPTH: usize = 1;

/// Stream index of the microphone.
pub const STREAM_AUDIO: usize = 2;

/// Stream index of robot `robot`'s telemetry.
#[inline]
pub const fn robot_stream(robot: usize) -> usize {
    AMBIENT_STREAMS + robot
}

/// Largest heading accepted by the library, in degrees.
pub const MAX_HEADING_DEG: u16 = 360;

/// Largest speed accepted by the library, in device units.
pub const MAX_SPEED_UNITS: u16 = 255;

/// Poll period shared by the monitor, state machine, supervisor and facade.
pub const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Heartbeat tick of a robot link.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(1);

/// Maximum telemetry age for a link to be (or stay) running.
pub const TELEMETRY_FRESHNESS: Duration = Duration::from_millis(500);

/// Interval between battery voltage polls while running.
pub const BATTERY_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Confirmation window for each step of the action handshake.
pub const HANDSHAKE_CONFIRM_WINDOW: Duration = Duration::from_millis(200);

/// Monitor hold-off after emitting a reset or all-go event.
pub const MONITOR_HOLDOFF: Duration = Duration::from_millis(500);

/// Extra warm-up time (on top of the state window) before the monitor
/// logs that it is still waiting for sensors.
pub const WARMUP_GRACE: Duration = Duration::from_secs(20);

/// Interval between stream-loss checks while serving.
pub const LOSS_CHECK_INTERVAL: Duration = Duration::from_secs(1);

/// A stream whose last update is older than this is considered lost.
pub const STREAM_LOSS_THRESHOLD: Duration = Duration::from_secs(2);

/// Default cooldown before restarting a crashed robot unit.
pub const DEFAULT_CRASH_COOLDOWN_SECS: u64 = 30;

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "config/sphero.toml";

/// Log file receiving per-robot session events.
pub const ROBOT_LOG_FILE: &str = "Spheros.log";

/// Log file receiving general library events.
pub const LIBRARY_LOG_FILE: &str = "Library.log";

/// Tracing target used by robot sessions.
pub const ROBOT_LOG_TARGET: &str = "sphero::robot";

// ─── Shared memory ──────────────────────────────────────────────────

/// Default directory for the shared-memory segment.
pub const DEFAULT_SHM_DIR: &str = "/dev/shm";

/// Default shared-memory segment name.
pub const DEFAULT_SHM_NAME: &str = "fleet";

/// File name prefix of every segment.
pub const SHM_SEGMENT_PREFIX: &str = "sphero_";

/// Magic number identifying an initialised segment ("SPHEROSM").
pub const SHM_MAGIC: u64 = 0x5350_4845_524F_534D;

/// Bumped whenever the segment layout changes.
pub const SHM_LAYOUT_VERSION: u32 = 1;

/// Alignment of every region inside a segment.
pub const CACHE_LINE_SIZE: usize = 64;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_indices_are_disjoint() {
        assert_eq!(STREAM_VIDEO, 0);
        assert_eq!(STREAM_DEPTH, 1);
        assert_eq!(STREAM_AUDIO, 2);
        assert_eq!(robot_stream(0), 3);
        assert_eq!(robot_stream(MAX_ROBOTS - 1), AMBIENT_STREAMS + MAX_ROBOTS - 1);
    }

    #[test]
    fn timing_thresholds_are_ordered() {
        assert!(HANDSHAKE_CONFIRM_WINDOW < TELEMETRY_FRESHNESS);
        assert!(TELEMETRY_FRESHNESS < HEARTBEAT_INTERVAL);
        assert!(LOSS_CHECK_INTERVAL < STREAM_LOSS_THRESHOLD);
    }
}
