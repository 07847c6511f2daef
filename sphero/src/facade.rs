//! Library facade.
//!
//! The caller-facing API: blocking snapshot reads and blocking robot
//! actions. Both calls poll the shared state every millisecond and have no
//! timeout; they return once the library is serving (and, for actions,
//! once the robot has finished the handshake).
//!
//! A client in another process reaches a running fleet through
//! [`SpheroLibrary::attach`] on the runtime's segment path.

use crate::error::{FacadeError, SpheroResult};
use serde::Serialize;
use sphero_common::consts::{MAX_HEADING_DEG, MAX_SPEED_UNITS, POLL_INTERVAL};
use sphero_shared_memory::{ActionPhase, LifecycleState, SharedState};
use std::path::Path;
use std::sync::Arc;
use std::thread;
use tracing::{debug, info};

/// Copy of every sensor window at one instant.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SensorSnapshot {
    /// Down-sampled RGB frames, oldest first.
    pub video: Vec<Vec<u8>>,
    /// Down-sampled depth frames, oldest first.
    pub depth: Vec<Vec<u16>>,
    /// Microphone sliding buffer, newest sample last.
    pub audio: Vec<f32>,
    /// Per robot, per sample, the configured output fields.
    pub telemetry: Vec<Vec<Vec<f32>>>,
    /// Last battery reading per robot in volts, `0.0` until polled.
    pub battery: Vec<f32>,
}

/// Last-update time per stream in microseconds since the UNIX epoch.
///
/// Index `0` video, `1` depth, `2` audio, `3 + i` robot `i`.
pub type Timestamps = Vec<u64>;

/// Entry point for library clients.
#[derive(Debug, Clone)]
pub struct SpheroLibrary {
    state: Arc<SharedState>,
}

impl SpheroLibrary {
    pub fn new(state: Arc<SharedState>) -> Self {
        Self { state }
    }

    /// Attach to the segment of a fleet runtime running in another process.
    ///
    /// # Errors
    /// Fails if no runtime has published a segment at `path`.
    pub fn attach(path: &Path) -> SpheroResult<Self> {
        let state = SharedState::attach(path)?;
        info!(path = %path.display(), robots = state.robot_count(), "library attached");
        Ok(Self::new(Arc::new(state)))
    }

    pub fn robot_count(&self) -> usize {
        self.state.robot_count()
    }

    pub fn lifecycle(&self) -> LifecycleState {
        self.state.lifecycle()
    }

    /// Wait until the library is serving, then copy every sensor window.
    pub fn get_sphero_states(&self) -> (SensorSnapshot, Timestamps) {
        self.wait_for_serving();
        self.snapshot()
    }

    /// Copy every sensor window if the library is serving.
    pub fn try_get_sphero_states(&self) -> Option<(SensorSnapshot, Timestamps)> {
        (self.state.lifecycle() == LifecycleState::Serving).then(|| self.snapshot())
    }

    /// Drive `robot` along `heading_deg` at `speed_units`.
    ///
    /// Blocks until serving, until the robot's previous action finished,
    /// and until this one has been acknowledged by the robot.
    ///
    /// # Errors
    /// Rejects an unknown robot or an out-of-range heading or speed
    /// without blocking.
    pub fn set_sphero_action(
        &self,
        robot: usize,
        heading_deg: u16,
        speed_units: u16,
    ) -> Result<bool, FacadeError> {
        let count = self.state.robot_count();
        let slot = self
            .state
            .action(robot)
            .map_err(|_| FacadeError::RobotOutOfRange { robot, count })?;
        if heading_deg > MAX_HEADING_DEG {
            return Err(FacadeError::HeadingOutOfRange(heading_deg));
        }
        if speed_units > MAX_SPEED_UNITS {
            return Err(FacadeError::SpeedOutOfRange(speed_units));
        }

        self.wait_for_serving();
        while slot.phase() != ActionPhase::Idle {
            thread::sleep(POLL_INTERVAL);
        }
        while !slot.submit(heading_deg, speed_units) {
            thread::sleep(POLL_INTERVAL);
        }
        debug!(robot, heading_deg, speed_units, "action queued");
        while slot.phase() != ActionPhase::Idle {
            thread::sleep(POLL_INTERVAL);
        }
        info!(robot, heading_deg, speed_units, "action completed");
        Ok(true)
    }

    fn wait_for_serving(&self) {
        while self.state.lifecycle() != LifecycleState::Serving {
            thread::sleep(POLL_INTERVAL);
        }
    }

    fn snapshot(&self) -> (SensorSnapshot, Timestamps) {
        let rgbd = self.state.rgbd_snapshot();
        let snapshot = SensorSnapshot {
            video: rgbd.video,
            depth: rgbd.depth,
            audio: self.state.audio_snapshot(),
            telemetry: self.state.telemetry_snapshot(),
            battery: self.state.battery_voltages(),
        };
        (snapshot, self.state.streams().timestamps_us())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sphero_common::config::FleetConfig;

    fn small_config() -> FleetConfig {
        let mut config = FleetConfig::default();
        config.camera.rgb_width = 2;
        config.camera.rgb_height = 1;
        config.camera.depth_width = 2;
        config.camera.depth_height = 1;
        config
    }

    fn library() -> SpheroLibrary {
        SpheroLibrary::new(Arc::new(SharedState::new(&small_config()).unwrap()))
    }

    #[test]
    fn invalid_arguments_fail_without_blocking() {
        let lib = library();
        assert_eq!(lib.lifecycle(), LifecycleState::Disconnected);
        assert_eq!(
            lib.set_sphero_action(2, 0, 0),
            Err(FacadeError::RobotOutOfRange { robot: 2, count: 2 })
        );
        assert_eq!(
            lib.set_sphero_action(0, 361, 0),
            Err(FacadeError::HeadingOutOfRange(361))
        );
        assert_eq!(
            lib.set_sphero_action(1, 360, 256),
            Err(FacadeError::SpeedOutOfRange(256))
        );
    }

    #[test]
    fn try_get_requires_serving() {
        let lib = library();
        assert!(lib.try_get_sphero_states().is_none());
        lib.state.lifecycle_writer().unwrap().store(LifecycleState::Serving);
        let (snapshot, timestamps) = lib.try_get_sphero_states().unwrap();
        assert_eq!(timestamps.len(), 3 + lib.robot_count());
        assert_eq!(snapshot.telemetry.len(), 2);
        assert_eq!(snapshot.battery.len(), 2);
    }

    #[test]
    fn attached_library_reads_and_acts_on_owner_segment() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = small_config();
        config.shared_memory.dir = dir.path().to_path_buf();
        let owner = Arc::new(SharedState::create(&config).unwrap());
        let writer = owner.lifecycle_writer().unwrap();
        owner.write_video_frame(&[9, 8, 7, 6, 5, 4], 77).unwrap();
        writer.store(LifecycleState::Serving);

        let client = SpheroLibrary::attach(&config.shared_memory.segment_path()).unwrap();
        assert_eq!(client.robot_count(), 2);
        let (snapshot, timestamps) = client.get_sphero_states();
        assert_eq!(snapshot.video.last().unwrap(), &vec![9, 8, 7, 6, 5, 4]);
        assert_eq!(timestamps[0], 77);

        // Owner side plays the robot link for robot 1.
        let link_state = Arc::clone(&owner);
        let link = thread::spawn(move || {
            let slot = link_state.action(1).unwrap();
            let mut steps = 0;
            while steps < 5 {
                let phase = slot.phase();
                if phase != ActionPhase::Idle && slot.advance(phase) {
                    steps += 1;
                }
                thread::sleep(POLL_INTERVAL);
            }
            slot.command()
        });
        assert_eq!(client.set_sphero_action(1, 120, 30), Ok(true));
        assert_eq!(link.join().unwrap(), (120, 30));
    }

    #[test]
    fn attach_without_runtime_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(SpheroLibrary::attach(&dir.path().join("sphero_none")).is_err());
    }
}
