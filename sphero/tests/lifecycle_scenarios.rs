//! Sensor monitor and lifecycle state machine stepped together.
//!
//! Both are driven with explicit instants and microsecond timestamps, the
//! way their threads drive them, so warm-up gating and loss detection are
//! checked without sleeping.

use sphero::{LifecycleStateMachine, SensorMonitor};
use sphero_common::config::FleetConfig;
use sphero_common::protocol::Telemetry;
use sphero_shared_memory::{LifecycleEvent, LifecycleState, SharedState};
use std::sync::Arc;
use std::time::{Duration, Instant};

const T0_US: u64 = 10_000_000;

struct Harness {
    state: Arc<SharedState>,
    machine: LifecycleStateMachine,
    monitor: SensorMonitor,
    t0: Instant,
}

impl Harness {
    fn new() -> Self {
        let mut config = FleetConfig::default();
        config.fleet.robot_count = 1;
        config.camera.rgb_width = 2;
        config.camera.rgb_height = 1;
        config.camera.depth_width = 2;
        config.camera.depth_height = 1;
        config.audio.sample_rate = 100;
        let state = Arc::new(SharedState::new(&config).expect("state"));
        let machine = LifecycleStateMachine::new(
            state.lifecycle_writer().expect("writer"),
            state.events(),
        );
        let monitor = SensorMonitor::new(Arc::clone(&state));
        Self {
            state,
            machine,
            monitor,
            t0: Instant::now(),
        }
    }

    /// One monitor pass followed by the state machine draining its queue.
    fn step(&mut self, ms: u64, now_us: u64) -> Vec<LifecycleEvent> {
        let events = self
            .monitor
            .step(self.t0 + Duration::from_millis(ms), now_us);
        self.machine.drain();
        events
    }

    fn video(&self, n: u32, now_us: u64) {
        for _ in 0..n {
            self.state.write_video_frame(&[1; 6], now_us).unwrap();
        }
    }

    fn depth(&self, n: u32, now_us: u64) {
        for _ in 0..n {
            self.state.write_depth_frame(&[1; 2], now_us).unwrap();
        }
    }

    fn audio(&self, n: u32, now_us: u64) {
        for _ in 0..n {
            self.state.push_audio_chunk(&[0.1; 5], now_us).unwrap();
        }
    }

    fn robot(&self, n: u32, now_us: u64) {
        for _ in 0..n {
            self.state
                .record_telemetry(0, &Telemetry::default(), now_us)
                .unwrap();
        }
    }

    /// Reset, warm every stream up at `T0_US`, reach Serving at 600 ms.
    fn bring_to_serving(&mut self) {
        assert_eq!(self.step(0, T0_US), vec![LifecycleEvent::ResetStateVars]);
        let targets = self.monitor.targets();
        self.video(targets.video, T0_US);
        self.depth(targets.depth, T0_US);
        self.audio(targets.audio, T0_US);
        self.robot(targets.robot, T0_US);
        assert_eq!(self.step(600, T0_US), vec![LifecycleEvent::AllSensorsGo]);
        assert_eq!(self.machine.state(), LifecycleState::Serving);
    }
}

#[test]
fn warm_up_waits_for_every_stream() {
    let mut h = Harness::new();
    assert_eq!(h.step(0, T0_US), vec![LifecycleEvent::ResetStateVars]);
    assert_eq!(h.machine.state(), LifecycleState::WaitingForSensors);

    let targets = h.monitor.targets();
    h.video(targets.video, T0_US);
    h.depth(targets.depth, T0_US);
    h.audio(targets.audio, T0_US);
    h.robot(targets.robot - 1, T0_US);

    assert!(h.step(600, T0_US).is_empty());
    assert!(h.step(700, T0_US).is_empty());
    assert_eq!(h.machine.state(), LifecycleState::WaitingForSensors);

    h.robot(1, T0_US);
    assert_eq!(h.step(800, T0_US), vec![LifecycleEvent::AllSensorsGo]);
    assert_eq!(h.machine.state(), LifecycleState::Serving);
}

#[test]
fn silent_camera_fails_the_library() {
    let mut h = Harness::new();
    h.bring_to_serving();

    // Everything but the RGB stream keeps flowing.
    let later = T0_US + 2_000_000;
    h.depth(1, later);
    h.audio(1, later);
    h.robot(1, later);

    let events = h.step(1_600, T0_US + 2_100_000);
    assert_eq!(events, vec![LifecycleEvent::RgbLost]);
    assert_eq!(h.machine.state(), LifecycleState::Failed);
    assert_eq!(h.state.lifecycle(), LifecycleState::Failed);

    // Failed is absorbing and the monitor goes quiet.
    h.state.emit(LifecycleEvent::ResetStateVars);
    assert!(h.step(5_000, T0_US + 10_000_000).is_empty());
    assert_eq!(h.machine.state(), LifecycleState::Failed);
}

#[test]
fn losses_are_checked_once_per_second() {
    let mut h = Harness::new();
    h.bring_to_serving();

    // Stale enough, but the next check is only due at 1.6 s.
    assert!(h.step(1_200, T0_US + 2_500_000).is_empty());
    assert_eq!(h.machine.state(), LifecycleState::Serving);
}

#[test]
fn lost_robot_restarts_warm_up() {
    let mut h = Harness::new();
    h.bring_to_serving();

    let later = T0_US + 2_000_000;
    h.video(1, later);
    h.depth(1, later);
    h.audio(1, later);

    let events = h.step(1_600, T0_US + 2_100_000);
    assert_eq!(events, vec![LifecycleEvent::SpheroLost { robot: 0 }]);
    assert_eq!(h.machine.state(), LifecycleState::Disconnected);

    assert_eq!(
        h.step(1_601, T0_US + 2_100_000),
        vec![LifecycleEvent::ResetStateVars]
    );
    assert_eq!(h.machine.state(), LifecycleState::WaitingForSensors);
    assert_eq!(h.state.streams().counters(), vec![0, 0, 0, 0]);
}

#[test]
fn low_battery_parks_the_library() {
    let mut h = Harness::new();
    h.bring_to_serving();

    h.state.emit(LifecycleEvent::BatteriesLow { robot: 0 });
    assert!(h.step(1_600, T0_US + 500_000).is_empty());
    assert_eq!(h.machine.state(), LifecycleState::LowBattery);
    assert!(h.step(3_000, T0_US + 9_000_000).is_empty());
    assert_eq!(h.machine.state(), LifecycleState::LowBattery);
}
