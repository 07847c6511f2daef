//! Sensor monitor.
//!
//! Watches the per-stream packet counters and timestamps and turns them
//! into lifecycle events:
//!
//! - **Disconnected**: zero every counter, emit `ResetStateVars`
//! - **WaitingForSensors**: emit `AllSensorsGo` once every stream has
//!   filled its share of the state window
//! - **Serving**: once per second, emit a loss event for every stream
//!   silent for more than two seconds

use sphero_common::consts::{
    LOSS_CHECK_INTERVAL, MONITOR_HOLDOFF, POLL_INTERVAL, STREAM_AUDIO, STREAM_DEPTH,
    STREAM_LOSS_THRESHOLD, STREAM_VIDEO, WARMUP_GRACE, robot_stream,
};
use sphero_shared_memory::{LifecycleEvent, LifecycleState, SharedState, now_micros};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Minimum sample counts every stream must reach before serving.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WarmupTargets {
    pub video: u32,
    pub depth: u32,
    pub audio: u32,
    pub robot: u32,
}

/// Stream-health watcher feeding the lifecycle state machine.
#[derive(Debug)]
pub struct SensorMonitor {
    state: Arc<SharedState>,
    targets: WarmupTargets,
    warmup_notice_after: Duration,
    holdoff_until: Option<Instant>,
    waiting_since: Option<Instant>,
    notice_logged: bool,
    next_loss_check: Option<Instant>,
}

impl SensorMonitor {
    pub fn new(state: Arc<SharedState>) -> Self {
        let config = state.config();
        let targets = WarmupTargets {
            video: config.camera_length_state() as u32,
            depth: config.camera_length_state() as u32,
            audio: config.audio_length_state() as u32,
            robot: config.robot_length_state() as u32,
        };
        let warmup_notice_after = WARMUP_GRACE + config.window();
        Self {
            state,
            targets,
            warmup_notice_after,
            holdoff_until: None,
            waiting_since: None,
            notice_logged: false,
            next_loss_check: None,
        }
    }

    pub fn targets(&self) -> WarmupTargets {
        self.targets
    }

    /// Poll until `stop` is set.
    pub fn run(mut self, stop: &AtomicBool) {
        info!(targets = ?self.targets, "sensor monitor started");
        while !stop.load(Ordering::Acquire) {
            self.step(Instant::now(), now_micros());
            thread::sleep(POLL_INTERVAL);
        }
        info!("sensor monitor stopped");
    }

    /// One monitor pass. Emitted events are queued on the shared state and
    /// also returned.
    pub fn step(&mut self, now: Instant, now_us: u64) -> Vec<LifecycleEvent> {
        if self.holdoff_until.is_some_and(|until| now < until) {
            return Vec::new();
        }
        self.holdoff_until = None;

        let events = match self.state.lifecycle() {
            LifecycleState::Disconnected => self.reset(now),
            LifecycleState::WaitingForSensors => self.check_warmup(now),
            LifecycleState::Serving => self.check_losses(now, now_us),
            LifecycleState::LowBattery | LifecycleState::Failed => Vec::new(),
        };
        for event in &events {
            self.state.emit(*event);
        }
        events
    }

    fn reset(&mut self, now: Instant) -> Vec<LifecycleEvent> {
        self.state.streams().reset();
        self.waiting_since = None;
        self.notice_logged = false;
        self.next_loss_check = None;
        self.holdoff_until = Some(now + MONITOR_HOLDOFF);
        debug!("stream counters reset");
        vec![LifecycleEvent::ResetStateVars]
    }

    fn check_warmup(&mut self, now: Instant) -> Vec<LifecycleEvent> {
        let since = *self.waiting_since.get_or_insert(now);
        let counters = self.state.streams().counters();

        if self.warmed_up(&counters) {
            info!(?counters, "all sensors live");
            self.holdoff_until = Some(now + MONITOR_HOLDOFF);
            self.next_loss_check = Some(now + LOSS_CHECK_INTERVAL);
            return vec![LifecycleEvent::AllSensorsGo];
        }
        if !self.notice_logged && now.saturating_duration_since(since) >= self.warmup_notice_after {
            warn!(?counters, targets = ?self.targets, "still waiting for sensors");
            self.notice_logged = true;
        }
        Vec::new()
    }

    fn warmed_up(&self, counters: &[u32]) -> bool {
        let robots = self.state.robot_count();
        let at = |i: usize| counters.get(i).copied().unwrap_or(0);
        at(STREAM_VIDEO) >= self.targets.video
            && at(STREAM_DEPTH) >= self.targets.depth
            && at(STREAM_AUDIO) >= self.targets.audio
            && (0..robots).all(|r| at(robot_stream(r)) >= self.targets.robot)
    }

    fn check_losses(&mut self, now: Instant, now_us: u64) -> Vec<LifecycleEvent> {
        if self.next_loss_check.is_some_and(|at| now < at) {
            return Vec::new();
        }
        self.next_loss_check = Some(now + LOSS_CHECK_INTERVAL);

        let threshold_us = STREAM_LOSS_THRESHOLD.as_micros() as u64;
        let timestamps = self.state.streams().timestamps_us();
        let events: Vec<_> = timestamps
            .iter()
            .enumerate()
            .filter(|(_, last)| now_us.saturating_sub(**last) > threshold_us)
            .map(|(stream, _)| match stream {
                STREAM_VIDEO => LifecycleEvent::RgbLost,
                STREAM_DEPTH => LifecycleEvent::DepthLost,
                STREAM_AUDIO => LifecycleEvent::AudioLost,
                other => LifecycleEvent::SpheroLost {
                    robot: other - robot_stream(0),
                },
            })
            .collect();
        for event in &events {
            warn!(%event, "stream lost");
        }
        events
    }
}
