//! The fleet-wide shared state.
//!
//! Every buffer and scalar lives in one mapped [`Segment`]. The runtime
//! creates it under a name ([`SharedState::create`]) so client processes
//! can [`SharedState::attach`] to read snapshots and submit actions; tests
//! and single-process embeddings use a private mapping
//! ([`SharedState::new`]). Inside a process it is shared as
//! `Arc<SharedState>` by every thread: camera and microphone producers,
//! robot links, the sensor monitor, the lifecycle state machine and the
//! library facade.
//!
//! Lifecycle events travel over an in-process channel. Only the creating
//! process runs the monitor and the state machine that produce and consume
//! them.

use crate::action::ActionSlot;
use crate::audio::AudioBuffer;
use crate::error::{StateError, StateResult};
use crate::layout::Layout;
use crate::lifecycle::{LifecycleEvent, LifecycleState, LifecycleWriter};
use crate::lock::SpinLock;
use crate::ring::{FrameRing, RgbdRings, RgbdSnapshot};
use crate::segment::Segment;
use crate::stream::StreamStats;
use crate::telemetry::TelemetryHistory;
use crossbeam_channel::{Receiver, Sender, unbounded};
use sphero_common::config::FleetConfig;
use sphero_common::consts::{STREAM_AUDIO, STREAM_DEPTH, STREAM_VIDEO, robot_stream};
use sphero_common::protocol::Telemetry;
use std::mem::size_of;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU32, AtomicU64, Ordering};
use tracing::{debug, info, warn};

/// Shared buffers and scalars of the whole system.
#[derive(Debug)]
pub struct SharedState {
    config: FleetConfig,
    layout: Layout,
    segment: Arc<Segment>,
    events_tx: Sender<LifecycleEvent>,
    events_rx: Receiver<LifecycleEvent>,
}

impl SharedState {
    /// State on a private mapping, visible to this process only.
    pub fn new(config: &FleetConfig) -> StateResult<Self> {
        Self::build(config, Segment::anonymous)
    }

    /// State in the named segment `config.shared_memory.segment_path()`.
    ///
    /// # Errors
    /// Besides configuration errors, [`StateError::SegmentInUse`] while
    /// another live process owns the segment.
    pub fn create(config: &FleetConfig) -> StateResult<Self> {
        let path = config.shared_memory.segment_path();
        let state = Self::build(config, |len| Segment::create(&path, len))?;
        info!(path = %path.display(), bytes = state.segment.len(), "shared segment created");
        Ok(state)
    }

    fn build(
        config: &FleetConfig,
        map: impl FnOnce(usize) -> StateResult<Segment>,
    ) -> StateResult<Self> {
        config.validate()?;
        let layout = Layout::new(config)?;
        let blob = serde_json::to_vec(config)?;
        let segment = map(layout.end + blob.len())?;

        let cells = segment.slice::<AtomicU8>(layout.end, blob.len());
        for (cell, byte) in cells.iter().zip(&blob) {
            cell.store(*byte, Ordering::Relaxed);
        }
        segment.publish(layout.end, blob.len());

        debug!(
            robots = layout.robots,
            ring_frames = layout.ring_capacity,
            audio_samples = layout.audio_len,
            history = layout.history_depth,
            "shared state allocated"
        );
        Ok(Self::over(config.clone(), layout, segment))
    }

    /// Attach to a segment created by another process.
    ///
    /// The configuration is read back from the segment, so the caller needs
    /// nothing but the path.
    pub fn attach(path: &Path) -> StateResult<Self> {
        let segment = Segment::attach(path)?;
        let (offset, len) = segment.config_blob()?;
        let blob: Vec<u8> = segment
            .slice::<AtomicU8>(offset, len)
            .iter()
            .map(|b| b.load(Ordering::Relaxed))
            .collect();
        let config: FleetConfig = serde_json::from_slice(&blob)?;
        let layout = Layout::new(&config)?;
        if layout.end != offset {
            return Err(StateError::InvalidSegment {
                path: path.to_path_buf(),
                reason: format!("regions end at {}, config blob at {offset}", layout.end),
            });
        }
        info!(
            path = %path.display(),
            owner = segment.owner_pid(),
            robots = layout.robots,
            "attached to shared segment"
        );
        Ok(Self::over(config, layout, segment))
    }

    fn over(config: FleetConfig, layout: Layout, segment: Segment) -> Self {
        let (events_tx, events_rx) = unbounded();
        Self {
            config,
            layout,
            segment: Arc::new(segment),
            events_tx,
            events_rx,
        }
    }

    pub fn config(&self) -> &FleetConfig {
        &self.config
    }

    pub fn robot_count(&self) -> usize {
        self.layout.robots
    }

    /// File behind a named segment; `None` for a private one.
    pub fn segment_path(&self) -> Option<&Path> {
        self.segment.path()
    }

    /// Process that created the segment.
    pub fn owner_pid(&self) -> u32 {
        self.segment.owner_pid()
    }

    fn check_robot(&self, robot: usize) -> StateResult<()> {
        if robot < self.robot_count() {
            Ok(())
        } else {
            Err(StateError::RobotOutOfRange {
                index: robot,
                count: self.robot_count(),
            })
        }
    }

    // ─── Region views ───────────────────────────────────────────────

    fn rgbd(&self) -> RgbdRings<'_> {
        let l = &self.layout;
        let header = self.segment.header();
        RgbdRings::new(
            &header.rgbd_lock,
            FrameRing::from_parts(
                self.segment.slice(l.video, l.ring_capacity * l.rgb_frame_len),
                &header.video_pointer,
                l.rgb_frame_len,
            ),
            FrameRing::from_parts(
                self.segment.slice(l.depth, l.ring_capacity * l.depth_frame_len),
                &header.depth_pointer,
                l.depth_frame_len,
            ),
        )
    }

    fn audio(&self) -> AudioBuffer<'_> {
        AudioBuffer::from_parts(self.segment.slice(self.layout.audio, self.layout.audio_len))
    }

    fn history(&self, robot: usize) -> TelemetryHistory<'_> {
        let l = &self.layout;
        let lock_size = size_of::<SpinLock>();
        let cell_size = size_of::<AtomicU32>();
        TelemetryHistory::from_parts(
            self.segment.at(l.history_locks + robot * lock_size),
            self.segment.at(l.history_heads + robot * cell_size),
            self.segment.slice(
                l.history_rows + robot * l.history_len() * cell_size,
                l.history_len(),
            ),
            &self.config.sensor.output_variables,
        )
    }

    fn battery(&self) -> &[AtomicU32] {
        self.segment.slice(self.layout.battery, self.layout.robots)
    }

    fn actions(&self) -> &[ActionSlot] {
        self.segment.slice(self.layout.actions, self.layout.robots)
    }

    // ─── Camera / microphone producers ──────────────────────────────

    /// Write one RGB frame into the next ring slot.
    pub fn write_video_frame(&self, frame: &[u8], now_us: u64) -> StateResult<()> {
        self.rgbd().write_video(frame)?;
        self.streams().record(STREAM_VIDEO, now_us)
    }

    /// Write one depth frame into the next ring slot.
    pub fn write_depth_frame(&self, frame: &[u16], now_us: u64) -> StateResult<()> {
        self.rgbd().write_depth(frame)?;
        self.streams().record(STREAM_DEPTH, now_us)
    }

    /// Slide one microphone chunk into the audio window.
    pub fn push_audio_chunk(&self, chunk: &[f32], now_us: u64) -> StateResult<()> {
        self.audio().push_chunk(chunk)?;
        self.streams().record(STREAM_AUDIO, now_us)
    }

    // ─── Robot links ────────────────────────────────────────────────

    /// Store a decoded telemetry sample and count it.
    pub fn record_telemetry(&self, robot: usize, sample: &Telemetry, now_us: u64) -> StateResult<()> {
        self.check_robot(robot)?;
        self.history(robot).record(sample);
        self.streams().record(robot_stream(robot), now_us)
    }

    pub fn set_battery_voltage(&self, robot: usize, volts: f32) -> StateResult<()> {
        self.check_robot(robot)?;
        self.battery()[robot].store(volts.to_bits(), Ordering::Release);
        Ok(())
    }

    pub fn battery_voltage(&self, robot: usize) -> Option<f32> {
        self.battery()
            .get(robot)
            .map(|b| f32::from_bits(b.load(Ordering::Acquire)))
    }

    pub fn battery_voltages(&self) -> Vec<f32> {
        self.battery()
            .iter()
            .map(|b| f32::from_bits(b.load(Ordering::Acquire)))
            .collect()
    }

    pub fn action(&self, robot: usize) -> StateResult<&ActionSlot> {
        self.check_robot(robot)?;
        Ok(&self.actions()[robot])
    }

    // ─── Lifecycle ──────────────────────────────────────────────────

    pub fn lifecycle(&self) -> LifecycleState {
        self.segment.header().lifecycle.load()
    }

    /// Take the single lifecycle write capability.
    ///
    /// Returns `None` while it is held, by this or any other process.
    pub fn lifecycle_writer(&self) -> Option<LifecycleWriter> {
        let writer = LifecycleWriter::claim(Arc::clone(&self.segment));
        if writer.is_none() {
            let holder = self
                .segment
                .header()
                .lifecycle_writer
                .load(Ordering::Acquire);
            warn!(holder, "lifecycle writer already held");
        }
        writer
    }

    /// Queue a lifecycle event for the state machine.
    pub fn emit(&self, event: LifecycleEvent) {
        // Both ends live in `self`, so the channel never disconnects.
        let _ = self.events_tx.send(event);
    }

    /// Receiving end of the lifecycle event queue.
    pub fn events(&self) -> Receiver<LifecycleEvent> {
        self.events_rx.clone()
    }

    pub fn streams(&self) -> StreamStats<'_> {
        StreamStats::new(
            self.segment
                .slice::<AtomicU32>(self.layout.counters, self.layout.streams),
            self.segment
                .slice::<AtomicU64>(self.layout.timestamps, self.layout.streams),
        )
    }

    // ─── Consumers ──────────────────────────────────────────────────

    /// Down-sampled RGB-D copy taken under the shared pointer lock.
    pub fn rgbd_snapshot(&self) -> RgbdSnapshot {
        self.rgbd().snapshot(self.config.camera_output_skip())
    }

    /// Samples oldest first; the newest sample is last.
    pub fn audio_snapshot(&self) -> Vec<f32> {
        self.audio().snapshot()
    }

    /// Telemetry histories of every robot, newest row first.
    pub fn telemetry_snapshot(&self) -> Vec<Vec<Vec<f32>>> {
        (0..self.robot_count())
            .map(|robot| self.history(robot).rows())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionPhase;
    use sphero_common::protocol::TelemetryField;

    fn small_config() -> FleetConfig {
        let mut config = FleetConfig::default();
        config.camera.rgb_width = 2;
        config.camera.rgb_height = 1;
        config.camera.depth_width = 2;
        config.camera.depth_height = 1;
        config.audio.sample_rate = 40;
        config.sensor.output_variables = vec![TelemetryField::Yaw, TelemetryField::PositionX];
        config
    }

    fn named_config(dir: &Path) -> FleetConfig {
        let mut config = small_config();
        config.shared_memory.dir = dir.to_path_buf();
        config.shared_memory.name = "unit".to_string();
        config
    }

    #[test]
    fn telemetry_history_is_newest_first() {
        let state = SharedState::new(&small_config()).unwrap();
        for i in 1..=3 {
            let sample = Telemetry {
                yaw: i as f32,
                position_x: 10.0 * i as f32,
                ..Telemetry::default()
            };
            state.record_telemetry(1, &sample, 1000 + i).unwrap();
        }
        let rows = &state.telemetry_snapshot()[1];
        assert_eq!(rows.len(), 18);
        assert_eq!(rows[0], vec![3.0, 30.0]);
        assert_eq!(rows[2], vec![1.0, 10.0]);
        assert_eq!(rows[3], vec![0.0, 0.0]);
        assert_eq!(state.telemetry_snapshot()[0][0], vec![0.0, 0.0]);
        assert_eq!(state.streams().count(robot_stream(1)), 3);
        assert_eq!(state.streams().last_update_us(robot_stream(1)), 1003);
    }

    #[test]
    fn robot_index_is_checked() {
        let state = SharedState::new(&small_config()).unwrap();
        assert!(matches!(
            state.record_telemetry(2, &Telemetry::default(), 0),
            Err(StateError::RobotOutOfRange { index: 2, count: 2 })
        ));
        assert!(state.action(5).is_err());
        assert!(state.set_battery_voltage(9, 4.0).is_err());
    }

    #[test]
    fn camera_writes_are_counted() {
        let state = SharedState::new(&small_config()).unwrap();
        state.write_video_frame(&[1, 2, 3, 4, 5, 6], 10).unwrap();
        state.write_depth_frame(&[7, 8], 11).unwrap();
        assert!(state.write_depth_frame(&[7], 12).is_err());
        assert_eq!(state.streams().counters()[..2], [1, 1]);
        let snap = state.rgbd_snapshot();
        assert_eq!(snap.video.len(), 12);
        assert_eq!(snap.video.last().unwrap(), &vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn lifecycle_writer_is_unique() {
        let state = SharedState::new(&small_config()).unwrap();
        let writer = state.lifecycle_writer().expect("first");
        assert!(state.lifecycle_writer().is_none());
        writer.store(LifecycleState::WaitingForSensors);
        assert_eq!(state.lifecycle(), LifecycleState::WaitingForSensors);
    }

    #[test]
    fn events_are_fifo() {
        let state = SharedState::new(&small_config()).unwrap();
        state.emit(LifecycleEvent::ResetStateVars);
        state.emit(LifecycleEvent::AllSensorsGo);
        let rx = state.events();
        assert_eq!(rx.try_recv().unwrap(), LifecycleEvent::ResetStateVars);
        assert_eq!(rx.try_recv().unwrap(), LifecycleEvent::AllSensorsGo);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut config = small_config();
        config.camera.target_fps = 7;
        assert!(matches!(
            SharedState::new(&config),
            Err(StateError::Config(_))
        ));
    }

    #[test]
    fn private_state_has_no_path() {
        let state = SharedState::new(&small_config()).unwrap();
        assert!(state.segment_path().is_none());
        assert_eq!(state.owner_pid(), std::process::id());
    }

    #[test]
    fn attached_state_shares_every_region() {
        let dir = tempfile::tempdir().unwrap();
        let owner = SharedState::create(&named_config(dir.path())).unwrap();
        let path = owner.segment_path().unwrap().to_path_buf();
        assert_eq!(path, dir.path().join("sphero_unit"));
        let client = SharedState::attach(&path).unwrap();

        assert_eq!(client.robot_count(), 2);
        assert_eq!(
            client.config().sensor.output_variables,
            owner.config().sensor.output_variables
        );

        owner.write_video_frame(&[1, 2, 3, 4, 5, 6], 10).unwrap();
        owner.push_audio_chunk(&[0.5, 0.25], 20).unwrap();
        owner.set_battery_voltage(1, 3.9).unwrap();
        owner
            .record_telemetry(0, &Telemetry { yaw: 42.0, ..Telemetry::default() }, 30)
            .unwrap();
        let writer = owner.lifecycle_writer().unwrap();
        writer.store(LifecycleState::Serving);

        assert_eq!(
            client.rgbd_snapshot().video.last().unwrap(),
            &vec![1, 2, 3, 4, 5, 6]
        );
        let audio = client.audio_snapshot();
        assert_eq!(audio[audio.len() - 2..], [0.5, 0.25]);
        assert_eq!(client.battery_voltage(1), Some(3.9));
        assert_eq!(client.telemetry_snapshot()[0][0], vec![42.0, 0.0]);
        assert_eq!(client.streams().timestamps_us()[..3], [10, 0, 20]);
        assert_eq!(client.lifecycle(), LifecycleState::Serving);
        assert!(client.lifecycle_writer().is_none());

        assert!(client.action(1).unwrap().submit(90, 100));
        assert_eq!(owner.action(1).unwrap().phase(), ActionPhase::Queued);
        assert_eq!(owner.action(1).unwrap().command(), (90, 100));
    }

    #[test]
    fn second_creator_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let config = named_config(dir.path());
        let _owner = SharedState::create(&config).unwrap();
        assert!(matches!(
            SharedState::create(&config),
            Err(StateError::SegmentInUse { pid, .. }) if pid == std::process::id()
        ));
    }

    #[test]
    fn segment_disappears_with_its_owner() {
        let dir = tempfile::tempdir().unwrap();
        let config = named_config(dir.path());
        let path = config.shared_memory.segment_path();
        let owner = SharedState::create(&config).unwrap();
        let client = SharedState::attach(&path).unwrap();
        drop(owner);
        assert!(!path.exists());
        // Existing mappings stay usable.
        client.set_battery_voltage(0, 3.5).unwrap();
        assert_eq!(client.battery_voltage(0), Some(3.5));
        assert!(matches!(
            SharedState::attach(&path),
            Err(StateError::SegmentNotFound { .. })
        ));
    }
}
