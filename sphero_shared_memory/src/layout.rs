//! Byte offsets of every region in a segment.
//!
//! Derived from the fleet configuration alone, so a process attaching to a
//! segment recomputes the same layout from the embedded config blob. Each
//! region starts on its own cache line.

use crate::action::ActionSlot;
use crate::error::{StateError, StateResult};
use crate::lock::SpinLock;
use crate::segment::HEADER_LEN;
use sphero_common::config::FleetConfig;
use sphero_common::consts::CACHE_LINE_SIZE;
use std::mem::size_of;
use std::sync::atomic::{AtomicU8, AtomicU16, AtomicU32, AtomicU64};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub ring_capacity: usize,
    pub rgb_frame_len: usize,
    pub depth_frame_len: usize,
    pub audio_len: usize,
    pub robots: usize,
    pub history_depth: usize,
    pub history_width: usize,
    pub streams: usize,

    pub video: usize,
    pub depth: usize,
    pub audio: usize,
    pub history_locks: usize,
    pub history_heads: usize,
    pub history_rows: usize,
    pub battery: usize,
    pub actions: usize,
    pub counters: usize,
    pub timestamps: usize,
    /// First byte past the regions, where the config blob goes.
    pub end: usize,
}

struct Cursor(usize);

impl Cursor {
    fn take<T>(&mut self, count: usize) -> StateResult<usize> {
        let start = self.0.next_multiple_of(CACHE_LINE_SIZE);
        self.0 = count
            .checked_mul(size_of::<T>())
            .and_then(|n| n.checked_add(start))
            .ok_or(StateError::InvalidCapacity {
                what: "segment size",
            })?;
        Ok(start)
    }
}

impl Layout {
    /// # Errors
    /// [`StateError::InvalidCapacity`] when a ring, frame, audio window or
    /// telemetry history would be empty.
    pub fn new(config: &FleetConfig) -> StateResult<Self> {
        let ring_capacity = config.camera_length_state_full();
        let rgb_frame_len = config.camera.rgb_frame_len();
        let depth_frame_len = config.camera.depth_frame_len();
        let audio_len = config.audio_buffer_len();
        let robots = config.fleet.robot_count;
        let history_depth = config.robot_length_state();
        let history_width = config.sensor.output_variables.len();
        let streams = config.stream_count();

        for (len, what) in [
            (ring_capacity, "ring capacity"),
            (rgb_frame_len, "frame length"),
            (depth_frame_len, "frame length"),
            (audio_len, "audio buffer"),
            (history_depth, "telemetry history"),
            (history_width, "telemetry history"),
        ] {
            if len == 0 {
                return Err(StateError::InvalidCapacity { what });
            }
        }

        let mut cursor = Cursor(HEADER_LEN);
        let video = cursor.take::<AtomicU8>(ring_capacity * rgb_frame_len)?;
        let depth = cursor.take::<AtomicU16>(ring_capacity * depth_frame_len)?;
        let audio = cursor.take::<AtomicU32>(audio_len)?;
        let history_locks = cursor.take::<SpinLock>(robots)?;
        let history_heads = cursor.take::<AtomicU32>(robots)?;
        let history_rows = cursor.take::<AtomicU32>(robots * history_depth * history_width)?;
        let battery = cursor.take::<AtomicU32>(robots)?;
        let actions = cursor.take::<ActionSlot>(robots)?;
        let counters = cursor.take::<AtomicU32>(streams)?;
        let timestamps = cursor.take::<AtomicU64>(streams)?;
        let end = cursor.take::<u8>(0)?;

        Ok(Self {
            ring_capacity,
            rgb_frame_len,
            depth_frame_len,
            audio_len,
            robots,
            history_depth,
            history_width,
            streams,
            video,
            depth,
            audio,
            history_locks,
            history_heads,
            history_rows,
            battery,
            actions,
            counters,
            timestamps,
            end,
        })
    }

    /// Number of `f32` cells in one robot's history.
    pub fn history_len(&self) -> usize {
        self.history_depth * self.history_width
    }
}
