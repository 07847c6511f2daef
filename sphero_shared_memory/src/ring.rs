//! Fixed-capacity frame rings for the RGB and depth streams.
//!
//! Both rings are views over segment memory. They share one lock
//! ([`RgbdRings`]) so a reader always sees the two write pointers from the
//! same instant and frame/depth pairs stay index-aligned.

use crate::error::{StateError, StateResult};
use crate::lock::SpinLock;
use std::sync::atomic::{AtomicU8, AtomicU16, AtomicU32, Ordering};

/// Atomic cell holding one frame element.
pub trait RingElement: Sync {
    type Value: Copy + Default;

    fn get(&self) -> Self::Value;
    fn set(&self, value: Self::Value);
}

impl RingElement for AtomicU8 {
    type Value = u8;

    fn get(&self) -> u8 {
        self.load(Ordering::Relaxed)
    }

    fn set(&self, value: u8) {
        self.store(value, Ordering::Relaxed);
    }
}

impl RingElement for AtomicU16 {
    type Value = u16;

    fn get(&self) -> u16 {
        self.load(Ordering::Relaxed)
    }

    fn set(&self, value: u16) {
        self.store(value, Ordering::Relaxed);
    }
}

/// Circular array of equally sized frames with a single write pointer.
///
/// The pointer always lies in `[0, capacity)` and names the slot the next
/// frame will overwrite, which is also the oldest frame held. Writes must
/// be serialized by the caller.
#[derive(Debug)]
pub struct FrameRing<'a, E> {
    data: &'a [E],
    pointer: &'a AtomicU32,
    frame_len: usize,
    capacity: usize,
}

impl<'a, E: RingElement> FrameRing<'a, E> {
    /// View `data` as frames of `frame_len` elements.
    pub fn new(data: &'a [E], pointer: &'a AtomicU32, frame_len: usize) -> StateResult<Self> {
        if frame_len == 0 {
            return Err(StateError::InvalidCapacity { what: "frame length" });
        }
        if data.len() < frame_len || data.len() % frame_len != 0 {
            return Err(StateError::InvalidCapacity { what: "ring capacity" });
        }
        Ok(Self::from_parts(data, pointer, frame_len))
    }

    /// View over a region already sized by the segment layout.
    pub(crate) fn from_parts(data: &'a [E], pointer: &'a AtomicU32, frame_len: usize) -> Self {
        Self {
            data,
            pointer,
            frame_len,
            capacity: data.len() / frame_len,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn frame_len(&self) -> usize {
        self.frame_len
    }

    pub fn pointer(&self) -> usize {
        self.pointer.load(Ordering::Acquire) as usize % self.capacity
    }

    fn frame(&self, slot: usize) -> &'a [E] {
        let start = slot * self.frame_len;
        &self.data[start..start + self.frame_len]
    }

    /// Copy `frame` into the slot under the pointer and advance it by one.
    ///
    /// Returns the slot that was written.
    pub fn write(&self, frame: &[E::Value]) -> StateResult<usize> {
        if frame.len() != self.frame_len {
            return Err(StateError::FrameSize {
                expected: self.frame_len,
                actual: frame.len(),
            });
        }
        let slot = self.pointer();
        for (cell, value) in self.frame(slot).iter().zip(frame) {
            cell.set(*value);
        }
        let next = (slot + 1) % self.capacity;
        self.pointer.store(next as u32, Ordering::Release);
        Ok(slot)
    }

    /// Frame stored in `slot`.
    pub fn slot(&self, slot: usize) -> Option<Vec<E::Value>> {
        (slot < self.capacity).then(|| self.frame(slot).iter().map(E::get).collect())
    }

    /// Copy every `stride`-th frame, counting back from the newest one,
    /// returned oldest first.
    ///
    /// With capacity 60 and stride 5 this yields 12 frames, the last being
    /// the most recent write.
    pub fn snapshot(&self, stride: usize) -> Vec<Vec<E::Value>> {
        let stride = stride.max(1);
        let n = self.capacity;
        let pointer = self.pointer();
        (0..n)
            .filter(|age| (n - 1 - age) % stride == 0)
            .map(|age| self.frame((pointer + age) % n).iter().map(E::get).collect())
            .collect()
    }
}

/// Video and depth rings guarded together.
#[derive(Debug)]
pub struct RgbdRings<'a> {
    lock: &'a SpinLock,
    pub video: FrameRing<'a, AtomicU8>,
    pub depth: FrameRing<'a, AtomicU16>,
}

/// Down-sampled copy of both camera rings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RgbdSnapshot {
    /// RGB frames, oldest first.
    pub video: Vec<Vec<u8>>,
    /// Depth frames, oldest first.
    pub depth: Vec<Vec<u16>>,
}

impl<'a> RgbdRings<'a> {
    pub fn new(
        lock: &'a SpinLock,
        video: FrameRing<'a, AtomicU8>,
        depth: FrameRing<'a, AtomicU16>,
    ) -> Self {
        Self { lock, video, depth }
    }

    pub fn write_video(&self, frame: &[u8]) -> StateResult<usize> {
        let _guard = self.lock.lock();
        self.video.write(frame)
    }

    pub fn write_depth(&self, frame: &[u16]) -> StateResult<usize> {
        let _guard = self.lock.lock();
        self.depth.write(frame)
    }

    pub fn snapshot(&self, stride: usize) -> RgbdSnapshot {
        let _guard = self.lock.lock();
        RgbdSnapshot {
            video: self.video.snapshot(stride),
            depth: self.depth.snapshot(stride),
        }
    }
}
