//! Lock-free sliding audio window.
//!
//! Each sample is an `AtomicU32` holding `f32` bits in segment memory. The
//! microphone is the only writer; readers may observe a window that is
//! mid-shift, which is accepted staleness.

use crate::error::{StateError, StateResult};
use std::sync::atomic::{AtomicU32, Ordering};

/// Fixed-length window of the most recent audio samples, oldest first.
#[derive(Debug, Clone, Copy)]
pub struct AudioBuffer<'a> {
    samples: &'a [AtomicU32],
}

impl<'a> AudioBuffer<'a> {
    pub fn new(samples: &'a [AtomicU32]) -> StateResult<Self> {
        if samples.is_empty() {
            return Err(StateError::InvalidCapacity {
                what: "audio buffer",
            });
        }
        Ok(Self::from_parts(samples))
    }

    pub(crate) fn from_parts(samples: &'a [AtomicU32]) -> Self {
        Self { samples }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Drop the oldest `chunk.len()` samples and append `chunk` at the end.
    pub fn push_chunk(&self, chunk: &[f32]) -> StateResult<()> {
        let n = self.samples.len();
        let k = chunk.len();
        if k == 0 || k > n {
            return Err(StateError::AudioChunk {
                len: k,
                capacity: n,
            });
        }
        for i in 0..n - k {
            let v = self.samples[i + k].load(Ordering::Relaxed);
            self.samples[i].store(v, Ordering::Relaxed);
        }
        for (slot, sample) in self.samples[n - k..].iter().zip(chunk) {
            slot.store(sample.to_bits(), Ordering::Relaxed);
        }
        Ok(())
    }

    /// Samples oldest first; the newest sample is last.
    pub fn snapshot(&self) -> Vec<f32> {
        self.samples
            .iter()
            .map(|s| f32::from_bits(s.load(Ordering::Relaxed)))
            .collect()
    }
}
