//! Per-stream packet counters and last-update timestamps.
//!
//! Index layout: `0` video, `1` depth, `2` audio, `3 + i` robot `i`.
//! Each slot has exactly one producer; cross-slot reads may be slightly
//! stale relative to each other.

use crate::error::{StateError, StateResult};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Microseconds since the UNIX epoch.
pub fn now_micros() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}

/// Atomic counters and timestamps for every tracked stream.
#[derive(Debug, Clone, Copy)]
pub struct StreamStats<'a> {
    counters: &'a [AtomicU32],
    timestamps_us: &'a [AtomicU64],
}

impl<'a> StreamStats<'a> {
    /// Streams beyond the shorter of the two slices are not tracked.
    pub fn new(counters: &'a [AtomicU32], timestamps_us: &'a [AtomicU64]) -> Self {
        let n = counters.len().min(timestamps_us.len());
        Self {
            counters: &counters[..n],
            timestamps_us: &timestamps_us[..n],
        }
    }

    pub fn len(&self) -> usize {
        self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }

    fn check(&self, stream: usize) -> StateResult<()> {
        if stream < self.counters.len() {
            Ok(())
        } else {
            Err(StateError::StreamOutOfRange {
                index: stream,
                count: self.counters.len(),
            })
        }
    }

    /// Count one packet on `stream` received at `now_us`.
    pub fn record(&self, stream: usize, now_us: u64) -> StateResult<()> {
        self.check(stream)?;
        self.timestamps_us[stream].store(now_us, Ordering::Release);
        self.counters[stream].fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    pub fn count(&self, stream: usize) -> u32 {
        self.counters
            .get(stream)
            .map_or(0, |c| c.load(Ordering::Acquire))
    }

    pub fn last_update_us(&self, stream: usize) -> u64 {
        self.timestamps_us
            .get(stream)
            .map_or(0, |t| t.load(Ordering::Acquire))
    }

    /// Zero every counter and timestamp.
    pub fn reset(&self) {
        for c in self.counters {
            c.store(0, Ordering::Release);
        }
        for t in self.timestamps_us {
            t.store(0, Ordering::Release);
        }
    }

    pub fn counters(&self) -> Vec<u32> {
        self.counters.iter().map(|c| c.load(Ordering::Acquire)).collect()
    }

    pub fn timestamps_us(&self) -> Vec<u64> {
        self.timestamps_us
            .iter()
            .map(|t| t.load(Ordering::Acquire))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cells(n: usize) -> (Vec<AtomicU32>, Vec<AtomicU64>) {
        (
            (0..n).map(|_| AtomicU32::new(0)).collect(),
            (0..n).map(|_| AtomicU64::new(0)).collect(),
        )
    }

    #[test]
    fn record_and_reset() {
        let (c, t) = cells(4);
        let stats = StreamStats::new(&c, &t);
        stats.record(0, 100).unwrap();
        stats.record(0, 250).unwrap();
        stats.record(3, 300).unwrap();
        assert_eq!(stats.counters(), vec![2, 0, 0, 1]);
        assert_eq!(stats.last_update_us(0), 250);
        stats.reset();
        assert_eq!(stats.counters(), vec![0; 4]);
        assert_eq!(stats.timestamps_us(), vec![0; 4]);
    }

    #[test]
    fn out_of_range_stream() {
        let (c, t) = cells(3);
        let stats = StreamStats::new(&c, &t);
        assert!(stats.record(3, 1).is_err());
        assert_eq!(stats.count(9), 0);
    }

    #[test]
    fn clock_is_after_epoch() {
        assert!(now_micros() > 1_600_000_000_000_000);
    }
}
