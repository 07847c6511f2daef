//! Per-robot telemetry history in segment memory.
//!
//! A circular table of `depth` rows, each holding the configured output
//! fields as `f32` bits. The head index names the newest row; recording a
//! sample moves the head back by one and overwrites the oldest row. The
//! robot link is the only writer, and the lock keeps readers from seeing a
//! half-written row.

use crate::error::{StateError, StateResult};
use crate::lock::SpinLock;
use sphero_common::protocol::{Telemetry, TelemetryField};
use std::sync::atomic::{AtomicU32, Ordering};

/// Fixed-depth telemetry history of one robot, newest first.
#[derive(Debug, Clone, Copy)]
pub struct TelemetryHistory<'a> {
    lock: &'a SpinLock,
    head: &'a AtomicU32,
    rows: &'a [AtomicU32],
    fields: &'a [TelemetryField],
    depth: usize,
}

impl<'a> TelemetryHistory<'a> {
    pub fn new(
        lock: &'a SpinLock,
        head: &'a AtomicU32,
        rows: &'a [AtomicU32],
        fields: &'a [TelemetryField],
    ) -> StateResult<Self> {
        let width = fields.len();
        if width == 0 || rows.is_empty() || rows.len() % width != 0 {
            return Err(StateError::InvalidCapacity {
                what: "telemetry history",
            });
        }
        Ok(Self::from_parts(lock, head, rows, fields))
    }

    /// View over a region already sized by the segment layout.
    pub(crate) fn from_parts(
        lock: &'a SpinLock,
        head: &'a AtomicU32,
        rows: &'a [AtomicU32],
        fields: &'a [TelemetryField],
    ) -> Self {
        Self {
            lock,
            head,
            rows,
            fields,
            depth: rows.len() / fields.len(),
        }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    fn row(&self, index: usize) -> &'a [AtomicU32] {
        let width = self.fields.len();
        &self.rows[index * width..(index + 1) * width]
    }

    fn head(&self) -> usize {
        self.head.load(Ordering::Acquire) as usize % self.depth
    }

    /// Push `sample` as the newest row, dropping the oldest.
    pub fn record(&self, sample: &Telemetry) {
        let values = sample.project(self.fields);
        let _guard = self.lock.lock();
        let head = (self.head() + self.depth - 1) % self.depth;
        for (cell, value) in self.row(head).iter().zip(values) {
            cell.store(value.to_bits(), Ordering::Relaxed);
        }
        self.head.store(head as u32, Ordering::Release);
    }

    /// Rows newest first, one value per configured output field.
    pub fn rows(&self) -> Vec<Vec<f32>> {
        let _guard = self.lock.lock();
        let head = self.head();
        (0..self.depth)
            .map(|age| {
                self.row((head + age) % self.depth)
                    .iter()
                    .map(|c| f32::from_bits(c.load(Ordering::Relaxed)))
                    .collect()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oldest_row_is_overwritten() {
        let cells: Vec<AtomicU32> = (0..6).map(|_| AtomicU32::new(0)).collect();
        let (lock, head) = (SpinLock::default(), AtomicU32::new(0));
        let fields = [TelemetryField::Yaw, TelemetryField::PositionX];
        let history = TelemetryHistory::new(&lock, &head, &cells, &fields).unwrap();
        assert_eq!(history.depth(), 3);

        for i in 1..=4 {
            history.record(&Telemetry {
                yaw: i as f32,
                position_x: -(i as f32),
                ..Telemetry::default()
            });
        }
        assert_eq!(
            history.rows(),
            vec![vec![4.0, -4.0], vec![3.0, -3.0], vec![2.0, -2.0]]
        );
    }

    #[test]
    fn ragged_storage_is_rejected() {
        let cells: Vec<AtomicU32> = (0..5).map(|_| AtomicU32::new(0)).collect();
        let (lock, head) = (SpinLock::default(), AtomicU32::new(0));
        let fields = [TelemetryField::Yaw, TelemetryField::PositionX];
        assert!(TelemetryHistory::new(&lock, &head, &cells, &fields).is_err());
        assert!(TelemetryHistory::new(&lock, &head, &cells, &[]).is_err());
    }
}
