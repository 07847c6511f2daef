//! Global lifecycle state and the events that drive it.
//!
//! The state is a single atomic in the segment header. Only the holder of
//! the [`LifecycleWriter`] token (the library state machine) may change it;
//! every other component, in any attached process, reads it. The holder's
//! pid is recorded in the header, so the token stays unique across
//! processes.

use crate::platform::{current_pid, is_process_alive};
use crate::segment::{Segment, Shared};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicI8, Ordering};
use tracing::warn;

/// Whole-system lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(i8)]
pub enum LifecycleState {
    Disconnected = 0,
    WaitingForSensors = 1,
    LowBattery = 2,
    Serving = 5,
    Failed = -1,
}

impl LifecycleState {
    fn from_raw(raw: i8) -> Self {
        match raw {
            1 => Self::WaitingForSensors,
            2 => Self::LowBattery,
            5 => Self::Serving,
            -1 => Self::Failed,
            _ => Self::Disconnected,
        }
    }

    pub fn code(self) -> i8 {
        self as i8
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::WaitingForSensors => "waitingForSensors",
            Self::LowBattery => "lowBattery",
            Self::Serving => "serving",
            Self::Failed => "failed",
        };
        write!(f, "{name}({})", self.code())
    }
}

/// Events consumed by the library state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum LifecycleEvent {
    /// Counters were zeroed; warm-up may start.
    ResetStateVars,
    /// Every stream reached its warm-up sample count.
    AllSensorsGo,
    RgbLost,
    DepthLost,
    AudioLost,
    /// Robot telemetry went stale.
    SpheroLost { robot: usize },
    /// Robot stopped for low battery.
    BatteriesLow { robot: usize },
}

impl LifecycleEvent {
    /// Camera or microphone loss, fatal for the whole system.
    pub fn is_ambient_loss(&self) -> bool {
        matches!(self, Self::RgbLost | Self::DepthLost | Self::AudioLost)
    }
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ResetStateVars => write!(f, "RESETSTATEVARS"),
            Self::AllSensorsGo => write!(f, "ALLSENSORSGO"),
            Self::RgbLost => write!(f, "RGBLOST"),
            Self::DepthLost => write!(f, "DEPTHLOST"),
            Self::AudioLost => write!(f, "AUDIOLOST"),
            Self::SpheroLost { robot } => write!(f, "SPHEROLOST({robot})"),
            Self::BatteriesLow { robot } => write!(f, "BATTERIESLOW({robot})"),
        }
    }
}

/// Atomic lifecycle cell. All-zero reads as `Disconnected`.
#[derive(Debug)]
#[repr(transparent)]
pub struct LifecycleCell(AtomicI8);

// SAFETY: a single `AtomicI8`; unknown codes read as `Disconnected`.
unsafe impl Shared for LifecycleCell {}

impl LifecycleCell {
    pub fn load(&self) -> LifecycleState {
        LifecycleState::from_raw(self.0.load(Ordering::Acquire))
    }
}

/// Exclusive write capability for the lifecycle state.
///
/// At most one exists per segment, across every attached process. Dropping
/// it frees the capability again.
#[derive(Debug)]
pub struct LifecycleWriter {
    segment: Arc<Segment>,
}

impl LifecycleWriter {
    /// Take the capability, or `None` while a live process holds it.
    ///
    /// A holder whose process has died is replaced.
    pub(crate) fn claim(segment: Arc<Segment>) -> Option<Self> {
        let slot = &segment.header().lifecycle_writer;
        let me = current_pid();
        let holder = match slot.compare_exchange(0, me, Ordering::AcqRel, Ordering::Acquire) {
            Ok(_) => return Some(Self { segment }),
            Err(holder) => holder,
        };
        if is_process_alive(holder) {
            return None;
        }
        slot.compare_exchange(holder, me, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        warn!(holder, "lifecycle writer of dead process replaced");
        Some(Self { segment })
    }

    fn cell(&self) -> &LifecycleCell {
        &self.segment.header().lifecycle
    }

    pub fn load(&self) -> LifecycleState {
        self.cell().load()
    }

    pub fn store(&self, state: LifecycleState) {
        self.cell().0.store(state.code(), Ordering::Release);
    }
}

impl Drop for LifecycleWriter {
    fn drop(&mut self) {
        self.segment
            .header()
            .lifecycle_writer
            .store(0, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_codes_match_wire_values() {
        for state in [
            LifecycleState::Disconnected,
            LifecycleState::WaitingForSensors,
            LifecycleState::LowBattery,
            LifecycleState::Serving,
            LifecycleState::Failed,
        ] {
            assert_eq!(LifecycleState::from_raw(state.code()), state);
        }
        assert_eq!(LifecycleState::Failed.code(), -1);
        assert_eq!(LifecycleState::Serving.code(), 5);
    }

    fn segment() -> Arc<Segment> {
        Arc::new(Segment::anonymous(crate::segment::HEADER_LEN).unwrap())
    }

    #[test]
    fn writer_updates_cell() {
        let segment = segment();
        let writer = LifecycleWriter::claim(Arc::clone(&segment)).expect("free");
        assert_eq!(segment.header().lifecycle.load(), LifecycleState::Disconnected);
        writer.store(LifecycleState::Serving);
        assert_eq!(segment.header().lifecycle.load(), LifecycleState::Serving);
        assert_eq!(writer.load(), LifecycleState::Serving);
    }

    #[test]
    fn writer_is_unique_until_dropped() {
        let segment = segment();
        let writer = LifecycleWriter::claim(Arc::clone(&segment)).expect("free");
        assert!(LifecycleWriter::claim(Arc::clone(&segment)).is_none());
        drop(writer);
        assert!(LifecycleWriter::claim(segment).is_some());
    }

    #[test]
    fn writer_of_dead_process_is_replaced() {
        let segment = segment();
        // Above the kernel's pid_max, so never a live process.
        segment
            .header()
            .lifecycle_writer
            .store(0x7FFF_FFF0, Ordering::Release);
        assert!(LifecycleWriter::claim(Arc::clone(&segment)).is_some());
    }

    #[test]
    fn event_names() {
        assert_eq!(LifecycleEvent::RgbLost.to_string(), "RGBLOST");
        assert_eq!(
            LifecycleEvent::SpheroLost { robot: 1 }.to_string(),
            "SPHEROLOST(1)"
        );
        assert!(LifecycleEvent::AudioLost.is_ambient_loss());
        assert!(!LifecycleEvent::SpheroLost { robot: 0 }.is_ambient_loss());
    }
}
