//! Per-robot action handshake slot.
//!
//! The phase value is the hand-off token: the facade only writes while the
//! slot is [`ActionPhase::Idle`] (payload, then `Queued`); the robot link
//! owns every later transition. No lock is involved, so slots work
//! unchanged when the facade runs in another process.

use crate::segment::Shared;
use std::fmt;
use std::sync::atomic::{AtomicU8, AtomicU16, Ordering};

/// Handshake phase, cycling `0 → 1 → 2 → 3 → 4 → 5 → 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ActionPhase {
    Idle = 0,
    Queued = 1,
    YawResetIssued = 2,
    YawResetConfirmed = 3,
    RollIssued = 4,
    RollConfirmed = 5,
}

impl ActionPhase {
    fn from_raw(raw: u8) -> Self {
        match raw {
            1 => Self::Queued,
            2 => Self::YawResetIssued,
            3 => Self::YawResetConfirmed,
            4 => Self::RollIssued,
            5 => Self::RollConfirmed,
            _ => Self::Idle,
        }
    }

    /// The only phase allowed to follow `self`.
    pub fn successor(self) -> Self {
        match self {
            Self::Idle => Self::Queued,
            Self::Queued => Self::YawResetIssued,
            Self::YawResetIssued => Self::YawResetConfirmed,
            Self::YawResetConfirmed => Self::RollIssued,
            Self::RollIssued => Self::RollConfirmed,
            Self::RollConfirmed => Self::Idle,
        }
    }
}

impl fmt::Display for ActionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", *self as u8)
    }
}

/// Requested motion and its handshake phase.
#[derive(Debug, Default)]
#[repr(C)]
pub struct ActionSlot {
    heading: AtomicU16,
    speed: AtomicU16,
    phase: AtomicU8,
}

// SAFETY: plain atomics; unknown phase codes read as `Idle`.
unsafe impl Shared for ActionSlot {}

impl ActionSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> ActionPhase {
        ActionPhase::from_raw(self.phase.load(Ordering::Acquire))
    }

    /// `(heading_deg, speed_units)` of the queued motion.
    pub fn command(&self) -> (u16, u16) {
        (
            self.heading.load(Ordering::Acquire),
            self.speed.load(Ordering::Acquire),
        )
    }

    /// Write a new motion and hand the slot to the robot link.
    ///
    /// Returns `false` without touching the slot unless it is idle.
    pub fn submit(&self, heading_deg: u16, speed_units: u16) -> bool {
        if self.phase() != ActionPhase::Idle {
            return false;
        }
        self.heading.store(heading_deg, Ordering::Release);
        self.speed.store(speed_units, Ordering::Release);
        self.phase
            .compare_exchange(
                ActionPhase::Idle as u8,
                ActionPhase::Queued as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Move from `from` to its successor; `false` if the slot was not in
    /// `from`. Skipping or reversing a step is impossible through this call.
    pub fn advance(&self, from: ActionPhase) -> bool {
        self.phase
            .compare_exchange(
                from as u8,
                from.successor() as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }
}
