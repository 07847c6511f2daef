//! Two-step action handshake: reset yaw, then roll.
//!
//! The facade hands a slot over by setting it to `Queued`. From there the
//! link owns every transition:
//!
//! ```text
//! Queued ──telemetry──► YawResetIssued ──ack──► YawResetConfirmed
//!                          ▲   │ 200 ms              │ poll
//!                          └───┘ re-issue            ▼
//!   Idle ◄──poll── RollConfirmed ◄──ack── RollIssued ◄┘
//!                                           ▲   │ 200 ms
//!                                           └───┘ re-issue
//! ```

use sphero_common::consts::{HANDSHAKE_CONFIRM_WINDOW, ROBOT_LOG_TARGET};
use sphero_common::protocol::{DrivingCommand, Request, avoid_reserved};
use sphero_shared_memory::{ActionPhase, ActionSlot};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Link-side driver of one robot's [`ActionSlot`].
#[derive(Debug)]
pub struct Handshake {
    robot: usize,
    window: Duration,
    deadline: Option<Instant>,
    roll: Option<Request>,
}

impl Handshake {
    pub fn new(robot: usize) -> Self {
        Self::with_window(robot, HANDSHAKE_CONFIRM_WINDOW)
    }

    pub fn with_window(robot: usize, window: Duration) -> Self {
        Self {
            robot,
            window,
            deadline: None,
            roll: None,
        }
    }

    /// Start a queued action. Called on every telemetry sample while the
    /// link is running; returns the reset-yaw request to send, if any.
    pub fn begin(&mut self, slot: &ActionSlot, now: Instant) -> Option<Request> {
        if slot.phase() != ActionPhase::Queued {
            return None;
        }
        let (heading, speed) = slot.command();
        let roll = Request::Roll {
            speed: u8::try_from(avoid_reserved(speed)).unwrap_or(u8::MAX),
            heading: avoid_reserved(heading),
        };
        if !slot.advance(ActionPhase::Queued) {
            return None;
        }
        info!(target: ROBOT_LOG_TARGET, robot = self.robot, heading, speed, "action accepted");
        self.roll = Some(roll);
        self.deadline = Some(now + self.window);
        Some(Request::ResetYaw)
    }

    /// Pick up an action left mid-flight by a previous session of this
    /// robot. The pending step is re-issued on the next poll.
    pub fn resume(&mut self, slot: &ActionSlot, now: Instant) {
        if matches!(slot.phase(), ActionPhase::Idle | ActionPhase::Queued) {
            return;
        }
        let (heading, speed) = slot.command();
        self.roll = Some(Request::Roll {
            speed: u8::try_from(avoid_reserved(speed)).unwrap_or(u8::MAX),
            heading: avoid_reserved(heading),
        });
        self.deadline = Some(now);
        info!(target: ROBOT_LOG_TARGET, robot = self.robot, phase = %slot.phase(), "resuming action");
    }

    /// A driving acknowledgement arrived.
    pub fn confirm(&self, slot: &ActionSlot, command: DrivingCommand) -> bool {
        let from = match command {
            DrivingCommand::ResetYaw => ActionPhase::YawResetIssued,
            DrivingCommand::DriveWithHeading => ActionPhase::RollIssued,
            _ => return false,
        };
        let advanced = slot.advance(from);
        if advanced {
            debug!(target: ROBOT_LOG_TARGET, robot = self.robot, phase = %from.successor(), "action step confirmed");
        }
        advanced
    }

    /// Advance confirmed steps and re-issue unconfirmed ones whose window
    /// expired. Returns the request to send, if any.
    pub fn poll(&mut self, slot: &ActionSlot, now: Instant) -> Option<Request> {
        self.deadline?;
        match slot.phase() {
            ActionPhase::YawResetConfirmed => {
                if !slot.advance(ActionPhase::YawResetConfirmed) {
                    return None;
                }
                self.deadline = Some(now + self.window);
                self.roll
            }
            ActionPhase::RollConfirmed => {
                if slot.advance(ActionPhase::RollConfirmed) {
                    info!(target: ROBOT_LOG_TARGET, robot = self.robot, "action complete");
                    self.deadline = None;
                    self.roll = None;
                }
                None
            }
            ActionPhase::YawResetIssued if self.expired(now) => {
                debug!(target: ROBOT_LOG_TARGET, robot = self.robot, "yaw reset unconfirmed, re-issuing");
                self.deadline = Some(now + self.window);
                Some(Request::ResetYaw)
            }
            ActionPhase::RollIssued if self.expired(now) => {
                debug!(target: ROBOT_LOG_TARGET, robot = self.robot, "roll unconfirmed, re-issuing");
                self.deadline = Some(now + self.window);
                self.roll
            }
            _ => None,
        }
    }

    fn expired(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|d| now >= d)
    }

    /// Whether an action is being driven.
    pub fn active(&self) -> bool {
        self.deadline.is_some()
    }
}
