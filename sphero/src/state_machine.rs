//! Library lifecycle state machine.
//!
//! Sole writer of the global [`LifecycleState`]. Consumes the event queue
//! fed by the sensor monitor and the robot supervisor.
//!
//! | From                | Event          | To                  |
//! |---------------------|----------------|---------------------|
//! | any                 | RGB/DEPTH/AUDIO lost | Failed        |
//! | Disconnected        | ResetStateVars | WaitingForSensors   |
//! | WaitingForSensors   | AllSensorsGo   | Serving             |
//! | WaitingForSensors   | SpheroLost     | Disconnected        |
//! | Serving             | SpheroLost     | Disconnected        |
//! | Serving             | BatteriesLow   | LowBattery          |
//! | Failed              | any            | Failed              |

use crossbeam_channel::{Receiver, RecvTimeoutError};
use sphero_common::consts::POLL_INTERVAL;
use sphero_shared_memory::{LifecycleEvent, LifecycleState, LifecycleWriter};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

/// Next state for `event` in `state`. Pairs outside the table leave the
/// state unchanged.
pub fn transition(state: LifecycleState, event: LifecycleEvent) -> LifecycleState {
    use LifecycleEvent as E;
    use LifecycleState as S;

    if state == S::Failed || event.is_ambient_loss() {
        return S::Failed;
    }
    match (state, event) {
        (S::Disconnected, E::ResetStateVars) => S::WaitingForSensors,
        (S::WaitingForSensors, E::AllSensorsGo) => S::Serving,
        (S::WaitingForSensors, E::SpheroLost { .. }) => S::Disconnected,
        (S::Serving, E::SpheroLost { .. }) => S::Disconnected,
        (S::Serving, E::BatteriesLow { .. }) => S::LowBattery,
        (unchanged, _) => unchanged,
    }
}

/// Event-driven owner of the lifecycle state.
#[derive(Debug)]
pub struct LifecycleStateMachine {
    writer: LifecycleWriter,
    events: Receiver<LifecycleEvent>,
}

impl LifecycleStateMachine {
    pub fn new(writer: LifecycleWriter, events: Receiver<LifecycleEvent>) -> Self {
        Self { writer, events }
    }

    pub fn state(&self) -> LifecycleState {
        self.writer.load()
    }

    /// Apply one event and publish the result.
    pub fn handle(&self, event: LifecycleEvent) -> LifecycleState {
        let old = self.writer.load();
        let new = transition(old, event);
        if new != old {
            info!(%old, %new, %event, "lifecycle transition");
            self.writer.store(new);
        } else if new == LifecycleState::Failed {
            warn!(%event, "event ignored, library failed");
        } else {
            debug!(state = %old, %event, "event ignored");
        }
        new
    }

    /// Apply every queued event; returns how many were handled.
    pub fn drain(&self) -> usize {
        self.events.try_iter().map(|event| self.handle(event)).count()
    }

    /// Consume events until `stop` is set.
    pub fn run(&self, stop: &AtomicBool) {
        info!(state = %self.state(), "lifecycle state machine started");
        while !stop.load(Ordering::Acquire) {
            match self.events.recv_timeout(POLL_INTERVAL) {
                Ok(event) => {
                    self.handle(event);
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        info!(state = %self.state(), "lifecycle state machine stopped");
    }
}
