//! Robot supervisor.
//!
//! Runs one link thread per robot and watches its kill-switch:
//!
//! - kill code `LowBattery`: stop the unit once, mark it permanently
//!   stopped, alert the notifier and emit `BatteriesLow`
//! - kill code `Restart`: stop, join and restart it immediately with a
//!   fresh kill-switch
//! - thread gone without a kill code: join it, wait out the crash
//!   cooldown, restart

use crate::notify::Notifier;
use sphero_common::consts::POLL_INTERVAL;
use sphero_common::transport::TransportFactory;
use sphero_common::watchdog::{KillCode, KillSwitch, UnitHealth, Watchdog, WatchdogError};
use sphero_link::RobotLink;
use sphero_shared_memory::{LifecycleEvent, SharedState};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

#[derive(Debug)]
enum UnitStatus {
    Running,
    CoolingDown { until: Instant },
    Stopped,
}

#[derive(Debug)]
struct Unit {
    kill: KillSwitch,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    status: UnitStatus,
    restarts: u32,
}

impl Unit {
    fn idle() -> Self {
        Self {
            kill: KillSwitch::new(),
            stop: Arc::new(AtomicBool::new(false)),
            handle: None,
            status: UnitStatus::Stopped,
            restarts: 0,
        }
    }

    /// Signal the link thread and wait for it. `false` if it panicked.
    fn stop_and_join(&mut self) -> bool {
        self.stop.store(true, Ordering::Release);
        self.handle.take().is_none_or(|h| h.join().is_ok())
    }
}

impl Drop for Unit {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
    }
}

/// Supervises one link thread per robot.
pub struct RobotSupervisor {
    state: Arc<SharedState>,
    factory: Arc<dyn TransportFactory>,
    notifier: Box<dyn Notifier>,
    cooldown: Duration,
    units: Vec<Unit>,
}

impl RobotSupervisor {
    pub fn new(
        state: Arc<SharedState>,
        factory: Arc<dyn TransportFactory>,
        notifier: Box<dyn Notifier>,
    ) -> Self {
        let cooldown = state.config().supervisor.crash_cooldown();
        let units = (0..state.robot_count()).map(|_| Unit::idle()).collect();
        Self {
            state,
            factory,
            notifier,
            cooldown,
            units,
        }
    }

    /// Override the crash cooldown.
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Spawn a unit for every robot in the fleet. A robot that fails to
    /// spawn enters the crash cooldown. Returns the number started.
    pub fn spawn_all(&mut self, now: Instant) -> usize {
        let mut started = 0;
        for robot in 0..self.units.len() {
            match self.spawn_unit(robot) {
                Ok(()) => started += 1,
                Err(e) => {
                    warn!(robot, error = %e, "initial spawn failed, cooling down");
                    self.begin_cooldown(robot, now);
                }
            }
        }
        started
    }

    /// Kill-switch of the current unit for `robot`.
    pub fn kill_switch(&self, robot: usize) -> Option<KillSwitch> {
        self.units.get(robot).map(|u| u.kill.clone())
    }

    /// Times the unit for `robot` has been restarted.
    pub fn restarts(&self, robot: usize) -> u32 {
        self.units.get(robot).map_or(0, |u| u.restarts)
    }

    fn unit_mut(&mut self, robot: usize) -> Result<&mut Unit, WatchdogError> {
        self.units
            .get_mut(robot)
            .ok_or(WatchdogError::UnknownRobot { robot })
    }

    /// Supervise until `stop` is set, then stop every unit.
    pub fn run(mut self, stop: &AtomicBool) {
        info!(robots = self.units.len(), cooldown = ?self.cooldown, "robot supervisor started");
        while !stop.load(Ordering::Acquire) {
            self.poll(Instant::now());
            thread::sleep(POLL_INTERVAL);
        }
        if let Err(e) = self.shutdown_all() {
            error!(error = %e, "supervisor shutdown incomplete");
        }
        info!("robot supervisor stopped");
    }

    /// One supervision pass over every unit.
    pub fn poll(&mut self, now: Instant) {
        for robot in 0..self.units.len() {
            match self.health_at(robot, now) {
                UnitHealth::KillRequested(KillCode::LowBattery) => self.stop_for_low_battery(robot),
                UnitHealth::KillRequested(_) => {
                    info!(robot, "unit requested restart");
                    if let Err(e) = self.restart_unit(robot) {
                        warn!(robot, error = %e, "restart failed, cooling down");
                        self.begin_cooldown(robot, now);
                    }
                }
                UnitHealth::Dead => {
                    error!(robot, cooldown = ?self.cooldown, "unit died");
                    if let Ok(unit) = self.unit_mut(robot) {
                        unit.stop_and_join();
                    }
                    self.begin_cooldown(robot, now);
                }
                UnitHealth::CoolingDown { remaining_ms: 0 } => {
                    info!(robot, "cooldown over, restarting unit");
                    if let Err(e) = self.spawn_unit(robot) {
                        warn!(robot, error = %e, "respawn failed, cooling down");
                        self.begin_cooldown(robot, now);
                    }
                }
                UnitHealth::Healthy
                | UnitHealth::CoolingDown { .. }
                | UnitHealth::Stopped
                | UnitHealth::Unknown => {}
            }
        }
    }

    fn begin_cooldown(&mut self, robot: usize, now: Instant) {
        let until = now + self.cooldown;
        if let Ok(unit) = self.unit_mut(robot) {
            unit.status = UnitStatus::CoolingDown { until };
        }
    }

    fn stop_for_low_battery(&mut self, robot: usize) {
        let Ok(unit) = self.unit_mut(robot) else {
            return;
        };
        if !unit.stop_and_join() {
            warn!(robot, "unit panicked while stopping");
        }
        unit.status = UnitStatus::Stopped;
        let voltages = self.state.battery_voltages();
        warn!(robot, ?voltages, "robot stopped for low battery");
        self.notifier.low_battery(robot, &voltages);
        self.state.emit(LifecycleEvent::BatteriesLow { robot });
    }

    fn health_at(&self, robot: usize, now: Instant) -> UnitHealth {
        let Some(unit) = self.units.get(robot) else {
            return UnitHealth::Unknown;
        };
        match unit.status {
            UnitStatus::Stopped => UnitHealth::Stopped,
            UnitStatus::CoolingDown { until } => UnitHealth::CoolingDown {
                remaining_ms: remaining_ms(until, now),
            },
            UnitStatus::Running => {
                let code = unit.kill.code();
                if code != KillCode::Clear {
                    UnitHealth::KillRequested(code)
                } else if unit.handle.as_ref().is_none_or(JoinHandle::is_finished) {
                    UnitHealth::Dead
                } else {
                    UnitHealth::Healthy
                }
            }
        }
    }
}

/// Milliseconds left until `until`, rounded up: zero only once `now` has
/// reached the deadline.
fn remaining_ms(until: Instant, now: Instant) -> u64 {
    if now >= until {
        return 0;
    }
    let micros = (until - now).as_micros().div_ceil(1_000);
    u64::try_from(micros).unwrap_or(u64::MAX)
}

impl Watchdog for RobotSupervisor {
    fn spawn_unit(&mut self, robot: usize) -> Result<(), WatchdogError> {
        let address = self
            .state
            .config()
            .fleet
            .addresses
            .get(robot)
            .cloned()
            .ok_or(WatchdogError::UnknownRobot { robot })?;
        let spawn_failed = |reason: String| WatchdogError::SpawnFailed { robot, reason };

        let transport = self
            .factory
            .open(robot, &address)
            .map_err(|e| spawn_failed(e.to_string()))?;
        let kill = KillSwitch::new();
        let link = RobotLink::new(robot, transport, Arc::clone(&self.state), kill.clone())
            .map_err(|e| spawn_failed(e.to_string()))?;
        let stop = Arc::new(AtomicBool::new(false));
        let link_stop = Arc::clone(&stop);
        let handle = thread::Builder::new()
            .name(format!("sphero-link-{robot}"))
            .spawn(move || link.run(&link_stop))
            .map_err(|e| spawn_failed(e.to_string()))?;

        let unit = self.unit_mut(robot)?;
        unit.stop_and_join();
        if matches!(unit.status, UnitStatus::CoolingDown { .. }) {
            unit.restarts += 1;
        }
        unit.kill = kill;
        unit.stop = stop;
        unit.handle = Some(handle);
        unit.status = UnitStatus::Running;
        info!(robot, %address, "unit spawned");
        Ok(())
    }

    fn health_check(&self, robot: usize) -> UnitHealth {
        self.health_at(robot, Instant::now())
    }

    fn restart_unit(&mut self, robot: usize) -> Result<(), WatchdogError> {
        let unit = self.unit_mut(robot)?;
        if matches!(unit.status, UnitStatus::Stopped) && unit.kill.code() == KillCode::LowBattery {
            return Err(WatchdogError::PermanentlyStopped { robot });
        }
        if !unit.stop_and_join() {
            warn!(robot, "unit panicked while stopping");
        }
        unit.restarts += 1;
        unit.status = UnitStatus::Stopped;
        self.spawn_unit(robot)
    }

    fn shutdown_all(&mut self) -> Result<(), WatchdogError> {
        let mut panicked = None;
        for (robot, unit) in self.units.iter_mut().enumerate() {
            if !unit.stop_and_join() {
                panicked = Some(robot);
            }
        }
        match panicked {
            Some(robot) => Err(WatchdogError::UnitPanicked { robot }),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remaining_cooldown_rounds_up() {
        let now = Instant::now();
        let until = now + Duration::from_secs(30);
        assert_eq!(remaining_ms(until, until - Duration::from_micros(1)), 1);
        assert_eq!(remaining_ms(until, until - Duration::from_micros(1_001)), 2);
        assert_eq!(remaining_ms(until, until), 0);
        assert_eq!(remaining_ms(until, until + Duration::from_secs(1)), 0);
        assert_eq!(remaining_ms(until, now), 30_000);
    }
}
