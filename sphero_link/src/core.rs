//! Robot link core and run loop.
//!
//! A `RobotLink` owns one transport session. Transport events are drained
//! continuously; the heartbeat state machine moves once per
//! [`HEARTBEAT_INTERVAL`] tick. Time is always passed in so the whole
//! session can be driven step by step.

use crate::dispatch::{Inbound, interpret};
use crate::error::{LinkError, LinkResult};
use crate::handshake::Handshake;
use crate::heartbeat::{HeartbeatStatus, LinkPhase};
use crate::sequencer::Sequencer;
use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError};
use sphero_common::consts::{HEARTBEAT_INTERVAL, POLL_INTERVAL, ROBOT_LOG_TARGET};
use sphero_common::protocol::consts::{
    ANTIDOS_CHARACTERISTIC, APIV2_CHARACTERISTIC, NOTIFICATION_CHARACTERISTICS, WAKE_SIGNAL,
};
use sphero_common::protocol::{CommandMessage, FrameDecoder, Request, Telemetry};
use sphero_common::transport::{Transport, TransportEvent};
use sphero_common::watchdog::{KillCode, KillSwitch};
use sphero_shared_memory::{SharedState, now_micros};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Instant;
use tracing::{debug, error, info, trace, warn};

const FRONT_LED_ON: [u8; 3] = [255, 255, 255];
const BACK_LED_OFF: [u8; 3] = [0, 0, 0];

/// One robot session.
pub struct RobotLink {
    robot: usize,
    transport: Box<dyn Transport>,
    events: Receiver<TransportEvent>,
    state: Arc<SharedState>,
    kill: KillSwitch,
    decoder: FrameDecoder,
    sequencer: Sequencer,
    handshake: Handshake,
    status: HeartbeatStatus,
    color: [u8; 3],
    low_voltage: f32,
    last_notification: Option<Vec<u8>>,
    resume_pending: bool,
}

impl RobotLink {
    /// Create a link for `robot` over `transport`.
    ///
    /// # Errors
    /// Returns `LinkError::State` if `robot` is outside the fleet.
    pub fn new(
        robot: usize,
        transport: Box<dyn Transport>,
        state: Arc<SharedState>,
        kill: KillSwitch,
    ) -> LinkResult<Self> {
        state.action(robot)?;
        let config = state.config();
        let color = config.fleet.colors.get(robot).copied().unwrap_or(FRONT_LED_ON);
        let low_voltage = config.battery.low_voltage;
        let events = transport.events();
        debug!(target: ROBOT_LOG_TARGET, robot, transport = transport.name(), "robot link created");
        Ok(Self {
            robot,
            transport,
            events,
            state,
            kill,
            decoder: FrameDecoder::new(),
            sequencer: Sequencer::new(robot),
            handshake: Handshake::new(robot),
            status: HeartbeatStatus::default(),
            color,
            low_voltage,
            last_notification: None,
            resume_pending: false,
        })
    }

    pub fn robot(&self) -> usize {
        self.robot
    }

    pub fn status(&self) -> &HeartbeatStatus {
        &self.status
    }

    pub fn phase(&self) -> LinkPhase {
        self.status.phase
    }

    // ─── Run loop ───────────────────────────────────────────────────

    /// Drive the session until `stop` is set.
    ///
    /// Restart requests are reported through the kill-switch only; the
    /// loop keeps running (inert) until the supervisor stops it.
    pub fn run(mut self, stop: &AtomicBool) {
        self.start();
        let started = Instant::now();
        let mut next_tick = started + HEARTBEAT_INTERVAL;

        while !stop.load(Ordering::Acquire) {
            match self.events.recv_timeout(POLL_INTERVAL) {
                Ok(event) => self.handle_event(event, Instant::now()),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    if self.status.phase != LinkPhase::Restarting {
                        error!(target: ROBOT_LOG_TARGET, robot = self.robot, "transport event channel closed");
                        self.restart(KillCode::Restart);
                    }
                    thread::sleep(POLL_INTERVAL);
                }
            }
            let now = Instant::now();
            self.handle_pending(now);
            if now >= next_tick {
                self.tick(now);
                next_tick += HEARTBEAT_INTERVAL;
            }
        }

        if self.status.phase != LinkPhase::Restarting {
            self.transport.disconnect();
        }
        info!(target: ROBOT_LOG_TARGET, robot = self.robot, phase = %self.status.phase, "robot link stopped");
    }

    /// Begin connecting.
    ///
    /// An action left mid-flight by a previous session is picked up with
    /// the first telemetry sample once the link is running.
    pub fn start(&mut self) {
        info!(target: ROBOT_LOG_TARGET, robot = self.robot, "connecting");
        if let Err(e) = self.transport.connect() {
            warn!(target: ROBOT_LOG_TARGET, robot = self.robot, error = %e, "connect failed");
            self.status.connected = false;
        }
        self.resume_pending = true;
        self.status.phase = LinkPhase::AwaitingResolution;
    }

    /// Process every queued transport event and drive the action handshake
    /// until nothing more happens.
    pub fn handle_pending(&mut self, now: Instant) {
        loop {
            self.drain_events(now);
            if !self.poll_handshake(now) {
                break;
            }
        }
    }

    /// Process queued transport events, including those produced while
    /// processing.
    pub fn drain_events(&mut self, now: Instant) {
        loop {
            match self.events.try_recv() {
                Ok(event) => self.handle_event(event, now),
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => return,
            }
        }
    }

    /// Drive the action handshake; `true` if a request was issued.
    /// Only a running link touches the action slot.
    pub fn poll_handshake(&mut self, now: Instant) -> bool {
        if self.status.phase != LinkPhase::Running {
            return false;
        }
        let Ok(slot) = self.state.action(self.robot) else {
            return false;
        };
        match self.handshake.poll(slot, now) {
            Some(request) => {
                self.send(request);
                true
            }
            None => false,
        }
    }

    // ─── Heartbeat ──────────────────────────────────────────────────

    /// One heartbeat tick.
    pub fn tick(&mut self, now: Instant) {
        let phase = self.status.phase;
        debug!(target: ROBOT_LOG_TARGET, robot = self.robot, tag = phase.tag(), %phase, "heartbeat");
        let result = match phase {
            LinkPhase::Init => {
                self.start();
                Ok(())
            }
            LinkPhase::AwaitingResolution
            | LinkPhase::InitializingCharacteristics
            | LinkPhase::WakingUp => self.initialize(),
            LinkPhase::AwaitingWake | LinkPhase::Configuring => self.configure(),
            LinkPhase::AwaitingVoltage => self.request_sensor_stream(),
            LinkPhase::AwaitingSensorStream => self.confirm_sensor_stream(now),
            LinkPhase::Running => self.beat(now),
            LinkPhase::Restarting => Ok(()),
        };
        if let Err(e) = result {
            warn!(target: ROBOT_LOG_TARGET, robot = self.robot, error = %e, "heartbeat check failed");
            self.restart(KillCode::Restart);
        }
    }

    fn check(&self, ok: bool, reason: &'static str) -> LinkResult<()> {
        if ok {
            Ok(())
        } else {
            Err(LinkError::Heartbeat {
                phase: self.status.phase,
                reason,
            })
        }
    }

    /// Subscribe, unlock and wake.
    fn initialize(&mut self) -> LinkResult<()> {
        self.check(self.status.session_ready(), "session not ready")?;
        self.status.phase = LinkPhase::InitializingCharacteristics;

        let available = self.transport.characteristics();
        if !available.iter().any(|c| c == APIV2_CHARACTERISTIC) {
            return Err(LinkError::MissingCharacteristic(APIV2_CHARACTERISTIC));
        }
        for characteristic in NOTIFICATION_CHARACTERISTICS {
            if available.iter().any(|c| c == characteristic) {
                self.transport.enable_notifications(characteristic)?;
            }
        }

        self.status.phase = LinkPhase::WakingUp;
        self.sequencer.enqueue_raw(ANTIDOS_CHARACTERISTIC, WAKE_SIGNAL);
        self.decoder.reset();
        self.send(Request::Wake);
        self.status.phase = LinkPhase::AwaitingWake;
        Ok(())
    }

    /// Battery, LEDs, heading reference and stabilization.
    fn configure(&mut self) -> LinkResult<()> {
        self.check(self.status.awake, "no wake confirmation")?;
        self.status.phase = LinkPhase::Configuring;
        info!(target: ROBOT_LOG_TARGET, robot = self.robot, "robot awake, configuring");

        self.send(Request::BatteryVoltage);
        self.send(Request::ChargingState);
        self.send(Request::FrontBackLeds {
            front: FRONT_LED_ON,
            back: BACK_LED_OFF,
        });
        self.send(Request::MatrixColor(self.color));
        self.send(Request::ResetYaw);
        self.send(Request::ResetLocator);
        self.decoder.reset();
        self.send(Request::DisableStabilization);
        self.status.phase = LinkPhase::AwaitingVoltage;
        Ok(())
    }

    fn request_sensor_stream(&mut self) -> LinkResult<()> {
        self.check(self.status.last_voltage.is_some(), "no voltage report")?;
        for request in Request::SENSOR_CONFIGURATION {
            self.send(request);
        }
        self.status.phase = LinkPhase::AwaitingSensorStream;
        Ok(())
    }

    fn confirm_sensor_stream(&mut self, now: Instant) -> LinkResult<()> {
        self.check(self.status.telemetry_fresh(now), "no telemetry")?;
        info!(target: ROBOT_LOG_TARGET, robot = self.robot, "telemetry streaming, link running");
        self.status.phase = LinkPhase::Running;
        Ok(())
    }

    fn beat(&mut self, now: Instant) -> LinkResult<()> {
        self.check(self.status.telemetry_fresh(now), "telemetry stale")?;
        if self.status.battery_low(self.low_voltage) {
            warn!(
                target: ROBOT_LOG_TARGET,
                robot = self.robot,
                voltage = self.status.last_voltage,
                threshold = self.low_voltage,
                "battery low"
            );
            self.restart(KillCode::LowBattery);
            return Ok(());
        }
        if self.status.battery_poll_due(now) {
            self.status.last_battery_poll = Some(now);
            self.send(Request::BatteryVoltage);
            self.send(Request::ChargingState);
        }
        Ok(())
    }

    /// Raise the kill-switch, drop the session and go inert.
    fn restart(&mut self, code: KillCode) {
        if self.status.phase == LinkPhase::Restarting {
            return;
        }
        warn!(target: ROBOT_LOG_TARGET, robot = self.robot, from = %self.status.phase, %code, "requesting restart");
        self.status.phase = LinkPhase::Restarting;
        self.kill.raise(code);
        self.sequencer.clear();
        self.transport.disconnect();
    }

    fn send(&mut self, request: Request) {
        self.sequencer.enqueue(request);
        self.sequencer.pump(self.transport.as_mut());
    }

    // ─── Transport events ───────────────────────────────────────────

    /// React to one transport event.
    pub fn handle_event(&mut self, event: TransportEvent, now: Instant) {
        match event {
            TransportEvent::Connected => self.status.connected = true,
            TransportEvent::ConnectFailed(reason) => {
                warn!(target: ROBOT_LOG_TARGET, robot = self.robot, %reason, "connect failed");
                self.status.connected = false;
            }
            TransportEvent::ServicesResolved => self.status.services_resolved = true,
            TransportEvent::NotificationsEnabled { characteristic } => {
                trace!(target: ROBOT_LOG_TARGET, robot = self.robot, %characteristic, "notifications enabled");
            }
            TransportEvent::NotificationsFailed {
                characteristic,
                reason,
            } => {
                warn!(target: ROBOT_LOG_TARGET, robot = self.robot, %characteristic, %reason, "notifications failed");
                self.status.notifications_enabled = false;
            }
            TransportEvent::ValueUpdated { value, .. } => self.on_notification(value, now),
            TransportEvent::WriteSucceeded { .. } => {
                self.sequencer.release();
                self.sequencer.pump(self.transport.as_mut());
            }
            TransportEvent::WriteFailed {
                characteristic,
                reason,
            } => {
                let failed = self.sequencer.release();
                warn!(
                    target: ROBOT_LOG_TARGET,
                    robot = self.robot,
                    %characteristic,
                    %reason,
                    request = ?failed.and_then(|o| o.request),
                    "write failed"
                );
                self.sequencer.pump(self.transport.as_mut());
            }
            TransportEvent::Disconnected => {
                debug!(target: ROBOT_LOG_TARGET, robot = self.robot, "disconnected");
                self.status.connected = false;
            }
        }
    }

    fn on_notification(&mut self, value: Vec<u8>, now: Instant) {
        if self.last_notification.as_ref() == Some(&value) {
            trace!(target: ROBOT_LOG_TARGET, robot = self.robot, "duplicate notification dropped");
            return;
        }
        let frames = self.decoder.feed(&value);
        self.last_notification = Some(value);
        for frame in frames {
            match frame {
                Ok(msg) => self.on_message(&msg, now),
                Err(e) => debug!(target: ROBOT_LOG_TARGET, robot = self.robot, error = %e, "frame dropped"),
            }
        }
    }

    fn on_message(&mut self, msg: &CommandMessage, now: Instant) {
        let inbound = match interpret(msg) {
            Ok(inbound) => inbound,
            Err(e) if e.is_fatal() => {
                error!(target: ROBOT_LOG_TARGET, robot = self.robot, error = %e, "fatal telemetry");
                self.restart(KillCode::Restart);
                return;
            }
            Err(e) => {
                warn!(target: ROBOT_LOG_TARGET, robot = self.robot, error = %e, "message ignored");
                return;
            }
        };
        match inbound {
            Inbound::Awake => {
                info!(target: ROBOT_LOG_TARGET, robot = self.robot, "wake confirmed");
                self.status.awake = true;
            }
            Inbound::Voltage(volts) => self.on_voltage(volts, now),
            Inbound::Charging(Ok(state)) => {
                info!(target: ROBOT_LOG_TARGET, robot = self.robot, ?state, "charging state");
            }
            Inbound::Charging(Err(raw)) => {
                warn!(target: ROBOT_LOG_TARGET, robot = self.robot, raw, "unknown charging state");
            }
            Inbound::DrivingAck(command) if self.status.phase == LinkPhase::Running => {
                if let Ok(slot) = self.state.action(self.robot) {
                    self.handshake.confirm(slot, command);
                }
            }
            Inbound::DrivingAck(command) => {
                trace!(target: ROBOT_LOG_TARGET, robot = self.robot, ?command, "driving ack before running");
            }
            Inbound::Telemetry(sample) => self.on_telemetry(&sample, now),
            Inbound::Informational(command) => {
                trace!(target: ROBOT_LOG_TARGET, robot = self.robot, ?command, "response");
            }
            Inbound::Unknown {
                device_id,
                command_id,
            } => {
                debug!(target: ROBOT_LOG_TARGET, robot = self.robot, device_id, command_id, "unknown message");
            }
        }
    }

    fn on_voltage(&mut self, volts: f32, now: Instant) {
        info!(target: ROBOT_LOG_TARGET, robot = self.robot, volts, "battery voltage");
        self.status.last_voltage = Some(volts);
        self.status.last_battery_poll = Some(now);
        if let Err(e) = self.state.set_battery_voltage(self.robot, volts) {
            warn!(target: ROBOT_LOG_TARGET, robot = self.robot, error = %e, "voltage not stored");
        }
    }

    fn on_telemetry(&mut self, sample: &Telemetry, now: Instant) {
        if let Err(e) = self.state.record_telemetry(self.robot, sample, now_micros()) {
            warn!(target: ROBOT_LOG_TARGET, robot = self.robot, error = %e, "telemetry not stored");
            return;
        }
        self.status.last_telemetry = Some(now);
        if self.status.phase != LinkPhase::Running {
            return;
        }
        let request = match self.state.action(self.robot) {
            Ok(slot) => {
                if std::mem::take(&mut self.resume_pending) {
                    self.handshake.resume(slot, now);
                }
                self.handshake.begin(slot, now)
            }
            Err(_) => None,
        };
        if let Some(request) = request {
            self.send(request);
        }
    }
}
