//! In-process transport backed by a [`SimulatedRobot`].
//!
//! Writes are answered synchronously: the write outcome and any response
//! notifications are queued on the event channel before `write_value`
//! returns. With streaming enabled, a background thread notifies one
//! telemetry frame per sensor interval once the robot has been given a
//! sensor mask.

use super::robot::{SimulatedRobot, SimulationConfig};
use crossbeam_channel::{Receiver, Sender, unbounded};
use parking_lot::Mutex;
use sphero_common::protocol::consts::{
    ANTIDOS_CHARACTERISTIC, APIV2_CHARACTERISTIC, DFU_CONTROL_CHARACTERISTIC,
    DFU_INFO_CHARACTERISTIC, SENSOR_INTERVAL_MS, SUBS_CHARACTERISTIC,
};
use sphero_common::protocol::{CommandMessage, Telemetry};
use sphero_common::transport::{
    CharacteristicWriter, Connectable, NotificationSource, Transport, TransportError,
    TransportEvent, TransportFactory,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// State shared between the transport, its streaming thread and test
/// handles.
#[derive(Debug)]
struct Shared {
    robot: Mutex<SimulatedRobot>,
    events: Sender<TransportEvent>,
    connected: AtomicBool,
    hold_responses: AtomicBool,
    held: Mutex<Vec<Vec<u8>>>,
    fragment_len: usize,
}

impl Shared {
    fn notify(&self, frame: &[u8]) {
        for fragment in frame.chunks(self.fragment_len.max(1)) {
            let _ = self.events.send(TransportEvent::ValueUpdated {
                characteristic: APIV2_CHARACTERISTIC.to_string(),
                value: fragment.to_vec(),
            });
        }
    }
}

/// Transport to one simulated robot.
#[derive(Debug)]
pub struct SimulationTransport {
    robot: usize,
    address: String,
    shared: Arc<Shared>,
    receiver: Receiver<TransportEvent>,
    subscribed: Vec<String>,
    stream_stop: Arc<AtomicBool>,
    streamer: Option<JoinHandle<()>>,
}

impl SimulationTransport {
    pub fn new(robot: usize, address: &str, config: SimulationConfig) -> Self {
        let (events, receiver) = unbounded();
        let fragment_len = config.fragment_len;
        Self {
            robot,
            address: address.to_string(),
            shared: Arc::new(Shared {
                robot: Mutex::new(SimulatedRobot::new(config)),
                events,
                connected: AtomicBool::new(false),
                hold_responses: AtomicBool::new(false),
                held: Mutex::new(Vec::new()),
                fragment_len,
            }),
            receiver,
            subscribed: Vec::new(),
            stream_stop: Arc::new(AtomicBool::new(false)),
            streamer: None,
        }
    }

    /// Control handle for tests and the demo driver.
    pub fn handle(&self) -> SimulationHandle {
        SimulationHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    fn start_streaming(&mut self) {
        if self.streamer.is_some() {
            return;
        }
        let shared = Arc::clone(&self.shared);
        let stop = Arc::clone(&self.stream_stop);
        stop.store(false, Ordering::Release);
        let interval = Duration::from_millis(u64::from(SENSOR_INTERVAL_MS));
        let spawned = thread::Builder::new()
            .name(format!("sphero-sim-{}", self.robot))
            .spawn(move || {
                while !stop.load(Ordering::Acquire) {
                    thread::sleep(interval);
                    let frame = {
                        let mut robot = shared.robot.lock();
                        if !robot.is_streaming() {
                            continue;
                        }
                        let sample = robot.step();
                        robot.telemetry_frame(&sample)
                    };
                    shared.notify(&frame);
                }
            });
        match spawned {
            Ok(handle) => self.streamer = Some(handle),
            Err(e) => warn!(robot = self.robot, error = %e, "failed to spawn telemetry stream"),
        }
    }

    fn stop_streaming(&mut self) {
        self.stream_stop.store(true, Ordering::Release);
        if let Some(handle) = self.streamer.take() {
            let _ = handle.join();
        }
    }
}

impl Connectable for SimulationTransport {
    fn connect(&mut self) -> Result<(), TransportError> {
        let (fail, stream) = {
            let robot = self.shared.robot.lock();
            (robot.config().fail_connect, robot.config().stream_telemetry)
        };
        if fail {
            let _ = self
                .shared
                .events
                .send(TransportEvent::ConnectFailed(format!("{} unreachable", self.address)));
            return Ok(());
        }
        info!(robot = self.robot, address = %self.address, "simulated robot connected");
        self.shared.connected.store(true, Ordering::Release);
        let _ = self.shared.events.send(TransportEvent::Connected);
        let _ = self.shared.events.send(TransportEvent::ServicesResolved);
        if stream {
            self.start_streaming();
        }
        Ok(())
    }

    fn disconnect(&mut self) {
        self.stop_streaming();
        if self.shared.connected.swap(false, Ordering::AcqRel) {
            debug!(robot = self.robot, "simulated robot disconnected");
            let _ = self.shared.events.send(TransportEvent::Disconnected);
        }
    }

    fn characteristics(&self) -> Vec<String> {
        if !self.shared.connected.load(Ordering::Acquire) {
            return Vec::new();
        }
        let expose_command = self.shared.robot.lock().config().expose_command_characteristic;
        let mut found = vec![
            ANTIDOS_CHARACTERISTIC,
            DFU_CONTROL_CHARACTERISTIC,
            DFU_INFO_CHARACTERISTIC,
            SUBS_CHARACTERISTIC,
        ];
        if expose_command {
            found.insert(0, APIV2_CHARACTERISTIC);
        }
        found.into_iter().map(String::from).collect()
    }
}

impl NotificationSource for SimulationTransport {
    fn enable_notifications(&mut self, characteristic: &str) -> Result<(), TransportError> {
        if !self.characteristics().iter().any(|c| c == characteristic) {
            return Err(TransportError::UnknownCharacteristic(characteristic.to_string()));
        }
        self.subscribed.push(characteristic.to_string());
        let _ = self.shared.events.send(TransportEvent::NotificationsEnabled {
            characteristic: characteristic.to_string(),
        });
        Ok(())
    }

    fn events(&self) -> Receiver<TransportEvent> {
        self.receiver.clone()
    }
}

impl CharacteristicWriter for SimulationTransport {
    fn write_value(&mut self, characteristic: &str, value: &[u8]) -> Result<(), TransportError> {
        if !self.shared.connected.load(Ordering::Acquire) {
            return Err(TransportError::Disconnected);
        }
        let responses = self.shared.robot.lock().handle_write(characteristic, value);
        let _ = self.shared.events.send(TransportEvent::WriteSucceeded {
            characteristic: characteristic.to_string(),
        });
        if self.shared.hold_responses.load(Ordering::Acquire) {
            self.shared.held.lock().extend(responses);
        } else {
            for frame in &responses {
                self.shared.notify(frame);
            }
        }
        Ok(())
    }
}

impl Transport for SimulationTransport {
    fn name(&self) -> &'static str {
        "simulation"
    }
}

impl Drop for SimulationTransport {
    fn drop(&mut self) {
        self.stop_streaming();
    }
}

/// Out-of-band control of a [`SimulationTransport`].
#[derive(Debug, Clone)]
pub struct SimulationHandle {
    shared: Arc<Shared>,
}

impl SimulationHandle {
    /// Notify one telemetry sample as if the robot streamed it.
    pub fn push_telemetry(&self, sample: &Telemetry) {
        let frame = self.shared.robot.lock().telemetry_frame(sample);
        self.shared.notify(&frame);
    }

    /// Notify raw bytes unchanged.
    pub fn push_raw(&self, value: &[u8]) {
        let _ = self.shared.events.send(TransportEvent::ValueUpdated {
            characteristic: APIV2_CHARACTERISTIC.to_string(),
            value: value.to_vec(),
        });
    }

    /// Queue an arbitrary transport event.
    pub fn push_event(&self, event: TransportEvent) {
        let _ = self.shared.events.send(event);
    }

    pub fn set_voltage(&self, volts: f32) {
        self.shared.robot.lock().set_voltage(volts);
    }

    /// Keep responses back until [`Self::release_responses`].
    pub fn hold_responses(&self, hold: bool) {
        self.shared.hold_responses.store(hold, Ordering::Release);
    }

    pub fn release_responses(&self) {
        let held = std::mem::take(&mut *self.shared.held.lock());
        for frame in &held {
            self.shared.notify(frame);
        }
    }

    /// Commands the robot has received, in order.
    pub fn received(&self) -> Vec<CommandMessage> {
        self.shared.robot.lock().received().to_vec()
    }

    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::Acquire)
    }
}

/// Builds a [`SimulationTransport`] per robot from one shared config.
#[derive(Debug, Clone, Default)]
pub struct SimulationFactory {
    config: SimulationConfig,
}

impl SimulationFactory {
    pub fn new(config: SimulationConfig) -> Self {
        Self { config }
    }
}

impl TransportFactory for SimulationFactory {
    fn open(&self, robot: usize, address: &str) -> Result<Box<dyn Transport>, TransportError> {
        Ok(Box::new(SimulationTransport::new(robot, address, self.config.clone())))
    }
}
