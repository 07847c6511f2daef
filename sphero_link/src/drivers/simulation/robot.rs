//! Protocol-level model of a robot.
//!
//! Decodes the frames a link writes, tracks a minimal motion model and
//! produces the response and telemetry frames a real robot would notify.

use rand::Rng;
use sphero_common::protocol::consts::{
    ANTIDOS_CHARACTERISTIC, APIV2_CHARACTERISTIC, SENSOR_INTERVAL_MS, WAKE_SIGNAL,
};
use sphero_common::protocol::{
    BatteryState, Command, CommandMessage, DrivingCommand, Flags, FrameDecoder, Payload,
    PowerCommand, SensorCommand, SequenceCounter, Telemetry,
};
use tracing::{debug, trace};

/// Behaviour knobs of a simulated robot.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// Reported battery voltage.
    pub voltage: f32,
    pub charging: BatteryState,
    /// Answer the wake command.
    pub respond_to_wake: bool,
    /// Expose the command characteristic during discovery.
    pub expose_command_characteristic: bool,
    /// Fail every connect attempt.
    pub fail_connect: bool,
    /// Notification fragment size in bytes.
    pub fragment_len: usize,
    /// Stream telemetry from a background thread once the sensor mask is set.
    pub stream_telemetry: bool,
    /// Amplitude of the noise added to streamed accelerometer values.
    pub noise: f32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            voltage: 4.1,
            charging: BatteryState::NotCharging,
            respond_to_wake: true,
            expose_command_characteristic: true,
            fail_connect: false,
            fragment_len: 20,
            stream_telemetry: true,
            noise: 0.01,
        }
    }
}

/// Simulated robot firmware.
#[derive(Debug)]
pub struct SimulatedRobot {
    config: SimulationConfig,
    decoder: FrameDecoder,
    notify_sequence: SequenceCounter,
    unlocked: bool,
    awake: bool,
    streaming: bool,
    received: Vec<CommandMessage>,
    heading: f32,
    speed: f32,
    yaw_offset: f32,
    position: (f32, f32),
}

impl SimulatedRobot {
    pub fn new(config: SimulationConfig) -> Self {
        Self {
            config,
            decoder: FrameDecoder::new(),
            notify_sequence: SequenceCounter::new(),
            unlocked: false,
            awake: false,
            streaming: false,
            received: Vec::new(),
            heading: 0.0,
            speed: 0.0,
            yaw_offset: 0.0,
            position: (0.0, 0.0),
        }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn set_voltage(&mut self, volts: f32) {
        self.config.voltage = volts;
    }

    pub fn is_awake(&self) -> bool {
        self.awake
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    /// Every command frame received so far.
    pub fn received(&self) -> &[CommandMessage] {
        &self.received
    }

    /// Handle one write; returns the response frames to notify.
    pub fn handle_write(&mut self, characteristic: &str, bytes: &[u8]) -> Vec<Vec<u8>> {
        if characteristic == ANTIDOS_CHARACTERISTIC {
            self.unlocked = bytes == WAKE_SIGNAL.as_slice();
            debug!(unlocked = self.unlocked, "simulated robot received wake signal");
            return Vec::new();
        }
        if characteristic != APIV2_CHARACTERISTIC {
            return Vec::new();
        }
        self.decoder
            .feed(bytes)
            .into_iter()
            .filter_map(Result::ok)
            .filter_map(|msg| {
                self.received.push(msg.clone());
                self.respond(&msg)
            })
            .map(|msg| msg.encode())
            .collect()
    }

    fn respond(&mut self, msg: &CommandMessage) -> Option<CommandMessage> {
        let command = msg.command()?;
        trace!(?command, sequence = msg.sequence, "simulated robot handling command");
        let payload: Payload = match command {
            Command::Power(PowerCommand::Wake) => {
                if !self.config.respond_to_wake {
                    return None;
                }
                self.awake = true;
                Payload::new()
            }
            Command::Power(PowerCommand::BatteryVoltage) => {
                let hundredths = (self.config.voltage * 100.0).round() as u16;
                Payload::from_slice(&hundredths.to_be_bytes()).ok()?
            }
            Command::Power(PowerCommand::Charging) => {
                Payload::from_slice(&[0, self.config.charging.into()]).ok()?
            }
            Command::Driving(DrivingCommand::ResetYaw) => {
                self.yaw_offset = self.heading;
                Payload::new()
            }
            Command::Driving(DrivingCommand::DriveWithHeading) => {
                if let &[speed, hi, lo, ..] = msg.payload.as_slice() {
                    self.speed = f32::from(speed);
                    self.heading = f32::from(u16::from_be_bytes([hi, lo]));
                }
                Payload::new()
            }
            Command::Sensor(SensorCommand::SensorMask) => {
                self.streaming = true;
                Payload::new()
            }
            _ => Payload::new(),
        };
        Some(CommandMessage {
            flags: Flags::IS_RESPONSE,
            target_id: None,
            source_id: msg.target_id,
            device_id: msg.device_id,
            command_id: msg.command_id,
            sequence: msg.sequence,
            payload,
        })
    }

    /// Advance the motion model by one sensor interval and return the
    /// resulting sample.
    pub fn step(&mut self) -> Telemetry {
        let dt = f32::from(SENSOR_INTERVAL_MS) / 1000.0;
        // Speed units map to roughly 0..2 m/s; position is reported in metres
        // and scaled to centimetres on decode.
        let v = self.speed / 255.0 * 2.0;
        let rad = self.heading.to_radians();
        let (vx, vy) = (v * rad.sin(), v * rad.cos());
        self.position.0 += vx * dt;
        self.position.1 += vy * dt;

        let noise = self.config.noise;
        let mut rng = rand::thread_rng();
        let mut jitter = || if noise > 0.0 { rng.gen_range(-noise..noise) } else { 0.0 };
        Telemetry {
            pitch: 0.0,
            roll: 0.0,
            yaw: self.heading - self.yaw_offset,
            ax: jitter(),
            ay: jitter(),
            az: 1.0 + jitter(),
            position_x: self.position.0,
            position_y: self.position.1,
            velocity_x: vx,
            velocity_y: vy,
            wx: 0.0,
            wy: 0.0,
            wz: 0.0,
        }
    }

    /// Wrap a sample in a sensor-response notification frame.
    pub fn telemetry_frame(&mut self, sample: &Telemetry) -> Vec<u8> {
        let payload = Payload::from_slice(&sample.to_payload()).unwrap_or_default();
        CommandMessage {
            flags: Flags::IS_RESPONSE,
            target_id: None,
            source_id: None,
            device_id: Command::Sensor(SensorCommand::SensorResponse).device().into(),
            command_id: SensorCommand::SensorResponse.into(),
            sequence: self.notify_sequence.next(),
            payload,
        }
        .encode()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sphero_common::protocol::Request;

    fn write(robot: &mut SimulatedRobot, request: Request, seq: u8) -> Vec<CommandMessage> {
        let frames = robot.handle_write(APIV2_CHARACTERISTIC, &request.into_message(seq).encode());
        let mut decoder = FrameDecoder::new();
        frames
            .iter()
            .flat_map(|f| decoder.feed(f))
            .map(|r| r.unwrap())
            .collect()
    }

    #[test]
    fn responds_with_request_sequence() {
        let mut robot = SimulatedRobot::new(SimulationConfig::default());
        let replies = write(&mut robot, Request::Wake, 7);
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].sequence, 7);
        assert!(replies[0].is_response());
        assert!(robot.is_awake());
    }

    #[test]
    fn voltage_reply_encodes_hundredths() {
        let mut robot = SimulatedRobot::new(SimulationConfig {
            voltage: 3.6,
            ..Default::default()
        });
        let replies = write(&mut robot, Request::BatteryVoltage, 1);
        assert_eq!(replies[0].payload.as_slice(), &[0x01, 0x68]);
    }

    #[test]
    fn silent_wake() {
        let mut robot = SimulatedRobot::new(SimulationConfig {
            respond_to_wake: false,
            ..Default::default()
        });
        assert!(write(&mut robot, Request::Wake, 1).is_empty());
    }

    #[test]
    fn roll_moves_the_model() {
        let mut robot = SimulatedRobot::new(SimulationConfig {
            noise: 0.0,
            ..Default::default()
        });
        write(&mut robot, Request::Roll { speed: 255, heading: 90 }, 1);
        let sample = robot.step();
        assert_eq!(sample.yaw, 90.0);
        assert!(sample.position_x > 0.0);
        assert!(sample.position_y.abs() < 1e-3);
    }

    #[test]
    fn telemetry_frames_differ_by_sequence() {
        let mut robot = SimulatedRobot::new(SimulationConfig::default());
        let sample = Telemetry::default();
        assert_ne!(robot.telemetry_frame(&sample), robot.telemetry_frame(&sample));
    }
}
