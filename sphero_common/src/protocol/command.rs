//! Command messages and the outbound request catalogue.

use super::consts::{
    EXTENDED_SENSOR_MASK, MAX_PAYLOAD_LEN, PRIMARY_SENSOR_MASK, ROBOT_TARGET_ID,
    SENSOR_INTERVAL_MS, SensorMask, is_reserved,
};
use super::frame::Flags;
use super::ids::{Command, DrivingCommand, PowerCommand, SensorCommand, UserIoCommand};
use super::ProtocolError;

/// Fixed-capacity payload storage.
pub type Payload = heapless::Vec<u8, MAX_PAYLOAD_LEN>;

/// Semantic content of one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandMessage {
    pub flags: Flags,
    pub target_id: Option<u8>,
    pub source_id: Option<u8>,
    pub device_id: u8,
    pub command_id: u8,
    pub sequence: u8,
    pub payload: Payload,
}

impl CommandMessage {
    /// Build an outbound request that asks for a response and resets the
    /// robot's inactivity timer.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::PayloadTooLong`] if `payload` exceeds
    /// [`MAX_PAYLOAD_LEN`].
    pub fn request(
        device_id: u8,
        command_id: u8,
        target_id: Option<u8>,
        sequence: u8,
        payload: &[u8],
    ) -> Result<Self, ProtocolError> {
        let payload = Payload::from_slice(payload).map_err(|_| ProtocolError::PayloadTooLong {
            len: payload.len(),
            max: MAX_PAYLOAD_LEN,
        })?;
        let mut flags = Flags::REQUESTS_RESPONSE | Flags::RESETS_INACTIVITY_TIMEOUT;
        flags.set(Flags::HAS_TARGET_ID, target_id.is_some());
        Ok(Self {
            flags,
            target_id,
            source_id: None,
            device_id,
            command_id,
            sequence,
            payload,
        })
    }

    /// Catalogued command this message carries, if any.
    pub fn command(&self) -> Option<Command> {
        Command::classify(self.device_id, self.command_id)
    }

    pub fn is_response(&self) -> bool {
        self.flags.contains(Flags::IS_RESPONSE)
    }
}

/// Per-session sequence numbers: `(n + 1) % 255`, starting at 1.
#[derive(Debug, Clone, Default)]
pub struct SequenceCounter {
    last: u8,
}

impl SequenceCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&mut self) -> u8 {
        self.last = ((self.last as u16 + 1) % 255) as u8;
        self.last
    }
}

/// Nudge a heading or speed off the reserved framing values.
pub fn avoid_reserved(value: u16) -> u16 {
    match u8::try_from(value) {
        Ok(byte) if is_reserved(byte) => value + 1,
        _ => value,
    }
}

/// Outbound requests issued by a robot link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    Wake,
    BatteryVoltage,
    ChargingState,
    FrontBackLeds { front: [u8; 3], back: [u8; 3] },
    MatrixColor([u8; 3]),
    ResetYaw,
    ResetLocator,
    DisableStabilization,
    /// Drive forward at `speed` toward absolute `heading` degrees.
    Roll { speed: u8, heading: u16 },
    SensorStream { interval_ms: u16, mask: SensorMask },
    SensorStreamExtended { mask: SensorMask },
}

impl Request {
    /// Sensor configuration sent once the robot reports its voltage.
    pub const SENSOR_CONFIGURATION: [Request; 2] = [
        Request::SensorStream {
            interval_ms: SENSOR_INTERVAL_MS,
            mask: PRIMARY_SENSOR_MASK,
        },
        Request::SensorStreamExtended {
            mask: EXTENDED_SENSOR_MASK,
        },
    ];

    pub fn command(&self) -> Command {
        match self {
            Self::Wake => Command::Power(PowerCommand::Wake),
            Self::BatteryVoltage => Command::Power(PowerCommand::BatteryVoltage),
            Self::ChargingState => Command::Power(PowerCommand::Charging),
            Self::FrontBackLeds { .. } => Command::UserIo(UserIoCommand::AllLeds),
            Self::MatrixColor(_) => Command::UserIo(UserIoCommand::MatrixColor),
            Self::ResetYaw => Command::Driving(DrivingCommand::ResetYaw),
            Self::ResetLocator => Command::Sensor(SensorCommand::ResetLocator),
            Self::DisableStabilization => Command::Driving(DrivingCommand::Stabilization),
            Self::Roll { .. } => Command::Driving(DrivingCommand::DriveWithHeading),
            Self::SensorStream { .. } => Command::Sensor(SensorCommand::SensorMask),
            Self::SensorStreamExtended { .. } => Command::Sensor(SensorCommand::SensorMaskExtended),
        }
    }

    /// Power and all-LED requests go to the default target.
    pub fn target_id(&self) -> Option<u8> {
        match self {
            Self::Wake | Self::BatteryVoltage | Self::ChargingState | Self::FrontBackLeds { .. } => {
                None
            }
            _ => Some(ROBOT_TARGET_ID),
        }
    }

    pub fn payload(&self) -> Payload {
        let mut buf = [0u8; 8];
        let len = match *self {
            Self::Wake
            | Self::BatteryVoltage
            | Self::ChargingState
            | Self::ResetYaw
            | Self::ResetLocator => 0,
            Self::FrontBackLeds { front, back } => {
                buf[0] = 0x3F;
                buf[1..4].copy_from_slice(&front);
                buf[4..7].copy_from_slice(&back);
                7
            }
            Self::MatrixColor(rgb) => {
                buf[..3].copy_from_slice(&rgb);
                3
            }
            Self::DisableStabilization => {
                buf[0] = 0x05;
                1
            }
            Self::Roll { speed, heading } => {
                buf[..4].copy_from_slice(&[speed, (heading >> 8) as u8, (heading & 0xFF) as u8, 0]);
                4
            }
            Self::SensorStream { interval_ms, mask } => {
                buf[..2].copy_from_slice(&interval_ms.to_be_bytes());
                buf[3..7].copy_from_slice(&mask.bits().to_be_bytes());
                7
            }
            Self::SensorStreamExtended { mask } => {
                buf[..4].copy_from_slice(&mask.bits().to_be_bytes());
                4
            }
        };
        Payload::from_slice(&buf[..len]).unwrap_or_default()
    }

    /// Materialize the request with the session's next sequence number.
    pub fn into_message(self, sequence: u8) -> CommandMessage {
        let command = self.command();
        let mut flags = Flags::REQUESTS_RESPONSE | Flags::RESETS_INACTIVITY_TIMEOUT;
        let target_id = self.target_id();
        flags.set(Flags::HAS_TARGET_ID, target_id.is_some());
        CommandMessage {
            flags,
            target_id,
            source_id: None,
            device_id: command.device().into(),
            command_id: command.command_id(),
            sequence,
            payload: self.payload(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_starts_at_one_and_wraps_at_255() {
        let mut seq = SequenceCounter::new();
        assert_eq!(seq.next(), 1);
        for _ in 0..253 {
            seq.next();
        }
        assert_eq!(seq.next(), 0);
        assert_eq!(seq.next(), 1);
    }

    #[test]
    fn roll_payload_layout() {
        let msg = Request::Roll {
            speed: 128,
            heading: 90,
        }
        .into_message(3);
        assert_eq!(msg.device_id, 0x16);
        assert_eq!(msg.command_id, 7);
        assert_eq!(msg.target_id, Some(ROBOT_TARGET_ID));
        assert_eq!(msg.payload.as_slice(), &[128, 0, 90, 0]);

        let msg = Request::Roll {
            speed: 10,
            heading: 300,
        }
        .into_message(4);
        assert_eq!(msg.payload.as_slice(), &[10, 1, 44, 0]);
    }

    #[test]
    fn targeted_flags_match_reference_value() {
        let msg = Request::ResetYaw.into_message(1);
        assert_eq!(msg.flags.bits(), 0x1A);
        let msg = Request::Wake.into_message(1);
        assert_eq!(msg.flags.bits(), 0x0A);
        assert_eq!(msg.target_id, None);
    }

    #[test]
    fn sensor_configuration_payloads() {
        let [primary, extended] = Request::SENSOR_CONFIGURATION;
        assert_eq!(
            primary.payload().as_slice(),
            &[0, 100, 0, 0x00, 0x07, 0xE0, 0x78]
        );
        assert_eq!(extended.payload().as_slice(), &[0x03, 0x80, 0x00, 0x00]);
    }

    #[test]
    fn led_payloads() {
        let leds = Request::FrontBackLeds {
            front: [255, 255, 255],
            back: [0, 0, 0],
        };
        assert_eq!(leds.payload().as_slice(), &[0x3F, 255, 255, 255, 0, 0, 0]);
        assert_eq!(leds.target_id(), None);
        assert_eq!(
            Request::MatrixColor([1, 2, 3]).payload().as_slice(),
            &[1, 2, 3]
        );
        assert_eq!(Request::DisableStabilization.payload().as_slice(), &[0x05]);
    }

    #[test]
    fn reserved_values_are_nudged() {
        assert_eq!(avoid_reserved(141), 142);
        assert_eq!(avoid_reserved(171), 172);
        assert_eq!(avoid_reserved(216), 217);
        assert_eq!(avoid_reserved(90), 90);
        assert_eq!(avoid_reserved(360), 360);
    }

    #[test]
    fn oversized_request_payload_rejected() {
        let big = [0u8; MAX_PAYLOAD_LEN + 1];
        assert!(matches!(
            CommandMessage::request(0x13, 3, None, 1, &big),
            Err(ProtocolError::PayloadTooLong { .. })
        ));
    }
}
