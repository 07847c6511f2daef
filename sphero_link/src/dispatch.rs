//! Inbound message interpretation.
//!
//! Turns a decoded [`CommandMessage`] into the [`Inbound`] event the link
//! reacts to. Routing is a single match over the catalogued
//! `(device, command)` pair.

use sphero_common::protocol::{
    BatteryState, Command, CommandMessage, DrivingCommand, PowerCommand, ProtocolError,
    SensorCommand, Telemetry,
};

/// What an inbound message means to the link.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Wake confirmation.
    Awake,
    /// Battery voltage in volts.
    Voltage(f32),
    /// Charging state; `Err` carries an unrecognised raw value.
    Charging(Result<BatteryState, u8>),
    /// Yaw reset or drive acknowledgement.
    DrivingAck(DrivingCommand),
    /// Decoded sensor sample.
    Telemetry(Telemetry),
    /// Catalogued message the link does not act on.
    Informational(Command),
    /// Pair outside the catalogue.
    Unknown { device_id: u8, command_id: u8 },
}

/// Interpret one message.
///
/// # Errors
///
/// Sensor payloads of the wrong length or containing NaN, and empty
/// voltage or charging payloads.
pub fn interpret(msg: &CommandMessage) -> Result<Inbound, ProtocolError> {
    let Some(command) = msg.command() else {
        return Ok(Inbound::Unknown {
            device_id: msg.device_id,
            command_id: msg.command_id,
        });
    };
    let inbound = match command {
        Command::Power(PowerCommand::Wake) => Inbound::Awake,
        Command::Power(PowerCommand::BatteryVoltage) => Inbound::Voltage(decode_voltage(&msg.payload)?),
        Command::Power(PowerCommand::Charging) => {
            let raw = *msg.payload.get(1).ok_or(ProtocolError::FrameTooShort {
                len: msg.payload.len(),
            })?;
            Inbound::Charging(BatteryState::try_from(raw))
        }
        Command::Driving(cmd @ (DrivingCommand::ResetYaw | DrivingCommand::DriveWithHeading)) => {
            Inbound::DrivingAck(cmd)
        }
        Command::Sensor(SensorCommand::SensorResponse) => {
            Inbound::Telemetry(Telemetry::decode(&msg.payload)?)
        }
        other => Inbound::Informational(other),
    };
    Ok(inbound)
}

/// Big-endian unsigned hundredths of a volt.
fn decode_voltage(payload: &[u8]) -> Result<f32, ProtocolError> {
    if payload.is_empty() || payload.len() > 4 {
        return Err(ProtocolError::FrameTooShort { len: payload.len() });
    }
    let raw = payload.iter().fold(0u32, |acc, b| (acc << 8) | u32::from(*b));
    Ok(raw as f32 / 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sphero_common::protocol::{Flags, Payload};

    fn response(device_id: u8, command_id: u8, payload: &[u8]) -> CommandMessage {
        CommandMessage {
            flags: Flags::IS_RESPONSE,
            target_id: None,
            source_id: None,
            device_id,
            command_id,
            sequence: 1,
            payload: Payload::from_slice(payload).unwrap(),
        }
    }

    #[test]
    fn voltage_is_hundredths() {
        assert_eq!(
            interpret(&response(0x13, 3, &[0x01, 0x68])).unwrap(),
            Inbound::Voltage(3.6)
        );
        assert_eq!(
            interpret(&response(0x13, 3, &[0x01, 0x77])).unwrap(),
            Inbound::Voltage(3.75)
        );
        assert!(interpret(&response(0x13, 3, &[])).is_err());
    }

    #[test]
    fn charging_state_from_second_byte() {
        assert_eq!(
            interpret(&response(0x13, 31, &[0, 2])).unwrap(),
            Inbound::Charging(Ok(BatteryState::Charging))
        );
        assert_eq!(
            interpret(&response(0x13, 31, &[0, 9])).unwrap(),
            Inbound::Charging(Err(9))
        );
    }

    #[test]
    fn routing_table() {
        assert_eq!(interpret(&response(0x13, 13, &[])).unwrap(), Inbound::Awake);
        assert_eq!(
            interpret(&response(0x16, 6, &[])).unwrap(),
            Inbound::DrivingAck(DrivingCommand::ResetYaw)
        );
        assert_eq!(
            interpret(&response(0x16, 7, &[])).unwrap(),
            Inbound::DrivingAck(DrivingCommand::DriveWithHeading)
        );
        assert_eq!(
            interpret(&response(0x16, 12, &[])).unwrap(),
            Inbound::Informational(Command::Driving(DrivingCommand::Stabilization))
        );
        assert_eq!(
            interpret(&response(0x11, 0, &[])).unwrap(),
            Inbound::Unknown {
                device_id: 0x11,
                command_id: 0
            }
        );
    }

    #[test]
    fn telemetry_errors_surface() {
        assert!(matches!(
            interpret(&response(0x18, 2, &[0; 10])),
            Err(ProtocolError::TelemetryLength { len: 10, .. })
        ));
        let nan = Telemetry {
            yaw: f32::NAN,
            ..Telemetry::default()
        };
        let err = interpret(&response(0x18, 2, &nan.to_payload())).unwrap_err();
        assert!(err.is_fatal());
    }
}
