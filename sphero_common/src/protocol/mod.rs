//! Robot wire protocol.
//!
//! Pure byte-level codec shared by the robot link and the simulator:
//!
//! - [`frame`] - flag byte, checksum, escaping and the streaming [`FrameDecoder`]
//! - [`command`] - [`CommandMessage`], sequence numbers and outbound [`Request`]s
//! - [`ids`] - device/command catalogue and the `(device, command)` match table
//! - [`telemetry`] - sensor stream payload decoding
//! - [`consts`] - reserved bytes, characteristic UUIDs, sensor masks

pub mod command;
pub mod consts;
pub mod frame;
pub mod ids;
pub mod telemetry;

pub use command::{CommandMessage, Payload, Request, SequenceCounter, avoid_reserved};
pub use frame::{DecoderStats, Flags, FrameDecoder, checksum};
pub use ids::{BatteryState, Command, DeviceId, DrivingCommand, PowerCommand, SensorCommand, UserIoCommand};
pub use telemetry::{Telemetry, TelemetryField};

use thiserror::Error;

/// Protocol-level failures. All of them drop the offending frame or
/// payload; only [`ProtocolError::TelemetryNaN`] is fatal for a session.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProtocolError {
    /// END arrived before the minimum frame length.
    #[error("frame too short: {len} bytes")]
    FrameTooShort { len: usize },

    /// Checksum byte does not match the frame contents.
    #[error("checksum mismatch: expected {expected:#04x}, got {actual:#04x}")]
    ChecksumMismatch { expected: u8, actual: u8 },

    /// Payload exceeds [`consts::MAX_PAYLOAD_LEN`]; inbound, the whole
    /// frame is dropped.
    #[error("payload of {len} bytes exceeds {max}")]
    PayloadTooLong { len: usize, max: usize },

    /// Sensor payload with an unexpected length.
    #[error("telemetry payload has {len} bytes, expected {expected}")]
    TelemetryLength { len: usize, expected: usize },

    /// Sensor payload containing NaN.
    #[error("telemetry field {field:?} is NaN")]
    TelemetryNaN { field: TelemetryField },
}

impl ProtocolError {
    /// Whether the error must end the robot session.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::TelemetryNaN { .. })
    }
}
