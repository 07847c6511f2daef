//! Wire-level constants: reserved framing bytes, characteristic UUIDs and
//! fixed command payload values.

use bitflags::bitflags;
use static_assertions::const_assert_eq;

/// First byte of every frame.
pub const START: u8 = 0x8D;
/// Last byte of every frame.
pub const END: u8 = 0xD8;
/// Prefix announcing that the next byte is an escaped reserved value.
pub const ESCAPE: u8 = 0xAB;
/// Bits cleared on a reserved byte to form its escaped representation.
pub const ESCAPE_MASK: u8 = 0x88;

/// Escaped form of [`ESCAPE`].
pub const ESCAPED_ESCAPE: u8 = ESCAPE & !ESCAPE_MASK;
/// Escaped form of [`START`].
pub const ESCAPED_START: u8 = START & !ESCAPE_MASK;
/// Escaped form of [`END`].
pub const ESCAPED_END: u8 = END & !ESCAPE_MASK;

const_assert_eq!(ESCAPED_ESCAPE, 0x23);
const_assert_eq!(ESCAPED_START, 0x05);
const_assert_eq!(ESCAPED_END, 0x50);

/// Smallest accepted receive buffer (START through CHECKSUM, END excluded):
/// START, FLAGS, device, command, sequence, CHECKSUM.
pub const MIN_FRAME_LEN: usize = 6;

/// Largest payload carried in either direction. Well above the largest
/// known response, a 52-byte sensor sample; longer inbound bodies are
/// dropped with [`super::ProtocolError::PayloadTooLong`].
pub const MAX_PAYLOAD_LEN: usize = 255;

/// Target id addressing the robot's main processor.
pub const ROBOT_TARGET_ID: u8 = 0x12;

/// Returns `true` for bytes that must never appear literally inside a frame.
#[inline]
pub const fn is_reserved(byte: u8) -> bool {
    matches!(byte, START | END | ESCAPE)
}

// ─── Characteristics ────────────────────────────────────────────────

/// Primary command/response characteristic.
pub const APIV2_CHARACTERISTIC: &str = "00010002-574f-4f20-5370-6865726f2121";
/// Anti-lockout characteristic receiving the wake signal.
pub const ANTIDOS_CHARACTERISTIC: &str = "00020005-574f-4f20-5370-6865726f2121";
/// Firmware-update control characteristic.
pub const DFU_CONTROL_CHARACTERISTIC: &str = "00020002-574f-4f20-5370-6865726f2121";
/// Firmware-update info characteristic.
pub const DFU_INFO_CHARACTERISTIC: &str = "00020004-574f-4f20-5370-6865726f2121";
/// Subscription characteristic.
pub const SUBS_CHARACTERISTIC: &str = "00020003-574f-4f20-5370-6865726f2121";

/// Characteristics known to accept notification subscriptions.
pub const NOTIFICATION_CHARACTERISTICS: [&str; 4] = [
    APIV2_CHARACTERISTIC,
    "00010003-574f-4f20-5370-6865726f2121",
    DFU_CONTROL_CHARACTERISTIC,
    "00002a05-0000-1000-8000-00805f9b34fb",
];

/// Bytes written to the anti-lockout characteristic before waking a robot.
pub const WAKE_SIGNAL: &[u8; 18] = b"usetheforce...band";

// ─── Sensor stream ──────────────────────────────────────────────────

/// Telemetry streaming interval requested from the robot, in ms.
pub const SENSOR_INTERVAL_MS: u16 = 100;

bitflags! {
    /// Sensor stream selection bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SensorMask: u32 {
        const VELOCITY_Y = 1 << 3;
        const VELOCITY_X = 1 << 4;
        const LOCATOR_Y = 1 << 5;
        const LOCATOR_X = 1 << 6;
        const ACCELEROMETER_Z_FILTERED = 1 << 13;
        const ACCELEROMETER_Y_FILTERED = 1 << 14;
        const ACCELEROMETER_X_FILTERED = 1 << 15;
        const IMU_YAW_FILTERED = 1 << 16;
        const IMU_ROLL_FILTERED = 1 << 17;
        const IMU_PITCH_FILTERED = 1 << 18;
        const GYRO_Z_FILTERED = 1 << 23;
        const GYRO_Y_FILTERED = 1 << 24;
        const GYRO_X_FILTERED = 1 << 25;

        const LOCATOR_FILTERED_ALL = Self::VELOCITY_Y.bits()
            | Self::VELOCITY_X.bits()
            | Self::LOCATOR_Y.bits()
            | Self::LOCATOR_X.bits();
        const ACCELEROMETER_FILTERED_ALL = Self::ACCELEROMETER_Z_FILTERED.bits()
            | Self::ACCELEROMETER_Y_FILTERED.bits()
            | Self::ACCELEROMETER_X_FILTERED.bits();
        const ORIENTATION_FILTERED_ALL = Self::IMU_YAW_FILTERED.bits()
            | Self::IMU_ROLL_FILTERED.bits()
            | Self::IMU_PITCH_FILTERED.bits();
        const GYRO_FILTERED_ALL = Self::GYRO_Z_FILTERED.bits()
            | Self::GYRO_Y_FILTERED.bits()
            | Self::GYRO_X_FILTERED.bits();
    }
}

/// Primary stream: accelerometer, orientation and locator.
pub const PRIMARY_SENSOR_MASK: SensorMask = SensorMask::ACCELEROMETER_FILTERED_ALL
    .union(SensorMask::ORIENTATION_FILTERED_ALL)
    .union(SensorMask::LOCATOR_FILTERED_ALL);

/// Extended stream: filtered gyroscope.
pub const EXTENDED_SENSOR_MASK: SensorMask = SensorMask::GYRO_FILTERED_ALL;

const_assert_eq!(PRIMARY_SENSOR_MASK.bits(), 516_216);
const_assert_eq!(EXTENDED_SENSOR_MASK.bits(), 58_720_256);
