//! Sensor telemetry decoding.
//!
//! A sensor-response payload carries 13 big-endian `f32` values in wire
//! order: pitch, roll, yaw, ax, ay, az, posX, posY, velX, velY, wx, wy, wz.
//! Position and velocity arrive in metres and are scaled to centimetres.

use super::ProtocolError;
use super::consts::MAX_PAYLOAD_LEN;
use serde::{Deserialize, Serialize};
use static_assertions::const_assert;

/// Number of floats in a telemetry payload.
pub const TELEMETRY_FIELDS: usize = 13;

/// Exact byte length of a telemetry payload.
pub const TELEMETRY_PAYLOAD_LEN: usize = TELEMETRY_FIELDS * 4;

const_assert!(TELEMETRY_PAYLOAD_LEN <= MAX_PAYLOAD_LEN);

/// Scale applied to position and velocity readings.
const LOCATOR_SCALE: f32 = 100.0;

/// Named telemetry value, as listed in the sensor output configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TelemetryField {
    PositionX,
    PositionY,
    VelocityX,
    VelocityY,
    Roll,
    Pitch,
    Yaw,
    Wx,
    Wy,
    Wz,
    Ax,
    Ay,
    Az,
}

impl TelemetryField {
    /// Output ordering used when none is configured.
    pub const DEFAULT_OUTPUT: [TelemetryField; TELEMETRY_FIELDS] = [
        Self::PositionX,
        Self::PositionY,
        Self::VelocityX,
        Self::VelocityY,
        Self::Roll,
        Self::Pitch,
        Self::Yaw,
        Self::Wx,
        Self::Wy,
        Self::Wz,
        Self::Ax,
        Self::Ay,
        Self::Az,
    ];
}

/// One decoded telemetry sample.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Telemetry {
    pub pitch: f32,
    pub roll: f32,
    pub yaw: f32,
    pub ax: f32,
    pub ay: f32,
    pub az: f32,
    pub position_x: f32,
    pub position_y: f32,
    pub velocity_x: f32,
    pub velocity_y: f32,
    pub wx: f32,
    pub wy: f32,
    pub wz: f32,
}

impl Telemetry {
    /// Decode a sensor-response payload.
    ///
    /// # Errors
    ///
    /// - [`ProtocolError::TelemetryLength`] if the payload is not exactly
    ///   [`TELEMETRY_PAYLOAD_LEN`] bytes (a partial stream, not fatal)
    /// - [`ProtocolError::TelemetryNaN`] if any value is NaN (fatal for the robot)
    pub fn decode(payload: &[u8]) -> Result<Self, ProtocolError> {
        if payload.len() != TELEMETRY_PAYLOAD_LEN {
            return Err(ProtocolError::TelemetryLength {
                len: payload.len(),
                expected: TELEMETRY_PAYLOAD_LEN,
            });
        }

        let mut raw = [0f32; TELEMETRY_FIELDS];
        for (value, chunk) in raw.iter_mut().zip(payload.chunks_exact(4)) {
            *value = f32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        let [pitch, roll, yaw, ax, ay, az, px, py, vx, vy, wx, wy, wz] = raw;

        let telemetry = Self {
            pitch,
            roll,
            yaw,
            ax,
            ay,
            az,
            position_x: px * LOCATOR_SCALE,
            position_y: py * LOCATOR_SCALE,
            velocity_x: vx * LOCATOR_SCALE,
            velocity_y: vy * LOCATOR_SCALE,
            wx,
            wy,
            wz,
        };

        if let Some(field) = TelemetryField::DEFAULT_OUTPUT
            .iter()
            .copied()
            .find(|f| telemetry.get(*f).is_nan())
        {
            return Err(ProtocolError::TelemetryNaN { field });
        }
        Ok(telemetry)
    }

    /// Encode back to wire order, undoing the locator scaling.
    pub fn to_payload(&self) -> [u8; TELEMETRY_PAYLOAD_LEN] {
        let raw = [
            self.pitch,
            self.roll,
            self.yaw,
            self.ax,
            self.ay,
            self.az,
            self.position_x / LOCATOR_SCALE,
            self.position_y / LOCATOR_SCALE,
            self.velocity_x / LOCATOR_SCALE,
            self.velocity_y / LOCATOR_SCALE,
            self.wx,
            self.wy,
            self.wz,
        ];
        let mut out = [0u8; TELEMETRY_PAYLOAD_LEN];
        for (chunk, value) in out.chunks_exact_mut(4).zip(raw) {
            chunk.copy_from_slice(&value.to_be_bytes());
        }
        out
    }

    pub fn get(&self, field: TelemetryField) -> f32 {
        match field {
            TelemetryField::PositionX => self.position_x,
            TelemetryField::PositionY => self.position_y,
            TelemetryField::VelocityX => self.velocity_x,
            TelemetryField::VelocityY => self.velocity_y,
            TelemetryField::Roll => self.roll,
            TelemetryField::Pitch => self.pitch,
            TelemetryField::Yaw => self.yaw,
            TelemetryField::Wx => self.wx,
            TelemetryField::Wy => self.wy,
            TelemetryField::Wz => self.wz,
            TelemetryField::Ax => self.ax,
            TelemetryField::Ay => self.ay,
            TelemetryField::Az => self.az,
        }
    }

    /// Values of `fields`, in the given order.
    pub fn project(&self, fields: &[TelemetryField]) -> Vec<f32> {
        fields.iter().map(|f| self.get(*f)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload_of(values: [f32; TELEMETRY_FIELDS]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_be_bytes()).collect()
    }

    #[test]
    fn decodes_wire_order_and_scales_locator() {
        let mut values = [0f32; TELEMETRY_FIELDS];
        for (i, v) in values.iter_mut().enumerate() {
            *v = i as f32 + 0.5;
        }
        let t = Telemetry::decode(&payload_of(values)).unwrap();
        assert_eq!(t.pitch, 0.5);
        assert_eq!(t.yaw, 2.5);
        assert_eq!(t.az, 5.5);
        assert_eq!(t.position_x, 650.0);
        assert_eq!(t.velocity_y, 950.0);
        assert_eq!(t.wz, 12.5);
    }

    #[test]
    fn wrong_length_is_rejected() {
        let err = Telemetry::decode(&[0u8; 40]).unwrap_err();
        assert_eq!(
            err,
            ProtocolError::TelemetryLength {
                len: 40,
                expected: TELEMETRY_PAYLOAD_LEN
            }
        );
    }

    #[test]
    fn nan_is_reported_with_field() {
        let mut values = [1.0f32; TELEMETRY_FIELDS];
        values[10] = f32::NAN;
        let err = Telemetry::decode(&payload_of(values)).unwrap_err();
        assert_eq!(
            err,
            ProtocolError::TelemetryNaN {
                field: TelemetryField::Wx
            }
        );
    }

    #[test]
    fn projection_follows_requested_order() {
        let t = Telemetry {
            yaw: 3.0,
            position_x: 7.0,
            ..Telemetry::default()
        };
        assert_eq!(
            t.project(&[TelemetryField::Yaw, TelemetryField::PositionX]),
            vec![3.0, 7.0]
        );
    }

    #[test]
    fn payload_round_trips() {
        let t = Telemetry {
            pitch: 1.25,
            position_y: 50.0,
            wz: -2.0,
            ..Telemetry::default()
        };
        assert_eq!(Telemetry::decode(&t.to_payload()).unwrap(), t);
    }

    #[test]
    fn field_names_are_camel_case() {
        #[derive(Deserialize)]
        struct Wrapper {
            fields: Vec<TelemetryField>,
        }
        let w: Wrapper = toml::from_str(r#"fields = ["positionX", "wz", "velocityY"]"#).unwrap();
        assert_eq!(
            w.fields,
            vec![
                TelemetryField::PositionX,
                TelemetryField::Wz,
                TelemetryField::VelocityY
            ]
        );
    }
}
