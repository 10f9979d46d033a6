//! # Sensor Packet
//!
//! One sample from one IMU device. Orientation comes from the device
//! firmware as Euler angles in degrees; free acceleration is gravity
//! compensated, in m/s², device frame.

use std::fmt;

use serde::Deserialize;

use crate::signal::conditioning::Vec3;

/// Euler angles in degrees.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(from = "[f32; 3]")]
pub struct EulerAngles {
    /// Rotation about X.
    pub roll: f32,
    /// Rotation about Y.
    pub pitch: f32,
    /// Rotation about Z.
    pub yaw: f32,
}

impl EulerAngles {
    #[must_use]
    pub const fn new(roll: f32, pitch: f32, yaw: f32) -> Self {
        Self { roll, pitch, yaw }
    }
}

impl From<[f32; 3]> for EulerAngles {
    fn from(v: [f32; 3]) -> Self {
        Self::new(v[0], v[1], v[2])
    }
}

/// Stable identifier of a connected device (Bluetooth address).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(transparent)]
pub struct DeviceAddress(String);

impl DeviceAddress {
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A connected device. `index` is its position in the connection order
/// and stays the same for the whole session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    pub index: usize,
    pub address: DeviceAddress,
}

/// One sample for one device. Packets carry no timestamp; arrival order
/// per device is the only ordering.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Packet {
    pub orientation: Option<EulerAngles>,
    pub free_acceleration: Option<Vec3>,
}

impl Packet {
    /// Packet carrying only orientation.
    #[must_use]
    pub fn with_orientation(roll: f32, pitch: f32, yaw: f32) -> Self {
        Self {
            orientation: Some(EulerAngles::new(roll, pitch, yaw)),
            free_acceleration: None,
        }
    }

    /// Packet carrying only free acceleration.
    #[must_use]
    pub fn with_acceleration(x: f32, y: f32, z: f32) -> Self {
        Self {
            orientation: None,
            free_acceleration: Some(Vec3::new(x, y, z)),
        }
    }
}

/// Console readout, e.g. `Roll:  12.00, Pitch:  -3.50, Yaw:   0.00| AccX: ...`
impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(e) = self.orientation {
            write!(f, "Roll:{:7.2}, Pitch:{:7.2}, Yaw:{:7.2}| ", e.roll, e.pitch, e.yaw)?;
        }
        if let Some(a) = self.free_acceleration {
            write!(f, "AccX:{:7.2}, AccY:{:7.2}, AccZ:{:7.2} | ", a.x, a.y, a.z)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packet_display_orientation() {
        let packet = Packet::with_orientation(12.0, -3.5, 0.0);
        assert_eq!(
            packet.to_string(),
            "Roll:  12.00, Pitch:  -3.50, Yaw:   0.00| "
        );
    }

    #[test]
    fn test_packet_display_both() {
        let packet = Packet {
            orientation: Some(EulerAngles::new(1.0, 2.0, 3.0)),
            free_acceleration: Some(Vec3::new(0.1, 0.2, 0.3)),
        };
        let text = packet.to_string();
        assert!(text.starts_with("Roll:"));
        assert!(text.contains("AccX:   0.10"));
    }

    #[test]
    fn test_empty_packet_display() {
        assert_eq!(Packet::default().to_string(), "");
    }

    #[test]
    fn test_device_address_display() {
        let addr = DeviceAddress::new("D4:22:CD:00:36:80");
        assert_eq!(addr.to_string(), "D4:22:CD:00:36:80");
        assert_eq!(addr.as_str(), "D4:22:CD:00:36:80");
    }
}
