use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Telemetry channels understood by the dispatch table
///
/// Each variant is one wire identifier. Raw identifiers outside this table are
/// surfaced as [`crate::Error::UnknownChannel`] by [`ChannelId::from_raw`]'s
/// callers rather than silently dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelId {
    /// Airspeed, altitude, vertical speed
    AirPrimary,
    /// Static pressure, temperature, differential pressure
    Pressure,
    /// Altimeter setting (QNH)
    AltimeterSetting,
    /// Yaw, pitch, roll, turn rate
    Attitude,
    /// Body accelerations and sensor calibration code
    Acceleration,
    /// Latitude and longitude
    GpsPosition,
    /// Ground speed, GPS altitude, true track
    GpsVector,
    MagneticX,
    MagneticY,
    MagneticZ,
    /// UTC date and time from the GPS
    TimeSync,
}

impl ChannelId {
    /// Every channel in the table
    pub const ALL: [ChannelId; 11] = [
        ChannelId::AirPrimary,
        ChannelId::Pressure,
        ChannelId::AltimeterSetting,
        ChannelId::Attitude,
        ChannelId::Acceleration,
        ChannelId::GpsPosition,
        ChannelId::GpsVector,
        ChannelId::MagneticX,
        ChannelId::MagneticY,
        ChannelId::MagneticZ,
        ChannelId::TimeSync,
    ];

    /// Looks up a raw bus identifier
    pub fn from_raw(id: u32) -> Option<Self> {
        match id {
            0x028 => Some(ChannelId::AirPrimary),
            0x02B => Some(ChannelId::Pressure),
            0x02E => Some(ChannelId::AltimeterSetting),
            0x048 => Some(ChannelId::Attitude),
            0x049 => Some(ChannelId::Acceleration),
            0x04A => Some(ChannelId::MagneticX),
            0x04B => Some(ChannelId::MagneticY),
            0x04C => Some(ChannelId::MagneticZ),
            0x063 => Some(ChannelId::GpsPosition),
            0x064 => Some(ChannelId::GpsVector),
            0x019 => Some(ChannelId::TimeSync),
            _ => None,
        }
    }

    /// The raw bus identifier
    pub fn raw(self) -> u32 {
        match self {
            ChannelId::AirPrimary => 0x028,
            ChannelId::Pressure => 0x02B,
            ChannelId::AltimeterSetting => 0x02E,
            ChannelId::Attitude => 0x048,
            ChannelId::Acceleration => 0x049,
            ChannelId::MagneticX => 0x04A,
            ChannelId::MagneticY => 0x04B,
            ChannelId::MagneticZ => 0x04C,
            ChannelId::GpsPosition => 0x063,
            ChannelId::GpsVector => 0x064,
            ChannelId::TimeSync => 0x019,
        }
    }

    /// Exact payload length the channel's layout requires
    pub fn payload_len(self) -> usize {
        match self {
            ChannelId::MagneticX | ChannelId::MagneticY | ChannelId::MagneticZ => 4,
            _ => 8,
        }
    }

    /// Short lowercase name used in logs
    pub fn name(self) -> &'static str {
        match self {
            ChannelId::AirPrimary => "air_primary",
            ChannelId::Pressure => "pressure",
            ChannelId::AltimeterSetting => "altimeter_setting",
            ChannelId::Attitude => "attitude",
            ChannelId::Acceleration => "acceleration",
            ChannelId::GpsPosition => "gps_position",
            ChannelId::GpsVector => "gps_vector",
            ChannelId::MagneticX => "magnetic_x",
            ChannelId::MagneticY => "magnetic_y",
            ChannelId::MagneticZ => "magnetic_z",
            ChannelId::TimeSync => "time_sync",
        }
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:03X})", self.name(), self.raw())
    }
}

/// One bus message: identifier plus payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Raw 11-bit identifier
    pub id: u32,
    /// Payload, at most 8 bytes on a classic CAN bus
    pub data: Bytes,
}

impl Frame {
    /// Creates a frame from an identifier and payload
    pub fn new(id: u32, data: impl Into<Bytes>) -> Self {
        Frame { id, data: data.into() }
    }

    /// Channel this frame belongs to, if it is in the table
    pub fn channel(&self) -> Option<ChannelId> {
        ChannelId::from_raw(self.id)
    }
}

/// Airspeed, altitude and vertical speed from the air data module
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AirData {
    pub airspeed: i16,
    /// Feet, signed
    pub altitude: i32,
    /// Feet per minute
    pub vsi: i16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PressureData {
    pub static_pressure: i16,
    /// Degrees Celsius
    pub temperature: i8,
    pub differential_pressure: i16,
}

/// Altimeter setting as carried on the bus
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AltimeterSetting {
    /// Hundredths of inHg; the wire carries a quarter-unit of extra precision
    pub inhg_hundredths: f64,
    pub hpa: i16,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Attitude {
    /// Degrees, 0..360
    pub yaw: f64,
    /// Degrees, nose up positive
    pub pitch: f64,
    /// Degrees
    pub roll: f64,
    pub turn_rate: i16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Acceleration {
    pub x: i16,
    pub y: i16,
    pub z: i16,
    /// Calibration / magnetometer accuracy code reported by the AHRS
    pub calibration: i16,
}

/// Position in decimal degrees × 10⁶
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpsPosition {
    pub latitude: i32,
    pub longitude: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpsVector {
    /// Knots
    pub speed: i16,
    /// Feet
    pub altitude: i16,
    /// Degrees true
    pub true_track: i16,
}

/// UTC time as broadcast by the GPS module
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSync {
    pub year: i32,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

/// Magnetometer axis carried by a single-axis frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
    Z,
}

/// A successfully decoded frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reading {
    AirData(AirData),
    Pressure(PressureData),
    AltimeterSetting(AltimeterSetting),
    Attitude(Attitude),
    Acceleration(Acceleration),
    GpsPosition(GpsPosition),
    GpsVector(GpsVector),
    Magnetic { axis: Axis, value: f32 },
    TimeSync(TimeSync),
}

impl Reading {
    /// Channel the reading was decoded from
    pub fn channel(&self) -> ChannelId {
        match self {
            Reading::AirData(_) => ChannelId::AirPrimary,
            Reading::Pressure(_) => ChannelId::Pressure,
            Reading::AltimeterSetting(_) => ChannelId::AltimeterSetting,
            Reading::Attitude(_) => ChannelId::Attitude,
            Reading::Acceleration(_) => ChannelId::Acceleration,
            Reading::GpsPosition(_) => ChannelId::GpsPosition,
            Reading::GpsVector(_) => ChannelId::GpsVector,
            Reading::Magnetic { axis: Axis::X, .. } => ChannelId::MagneticX,
            Reading::Magnetic { axis: Axis::Y, .. } => ChannelId::MagneticY,
            Reading::Magnetic { axis: Axis::Z, .. } => ChannelId::MagneticZ,
            Reading::TimeSync(_) => ChannelId::TimeSync,
        }
    }
}
