//! Bus protocol implementation module
//!
//! This module defines the telemetry channel table, the fixed little-endian
//! payload layouts, and the stream codec used to carry raw CAN frames.

pub mod codec;
pub mod message;

pub use self::codec::{altimeter_setting_frame, decode, encode_altimeter_setting, CanFrameCodec};
pub use self::message::{
    Acceleration, AirData, AltimeterSetting, Attitude, Axis, ChannelId, Frame, GpsPosition,
    GpsVector, PressureData, Reading, TimeSync,
};
