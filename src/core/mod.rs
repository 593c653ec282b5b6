//! Core types and traits for the EFIS core
//!
//! This module contains the fundamental building blocks used throughout the library.

pub mod error;
pub mod serde;
pub mod types;

pub use self::error::{Error, Result};
pub use self::types::{BusConfig, Config, EncoderConfig};

/// Default TCP port the display client connects to
pub const DEFAULT_CLIENT_PORT: u16 = 8765;

/// I2C address of the seesaw rotary encoder breakout
pub const DEFAULT_ENCODER_ADDRESS: u16 = 0x36;

/// Lowest altimeter setting accepted from the client (28.00 inHg)
pub const QNH_MIN: i32 = 2800;

/// Highest altimeter setting accepted from the client (31.00 inHg)
pub const QNH_MAX: i32 = 3100;

/// Hundredths of inHg per hPa
pub const INHG_HUNDREDTHS_PER_HPA: f64 = 2.95299875;

/// Largest 11-bit standard CAN identifier
pub const MAX_STANDARD_ID: u32 = 0x7FF;
