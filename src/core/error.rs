use std::io;
use thiserror::Error;

use crate::protocol::ChannelId;

/// Custom error types for the EFIS core
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Frame length error on {channel}: expected {expected} bytes, got {actual}")]
    FrameLength {
        channel: ChannelId,
        expected: usize,
        actual: usize,
    },

    #[error("Frame decode error: {0}")]
    FrameDecode(String),

    #[error("Unknown channel id 0x{0:03X}")]
    UnknownChannel(u32),

    #[error("Transport send error: {0}")]
    TransportSend(String),

    #[error("Device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("Shutdown error: {0}")]
    Shutdown(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Creates a new frame length error
    pub fn frame_length(channel: ChannelId, expected: usize, actual: usize) -> Self {
        Error::FrameLength { channel, expected, actual }
    }

    /// Creates a new frame decode error
    pub fn frame_decode(msg: impl Into<String>) -> Self {
        Error::FrameDecode(msg.into())
    }

    /// Creates a new transport send error
    pub fn transport_send(msg: impl Into<String>) -> Self {
        Error::TransportSend(msg.into())
    }

    /// Creates a new device unavailable error
    pub fn device_unavailable(msg: impl Into<String>) -> Self {
        Error::DeviceUnavailable(msg.into())
    }

    /// Creates a new shutdown error
    pub fn shutdown(msg: impl Into<String>) -> Self {
        Error::Shutdown(msg.into())
    }

    /// Creates a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }
}
