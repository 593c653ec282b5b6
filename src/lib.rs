//! EFIS core: avionics bus aggregation
//!
//! This library decodes sensor frames from the aircraft CAN bus into one
//! shared last-known state, nulls channels that stop reporting, publishes the
//! state to a single display client as JSON, and turns the display's control
//! commands back into bus frames and backlight changes.
pub mod control;
pub mod core;
pub mod network;
pub mod protocol;
pub mod state;
pub mod tasks;
pub mod util;

// Re-export commonly used items
pub use crate::core::{Config, Error, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
