//! Display control commands
//!
//! Parses control requests from the display, clamps them to their valid
//! ranges, rate-limits altimeter settings onto the bus, and drives the
//! display backlight.

pub mod backlight;
pub mod command;
pub mod handler;

pub use self::backlight::{Backlight, SysfsBacklight};
pub use self::command::{ControlCommand, InboundMessage};
pub use self::handler::{clamp_brightness, CommandOutcome, ControlHandler, OutboundBaroState};
