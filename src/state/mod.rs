//! Live avionics state
//!
//! Holds the last-known value of every bus channel and operator input, the
//! per-channel decode timestamps, and the monitor that nulls channels which
//! have gone quiet.

pub mod avionics;
pub mod freshness;

pub use self::avionics::{AvionicsState, Snapshot};
pub use self::freshness::FreshnessMonitor;
