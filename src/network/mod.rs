//! Collaborator transports
//!
//! This module defines the bus and client contracts the core depends on and
//! ships the concrete transports the binary uses: a CAN gateway stream, native
//! SocketCAN behind the `socketcan` feature, and a single-client TCP endpoint
//! speaking newline-delimited JSON.

mod bus;
mod client;
#[cfg(test)]
pub(crate) mod mock;

#[cfg(all(feature = "socketcan", target_os = "linux"))]
pub use self::bus::SocketCanBus;
pub use self::bus::{BusTransport, FieldBus, StreamBus};
pub use self::client::{bind_listener, serve_clients, ClientChannel, ClientSlot, MAX_LINE_LENGTH};
