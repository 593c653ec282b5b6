//! Long-running tasks and their lifecycle
//!
//! The bus reader, publisher and input poller each run as their own tokio
//! task next to the freshness monitor and control handler. The
//! [`Coordinator`] starts them and tears them down. [`SeesawEncoder`] is the
//! I2C rotary encoder the input poller reads.

mod bus_reader;
mod coordinator;
pub(crate) mod encoder;
mod input;
mod publisher;

pub use self::bus_reader::{BusReader, BusStats, RECEIVE_RETRY_DELAY};
pub use self::coordinator::{Coordinator, ABORT_WAIT};
pub use self::encoder::{SeesawEncoder, BUTTON_PIN, ENCODER_PRODUCT, READ_DELAY};
pub use self::input::{InputDevice, InputPoller, InputSample, InputTracker, MAX_POSITION_STEP};
pub use self::publisher::Publisher;
