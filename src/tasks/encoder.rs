use std::io::{Read, Write};
use std::path::Path;
use std::time::Duration;

use tracing::{info, warn};

use super::{InputDevice, InputSample};
use crate::core::{Error, Result};

/// Product code reported by the seesaw rotary encoder breakout
pub const ENCODER_PRODUCT: u16 = 4991;

/// Seesaw pin wired to the encoder's push button
pub const BUTTON_PIN: u32 = 24;

/// Settling time between selecting a register and reading it back
pub const READ_DELAY: Duration = Duration::from_millis(8);

pub(crate) const STATUS_BASE: u8 = 0x00;
pub(crate) const STATUS_VERSION: u8 = 0x02;
pub(crate) const GPIO_BASE: u8 = 0x01;
pub(crate) const GPIO_DIRCLR_BULK: u8 = 0x03;
pub(crate) const GPIO_BULK: u8 = 0x04;
pub(crate) const GPIO_BULK_SET: u8 = 0x05;
pub(crate) const GPIO_PULLENSET: u8 = 0x0B;
pub(crate) const ENCODER_BASE: u8 = 0x11;
pub(crate) const ENCODER_POSITION: u8 = 0x30;

/// `I2C_SLAVE` request from `linux/i2c-dev.h`
#[cfg(target_os = "linux")]
const I2C_SLAVE: u16 = 0x0703;

#[cfg(target_os = "linux")]
nix::ioctl_write_int_bad!(set_slave_address, I2C_SLAVE);

/// Seesaw rotary encoder with a push button, spoken to over raw I2C.
///
/// Registers are addressed by a (base, function) pair. A write sends the pair
/// followed by the data; a read sends the pair alone, waits `read_delay`, then
/// reads four big-endian bytes.
pub struct SeesawEncoder<T> {
    io: T,
    read_delay: Duration,
}

impl<T: Read + Write> SeesawEncoder<T> {
    /// Checks the product code and configures the button pin as a pulled-up input
    pub fn new(io: T, read_delay: Duration) -> Result<Self> {
        let mut encoder = SeesawEncoder { io, read_delay };

        let version = u32::from_be_bytes(encoder.read_register(STATUS_BASE, STATUS_VERSION)?);
        let product = (version >> 16) as u16;
        if product == ENCODER_PRODUCT {
            info!(product, "found seesaw rotary encoder");
        } else {
            warn!(product, expected = ENCODER_PRODUCT, "unexpected seesaw product");
        }

        let mask = (1u32 << BUTTON_PIN).to_be_bytes();
        for function in [GPIO_DIRCLR_BULK, GPIO_PULLENSET, GPIO_BULK_SET] {
            encoder.write_register(GPIO_BASE, function, &mask)?;
        }
        Ok(encoder)
    }

    fn write_register(&mut self, base: u8, function: u8, data: &[u8]) -> Result<()> {
        let mut message = Vec::with_capacity(2 + data.len());
        message.extend_from_slice(&[base, function]);
        message.extend_from_slice(data);
        self.io.write_all(&message).map_err(|e| {
            Error::device_unavailable(format!("seesaw write {:02X}:{:02X}: {}", base, function, e))
        })
    }

    fn read_register(&mut self, base: u8, function: u8) -> Result<[u8; 4]> {
        self.write_register(base, function, &[])?;
        if !self.read_delay.is_zero() {
            std::thread::sleep(self.read_delay);
        }
        let mut value = [0u8; 4];
        self.io.read_exact(&mut value).map_err(|e| {
            Error::device_unavailable(format!("seesaw read {:02X}:{:02X}: {}", base, function, e))
        })?;
        Ok(value)
    }
}

impl SeesawEncoder<std::fs::File> {
    /// Opens an I2C character device such as `/dev/i2c-1` and binds `address`
    #[cfg(target_os = "linux")]
    pub fn open(device: &Path, address: u16) -> Result<Self> {
        use std::os::unix::io::AsRawFd;

        let file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .open(device)
            .map_err(|e| Error::device_unavailable(format!("{}: {}", device.display(), e)))?;

        // SAFETY: I2C_SLAVE takes the address by value and the descriptor is open
        unsafe { set_slave_address(file.as_raw_fd(), i32::from(address)) }.map_err(|e| {
            Error::device_unavailable(format!(
                "{}: cannot select address 0x{:02X}: {}",
                device.display(),
                address,
                e
            ))
        })?;

        info!(device = %device.display(), address = %format!("0x{:02X}", address), "opened I2C encoder");
        Self::new(file, READ_DELAY)
    }

    #[cfg(not(target_os = "linux"))]
    pub fn open(device: &Path, _address: u16) -> Result<Self> {
        Err(Error::device_unavailable(format!(
            "{}: I2C devices are only supported on Linux",
            device.display()
        )))
    }
}

impl<T> InputDevice for SeesawEncoder<T>
where
    T: Read + Write + Send + 'static,
{
    fn read(&mut self) -> Result<InputSample> {
        let count = i32::from_be_bytes(self.read_register(ENCODER_BASE, ENCODER_POSITION)?);
        let pins = u32::from_be_bytes(self.read_register(GPIO_BASE, GPIO_BULK)?);
        // Pulled up, so a pressed button reads low
        Ok(InputSample {
            count,
            pressed: pins & (1 << BUTTON_PIN) == 0,
        })
    }
}
