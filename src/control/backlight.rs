use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::core::{Error, Result};

/// Sysfs class directory holding backlight devices
pub const SYSFS_BACKLIGHT_ROOT: &str = "/sys/class/backlight";

/// Display brightness control
pub trait Backlight: Send + 'static {
    /// Sets brightness as a percentage, 0..=100
    fn set_brightness(&mut self, percent: u8) -> Result<()>;
}

/// Linux backlight class device, e.g. the Raspberry Pi touch display
#[derive(Debug, Clone)]
pub struct SysfsBacklight {
    brightness_path: PathBuf,
    max_brightness: u32,
}

impl SysfsBacklight {
    /// Opens a specific device directory
    pub fn open(device: impl AsRef<Path>) -> Result<Self> {
        let device = device.as_ref();
        let max_path = device.join("max_brightness");
        let max_brightness = fs::read_to_string(&max_path)
            .map_err(|e| Error::device_unavailable(format!("{}: {}", max_path.display(), e)))?
            .trim()
            .parse::<u32>()
            .map_err(|e| Error::device_unavailable(format!("{}: {}", max_path.display(), e)))?;

        let brightness_path = device.join("brightness");
        if !brightness_path.exists() {
            return Err(Error::device_unavailable(format!(
                "{} does not exist",
                brightness_path.display()
            )));
        }

        debug!(device = %device.display(), max_brightness, "opened backlight");
        Ok(SysfsBacklight {
            brightness_path,
            max_brightness,
        })
    }

    /// Opens the first device under [`SYSFS_BACKLIGHT_ROOT`]
    pub fn detect() -> Result<Self> {
        Self::detect_in(SYSFS_BACKLIGHT_ROOT)
    }

    fn detect_in(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        let mut devices: Vec<PathBuf> = fs::read_dir(root)
            .map_err(|e| Error::device_unavailable(format!("{}: {}", root.display(), e)))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .collect();
        devices.sort();

        let device = devices
            .into_iter()
            .next()
            .ok_or_else(|| Error::device_unavailable(format!("no backlight in {}", root.display())))?;
        Self::open(device)
    }

    /// Raw device level for a percentage, rounded to nearest
    pub fn level_for(&self, percent: u8) -> u32 {
        let percent = u64::from(percent.min(100));
        ((u64::from(self.max_brightness) * percent + 50) / 100) as u32
    }
}

impl Backlight for SysfsBacklight {
    fn set_brightness(&mut self, percent: u8) -> Result<()> {
        let level = self.level_for(percent);
        fs::write(&self.brightness_path, level.to_string())?;
        Ok(())
    }
}
