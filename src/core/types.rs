use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{Error, Result};
use crate::protocol::ChannelId;

/// Where the field bus comes from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// TCP gateway streaming raw `can_frame` records
    pub gateway_addr: Option<SocketAddr>,
    /// Native SocketCAN interface, e.g. `can0` (requires the `socketcan` feature)
    pub socketcan_interface: Option<String>,
}

/// Seesaw rotary encoder on an I2C bus
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    /// I2C character device, e.g. `/dev/i2c-1`
    pub device: PathBuf,
    /// 7-bit bus address
    pub address: u16,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        EncoderConfig {
            device: PathBuf::from("/dev/i2c-1"),
            address: super::DEFAULT_ENCODER_ADDRESS,
        }
    }
}

/// Configuration for the EFIS core
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Bus transport selection
    pub bus: BusConfig,
    /// Address the display client connects to
    pub client_bind_addr: SocketAddr,
    /// Snapshot cadence towards the client
    #[serde(serialize_with = "super::serde::serialize_duration")]
    #[serde(deserialize_with = "super::serde::deserialize_duration")]
    pub publish_interval: Duration,
    /// How often the freshness monitor sweeps tracked channels
    #[serde(serialize_with = "super::serde::serialize_duration")]
    #[serde(deserialize_with = "super::serde::deserialize_duration")]
    pub freshness_interval: Duration,
    /// Age after which a tracked channel is nulled
    #[serde(serialize_with = "super::serde::serialize_duration")]
    #[serde(deserialize_with = "super::serde::deserialize_duration")]
    pub freshness_timeout: Duration,
    /// Channels invalidated when stale
    pub tracked_channels: Vec<ChannelId>,
    /// Lowest accepted altimeter setting, hundredths of inHg
    pub qnh_min: i32,
    /// Highest accepted altimeter setting, hundredths of inHg
    pub qnh_max: i32,
    /// Unchanged altimeter settings are re-sent at most this often
    #[serde(serialize_with = "super::serde::serialize_duration")]
    #[serde(deserialize_with = "super::serde::deserialize_duration")]
    pub qnh_resend_period: Duration,
    /// Identifier used for outbound altimeter-setting frames
    #[serde(serialize_with = "super::serde::serialize_can_id")]
    #[serde(deserialize_with = "super::serde::deserialize_can_id")]
    pub qnh_out_id: u32,
    /// Sysfs backlight directory, e.g. `/sys/class/backlight/10-0045`
    pub backlight_device: Option<PathBuf>,
    /// Rotary encoder for operator input; none when absent
    pub encoder: Option<EncoderConfig>,
    /// Operator input polling period
    #[serde(serialize_with = "super::serde::serialize_duration")]
    #[serde(deserialize_with = "super::serde::deserialize_duration")]
    pub input_poll_interval: Duration,
    /// How long tasks get to stop before cleanup proceeds regardless
    #[serde(serialize_with = "super::serde::serialize_duration")]
    #[serde(deserialize_with = "super::serde::deserialize_duration")]
    pub shutdown_grace: Duration,
    /// Default tracing filter when `RUST_LOG` is unset
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bus: BusConfig::default(),
            client_bind_addr: SocketAddr::from(([0, 0, 0, 0], super::DEFAULT_CLIENT_PORT)),
            publish_interval: Duration::from_millis(50),
            freshness_interval: Duration::from_millis(50),
            freshness_timeout: Duration::from_millis(200),
            tracked_channels: vec![ChannelId::Attitude, ChannelId::Acceleration],
            qnh_min: super::QNH_MIN,
            qnh_max: super::QNH_MAX,
            qnh_resend_period: Duration::from_millis(1000),
            qnh_out_id: ChannelId::AltimeterSetting.raw(),
            backlight_device: None,
            encoder: None,
            input_poll_interval: Duration::from_millis(20),
            shutdown_grace: Duration::from_secs(2),
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Loads a configuration from a JSON file; absent keys take their defaults
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("failed to read {}: {}", path.display(), e)))?;
        Self::from_json(&text)
    }

    /// Parses and validates a JSON configuration document
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(text)
            .map_err(|e| Error::config(format!("invalid configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects settings the tasks cannot run with
    pub fn validate(&self) -> Result<()> {
        let intervals = [
            ("publish_interval", self.publish_interval),
            ("freshness_interval", self.freshness_interval),
            ("freshness_timeout", self.freshness_timeout),
            ("input_poll_interval", self.input_poll_interval),
        ];
        for (name, value) in intervals {
            if value.is_zero() {
                return Err(Error::config(format!("{} must be greater than zero", name)));
            }
        }

        if self.qnh_min > self.qnh_max {
            return Err(Error::config(format!(
                "qnh_min ({}) exceeds qnh_max ({})",
                self.qnh_min, self.qnh_max
            )));
        }

        // value * 4 must still fit the i16 wire field
        if self.qnh_min < 0 || self.qnh_max > i32::from(i16::MAX) / 4 {
            return Err(Error::config(format!(
                "qnh band {}..={} does not fit the wire format",
                self.qnh_min, self.qnh_max
            )));
        }

        if self.qnh_out_id > super::MAX_STANDARD_ID {
            return Err(Error::config(format!(
                "qnh_out_id 0x{:X} is not a standard 11-bit identifier",
                self.qnh_out_id
            )));
        }

        if let Some(encoder) = &self.encoder {
            if encoder.address > 0x7F {
                return Err(Error::config(format!(
                    "encoder address 0x{:X} is not a 7-bit I2C address",
                    encoder.address
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.freshness_timeout, Duration::from_millis(200));
        assert_eq!(config.publish_interval, Duration::from_millis(50));
        assert_eq!(config.qnh_out_id, 0x2E);
        assert_eq!(
            config.tracked_channels,
            vec![ChannelId::Attitude, ChannelId::Acceleration]
        );
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = Config::from_json(
            r#"{
                "freshness_timeout": 500,
                "qnh_out_id": "0x002",
                "tracked_channels": ["attitude", "gps_position"],
                "bus": { "gateway_addr": "127.0.0.1:29536" }
            }"#,
        )
        .unwrap();

        assert_eq!(config.freshness_timeout, Duration::from_millis(500));
        assert_eq!(config.qnh_out_id, 0x2);
        assert_eq!(
            config.tracked_channels,
            vec![ChannelId::Attitude, ChannelId::GpsPosition]
        );
        assert_eq!(
            config.bus.gateway_addr,
            Some("127.0.0.1:29536".parse().unwrap())
        );
        assert_eq!(config.qnh_min, 2800);
    }

    #[test]
    fn test_config_validation() {
        let config = Config {
            publish_interval: Duration::ZERO,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let config = Config {
            qnh_min: 3100,
            qnh_max: 2800,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            qnh_max: 9000,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            qnh_out_id: 0x800,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_encoder_section() {
        assert!(Config::default().encoder.is_none());

        let config = Config::from_json(r#"{ "encoder": {} }"#).unwrap();
        assert_eq!(config.encoder, Some(EncoderConfig::default()));
        assert_eq!(config.encoder.unwrap().address, 0x36);

        let config = Config::from_json(r#"{ "encoder": { "device": "/dev/i2c-3", "address": 55 } }"#).unwrap();
        let encoder = config.encoder.unwrap();
        assert_eq!(encoder.device, PathBuf::from("/dev/i2c-3"));
        assert_eq!(encoder.address, 55);

        assert!(matches!(
            Config::from_json(r#"{ "encoder": { "address": 200 } }"#),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_malformed_json_is_config_error() {
        assert!(matches!(Config::from_json("{"), Err(Error::Config(_))));
    }
}
