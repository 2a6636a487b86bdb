//! Per-transport configuration derived from runtime settings
//!
//! Each loader reads one transport's enable flag and parameters from the
//! [`SettingsStore`] collaborator and returns `None` when the transport is
//! disabled. Values are read once per supervisor start cycle; a settings
//! change takes effect only after an explicit restart.

use serde::{Deserialize, Serialize};

use crate::error::{PageSrvError, Result};
use crate::storage::SettingsStore;

pub const SERIAL_ENABLED: &str = "serial_enabled";
pub const SERIAL_PORT: &str = "serial_port";
pub const SERIAL_BAUD_RATE: &str = "serial_baud_rate";
pub const TAP_ENABLED: &str = "tap_enabled";
pub const TAP_HOST: &str = "tap_host";
pub const TAP_PORT: &str = "tap_port";
pub const SERIAL_IP_ENABLED: &str = "serial_ip_enabled";
pub const SERIAL_IP_HOST: &str = "serial_ip_host";
pub const SERIAL_IP_PORT: &str = "serial_ip_port";

/// Serial line configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialConfig {
    /// Serial device path (e.g., "/dev/ttyUSB0", "COM1")
    pub device: String,
    /// Baud rate
    pub baud_rate: u32,
}

impl SerialConfig {
    pub fn validate(&self) -> Result<()> {
        if self.device.is_empty() {
            return Err(PageSrvError::config("serial device path cannot be empty"));
        }
        if self.baud_rate == 0 {
            return Err(PageSrvError::config("serial baud rate must be greater than zero"));
        }
        Ok(())
    }
}

/// Serial-over-IP listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialIpConfig {
    /// Bind address
    pub host: String,
    /// Listen port
    pub port: u16,
}

impl SerialIpConfig {
    pub fn validate(&self) -> Result<()> {
        if self.host.is_empty() {
            return Err(PageSrvError::config("serial-over-IP host cannot be empty"));
        }
        Ok(())
    }
}

/// TAP listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TapConfig {
    /// Bind address
    pub host: String,
    /// Listen port
    pub port: u16,
}

impl TapConfig {
    pub fn validate(&self) -> Result<()> {
        if self.host.is_empty() {
            return Err(PageSrvError::config("TAP host cannot be empty"));
        }
        Ok(())
    }
}

/// Serial line settings, `None` when disabled.
pub async fn load_serial(store: &dyn SettingsStore) -> Result<Option<SerialConfig>> {
    if !flag_enabled(&store.get_setting(SERIAL_ENABLED, "false").await?) {
        return Ok(None);
    }

    let device = store.get_setting(SERIAL_PORT, "/dev/ttyUSB0").await?;
    let baud = store.get_setting(SERIAL_BAUD_RATE, "9600").await?;
    let baud_rate = parse_number(SERIAL_BAUD_RATE, &baud)?;

    let config = SerialConfig { device, baud_rate };
    config.validate()?;
    Ok(Some(config))
}

/// Serial-over-IP settings, `None` when disabled.
pub async fn load_serial_ip(store: &dyn SettingsStore) -> Result<Option<SerialIpConfig>> {
    if !flag_enabled(&store.get_setting(SERIAL_IP_ENABLED, "false").await?) {
        return Ok(None);
    }

    let host = store.get_setting(SERIAL_IP_HOST, "localhost").await?;
    let port = store.get_setting(SERIAL_IP_PORT, "5001").await?;
    let port = parse_number(SERIAL_IP_PORT, &port)?;

    let config = SerialIpConfig { host, port };
    config.validate()?;
    Ok(Some(config))
}

/// TAP settings, `None` when disabled.
pub async fn load_tap(store: &dyn SettingsStore) -> Result<Option<TapConfig>> {
    if !flag_enabled(&store.get_setting(TAP_ENABLED, "false").await?) {
        return Ok(None);
    }

    let host = store.get_setting(TAP_HOST, "localhost").await?;
    let port = store.get_setting(TAP_PORT, "18001").await?;
    let port = parse_number(TAP_PORT, &port)?;

    let config = TapConfig { host, port };
    config.validate()?;
    Ok(Some(config))
}

fn flag_enabled(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("true")
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| PageSrvError::config(format!("invalid {key} '{value}'")))
}
