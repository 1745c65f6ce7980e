//! Application settings

use super::ConfigError;
use crate::core::bluetooth::BluetoothDevice;
use crate::core::socket::DEFAULT_READ_CHUNK;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Terminal settings
    pub terminal: TerminalConfig,
    /// Connection settings
    pub connection: ConnectionSettings,
    /// Logging settings
    pub logging: LoggingConfig,
    /// Known devices
    pub devices: Vec<BluetoothDevice>,
}

impl AppConfig {
    /// Load config from the default location
    pub fn load() -> Result<Self, ConfigError> {
        let path = super::config_path().ok_or(ConfigError::NoConfigDir)?;
        Self::load_from(&path)
    }

    /// Load config from `path`; a missing file yields defaults
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Save config to the default location
    pub fn save(&self) -> Result<PathBuf, ConfigError> {
        let path = super::config_path().ok_or(ConfigError::NoConfigDir)?;
        self.save_to(&path)?;
        Ok(path)
    }

    /// Save config to `path`, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Known devices, named first
    pub fn sorted_devices(&self) -> Vec<BluetoothDevice> {
        let mut devices = self.devices.clone();
        devices.sort();
        devices
    }

    /// Add a device or update the name of a known one
    pub fn remember_device(&mut self, device: BluetoothDevice) {
        match self.devices.iter_mut().find(|d| d.address.eq_ignore_ascii_case(&device.address)) {
            Some(known) => {
                if device.known_name().is_some() {
                    known.name = device.name;
                }
            }
            None => self.devices.push(device),
        }
    }
}

/// Terminal settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerminalConfig {
    /// Line ending appended on send
    pub newline: LineEnding,
    /// Send and display hex
    pub hex_mode: bool,
    /// Prefix received lines with the time
    pub show_timestamps: bool,
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            newline: LineEnding::CrLf,
            hex_mode: false,
            show_timestamps: false,
        }
    }
}

/// Line ending type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum LineEnding {
    /// Carriage Return only
    Cr,
    /// Line Feed only
    Lf,
    /// Both CR and LF
    #[default]
    CrLf,
    /// Nothing appended
    None,
}

impl LineEnding {
    /// Get the byte sequence for this line ending
    pub fn bytes(&self) -> &'static [u8] {
        match self {
            Self::Cr => b"\r",
            Self::Lf => b"\n",
            Self::CrLf => b"\r\n",
            Self::None => b"",
        }
    }

    /// Same sequence as text
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cr => "\r",
            Self::Lf => "\n",
            Self::CrLf => "\r\n",
            Self::None => "",
        }
    }
}

impl FromStr for LineEnding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cr" => Ok(Self::Cr),
            "lf" => Ok(Self::Lf),
            "crlf" => Ok(Self::CrLf),
            "none" => Ok(Self::None),
            other => Err(format!("unknown line ending '{other}' (cr, lf, crlf, none)")),
        }
    }
}

/// Connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
    /// Bytes per socket read
    pub read_chunk_size: usize,
    /// RFCOMM channel for SPP
    pub rfcomm_channel: u8,
    /// TCP connect timeout
    pub connect_timeout_secs: u64,
    /// Serial port baud rate
    pub serial_baud_rate: u32,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            read_chunk_size: DEFAULT_READ_CHUNK,
            rfcomm_channel: 1,
            connect_timeout_secs: 10,
            serial_baud_rate: 115_200,
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    pub level: String,
    /// Also write a daily log file
    pub file: bool,
    /// Log file directory
    pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: false,
            directory: super::log_dir(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let config = AppConfig::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.terminal.newline, LineEnding::CrLf);
        assert_eq!(config.connection.read_chunk_size, 1024);
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = AppConfig::default();
        config.terminal.hex_mode = true;
        config.terminal.newline = LineEnding::None;
        config.connection.rfcomm_channel = 3;
        config.remember_device(BluetoothDevice::new("00:11:22:33:44:55").with_name("HC-05"));
        config.save_to(&path).unwrap();

        assert_eq!(AppConfig::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[terminal]\nnewline = \"Lf\"\n").unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.terminal.newline, LineEnding::Lf);
        assert!(!config.terminal.hex_mode);
        assert_eq!(config.connection, ConnectionSettings::default());
    }

    #[test]
    fn test_invalid_file_is_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "terminal = 5").unwrap();
        assert!(matches!(AppConfig::load_from(&path), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_remember_device_updates_name() {
        let mut config = AppConfig::default();
        config.remember_device(BluetoothDevice::new("AA:BB:CC:DD:EE:FF"));
        config.remember_device(BluetoothDevice::new("aa:bb:cc:dd:ee:ff").with_name("Sensor"));
        config.remember_device(BluetoothDevice::new("AA:BB:CC:DD:EE:FF"));
        assert_eq!(config.devices.len(), 1);
        assert_eq!(config.devices[0].display_name(), "Sensor");
    }

    #[test]
    fn test_line_ending_parse() {
        assert_eq!("CRLF".parse::<LineEnding>().unwrap(), LineEnding::CrLf);
        assert_eq!("none".parse::<LineEnding>().unwrap().bytes(), b"");
        assert!("tab".parse::<LineEnding>().is_err());
    }
}
