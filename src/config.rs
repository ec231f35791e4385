//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! Timing knobs, framing bytes, and sensor calibration coefficients all
//! live here rather than in the protocol code: they are bench artifacts,
//! not protocol invariants.

use serde::Deserialize;
use serde::de::Error;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::Result;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub serial: SerialConfig,

    #[serde(default)]
    pub framing: FramingConfig,

    #[serde(default)]
    pub protocol: ProtocolConfig,

    #[serde(default)]
    pub calibration: CalibrationConfig,
}

/// Serial port configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SerialConfig {
    #[serde(default = "default_serial_port")]
    pub port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
}

/// Frame delimiter configuration
#[derive(Debug, Deserialize, Clone)]
pub struct FramingConfig {
    /// Two-byte frame terminator; commands and responses share it
    #[serde(default = "default_terminator")]
    pub terminator: [u8; 2],

    /// Bytes the resynchronizer may consume before giving up
    #[serde(default = "default_resync_byte_limit")]
    pub resync_byte_limit: usize,
}

/// Protocol timing configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ProtocolConfig {
    /// Deadline for any single framed response (boards answer within 10s)
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,

    /// Settle interval between the two storage-growth samples
    #[serde(default = "default_settle_secs")]
    pub settle_secs: u64,

    /// Delay after re-entering inspect mode before the second sample
    #[serde(default = "default_stabilize_ms")]
    pub stabilize_ms: u64,
}

/// Sensor calibration configuration
#[derive(Debug, Deserialize, Clone)]
pub struct CalibrationConfig {
    #[serde(default = "default_load_cell_scale")]
    pub load_cell_scale: f32,

    #[serde(default = "default_load_cell_offset")]
    pub load_cell_offset: f32,
}

// Default value functions
fn default_serial_port() -> String { "/dev/ttyUSB0".to_string() }
fn default_baud_rate() -> u32 { 115200 }

fn default_terminator() -> [u8; 2] { crate::protocol::wire::DEFAULT_TERMINATOR }
fn default_resync_byte_limit() -> usize { 4096 }

fn default_read_timeout_ms() -> u64 { 15000 }
fn default_settle_secs() -> u64 { 5 }
fn default_stabilize_ms() -> u64 { 1000 }

fn default_load_cell_scale() -> f32 { -223_810.211 }
fn default_load_cell_offset() -> f32 { 10.861_55 }

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: default_serial_port(),
            baud_rate: default_baud_rate(),
        }
    }
}

impl Default for FramingConfig {
    fn default() -> Self {
        Self {
            terminator: default_terminator(),
            resync_byte_limit: default_resync_byte_limit(),
        }
    }
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            read_timeout_ms: default_read_timeout_ms(),
            settle_secs: default_settle_secs(),
            stabilize_ms: default_stabilize_ms(),
        }
    }
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            load_cell_scale: default_load_cell_scale(),
            load_cell_offset: default_load_cell_offset(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            serial: SerialConfig::default(),
            framing: FramingConfig::default(),
            protocol: ProtocolConfig::default(),
            calibration: CalibrationConfig::default(),
        }
    }
}

impl ProtocolConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_secs(self.settle_secs)
    }

    pub fn stabilize(&self) -> Duration {
        Duration::from_millis(self.stabilize_ms)
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if self.serial.port.is_empty() {
            return Err(crate::error::BenchError::Config(
                toml::de::Error::custom("serial port cannot be empty")
            ));
        }

        if ![9600, 19200, 38400, 57600, 115200, 230400].contains(&self.serial.baud_rate) {
            return Err(crate::error::BenchError::Config(
                toml::de::Error::custom("baud_rate must be one of: 9600, 19200, 38400, 57600, 115200, 230400")
            ));
        }

        if self.framing.resync_byte_limit < 2 {
            return Err(crate::error::BenchError::Config(
                toml::de::Error::custom("resync_byte_limit must be at least 2")
            ));
        }

        if self.protocol.read_timeout_ms == 0 || self.protocol.read_timeout_ms > 60000 {
            return Err(crate::error::BenchError::Config(
                toml::de::Error::custom("read_timeout_ms must be between 1 and 60000")
            ));
        }

        if self.protocol.settle_secs == 0 || self.protocol.settle_secs > 120 {
            return Err(crate::error::BenchError::Config(
                toml::de::Error::custom("settle_secs must be between 1 and 120")
            ));
        }

        if self.protocol.stabilize_ms > 10000 {
            return Err(crate::error::BenchError::Config(
                toml::de::Error::custom("stabilize_ms must be at most 10000")
            ));
        }

        if self.calibration.load_cell_scale == 0.0 {
            return Err(crate::error::BenchError::Config(
                toml::de::Error::custom("load_cell_scale cannot be zero")
            ));
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
    }

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.serial.baud_rate, 115200);
        assert_eq!(config.framing.terminator, [b'\r', b'\n']);
        assert_eq!(config.framing.resync_byte_limit, 4096);
        assert_eq!(config.protocol.read_timeout_ms, 15000);
        assert_eq!(config.protocol.settle_secs, 5);
        assert_eq!(config.protocol.stabilize_ms, 1000);
    }

    #[test]
    fn test_duration_accessors() {
        let config = Config::default();
        assert_eq!(config.protocol.read_timeout(), Duration::from_secs(15));
        assert_eq!(config.protocol.settle(), Duration::from_secs(5));
        assert_eq!(config.protocol.stabilize(), Duration::from_secs(1));
    }

    #[test]
    fn test_empty_serial_port() {
        let mut config = Config::default();
        config.serial.port = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_baud_rate() {
        let mut config = Config::default();
        config.serial.baud_rate = 420000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_resync_byte_limit_too_small() {
        let mut config = Config::default();
        config.framing.resync_byte_limit = 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_read_timeout_zero() {
        let mut config = Config::default();
        config.protocol.read_timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_read_timeout_too_high() {
        let mut config = Config::default();
        config.protocol.read_timeout_ms = 60001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_settle_secs_zero() {
        let mut config = Config::default();
        config.protocol.settle_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_cell_scale_zero() {
        let mut config = Config::default();
        config.calibration.load_cell_scale = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_config_from_file() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let toml_content = r#"
[serial]
port = "/dev/ttyACM0"
baud_rate = 9600

[protocol]
settle_secs = 10
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = Config::load(temp_file.path()).unwrap();
        assert_eq!(config.serial.port, "/dev/ttyACM0");
        assert_eq!(config.serial.baud_rate, 9600);
        assert_eq!(config.protocol.settle_secs, 10);
        // untouched sections fall back to defaults
        assert_eq!(config.framing.terminator, [b'\r', b'\n']);
    }

    #[test]
    fn test_load_config_empty_file() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"").unwrap();
        temp_file.flush().unwrap();

        let config = Config::load(temp_file.path()).unwrap();
        assert_eq!(config.serial.port, default_serial_port());
    }

    #[test]
    fn test_custom_terminator() {
        let toml_content = r#"
[framing]
terminator = [31, 10]
"#;
        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.framing.terminator, [0x1F, b'\n']);
    }
}
