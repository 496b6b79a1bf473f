//! Configuration schema definitions.
//!
//! This module defines the structure of the configuration file using serde.
//! Every section has defaults, so an empty file is a valid configuration.

use crate::port::{OpenOptions, DEFAULT_BAUD_RATE, DEFAULT_POLL_INTERVAL};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Defaults for opening serial ports
    pub serial: SerialDefaults,
    /// Hardware testing configuration
    pub testing: TestingConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Serial port defaults section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialDefaults {
    /// Default baud rate for new sessions
    pub baud_rate: u32,
    pub data_bits: u8,
    pub stop_bits: u8,
    /// Bytes a read waits for before returning
    pub minimum_read_size: usize,
    /// Read timeout in milliseconds; absent means reads wait indefinitely
    pub read_timeout_ms: Option<u64>,
    /// How often blocked calls check for a concurrent close
    pub poll_interval_ms: u64,
    /// Port aliases for convenience
    #[serde(default)]
    pub port_aliases: HashMap<String, String>,
}

impl Default for SerialDefaults {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            data_bits: 8,
            stop_bits: 1,
            minimum_read_size: 0,
            read_timeout_ms: None,
            poll_interval_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64,
            port_aliases: HashMap::new(),
        }
    }
}

impl SerialDefaults {
    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout_ms.map(Duration::from_millis)
    }

    /// Resolve a port name through aliases
    pub fn resolve_port(&self, name: &str) -> String {
        self.port_aliases
            .get(name)
            .cloned()
            .unwrap_or_else(|| name.to_string())
    }

    /// Options for opening `port` (or the port it aliases) with these
    /// defaults. Validation happens when the options are used.
    pub fn open_options(&self, port: &str) -> OpenOptions {
        OpenOptions::new(self.resolve_port(port))
            .baud_rate(self.baud_rate)
            .data_bits(self.data_bits)
            .stop_bits(self.stop_bits)
            .minimum_read_size(self.minimum_read_size)
            .read_timeout(self.read_timeout())
            .poll_interval(Duration::from_millis(self.poll_interval_ms))
    }
}

/// Hardware testing configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TestingConfig {
    /// Port wired to the test board
    pub port: Option<String>,
    /// Test baud rate
    pub baud: u32,
    /// Whether the test port has TX wired to RX
    pub loopback_enabled: bool,
    /// Guard timeout for each exchange, in milliseconds
    pub timeout_ms: u64,
    /// Delay after opening before the first write, in milliseconds
    pub settle_ms: u64,
}

impl Default for TestingConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud: 19200,
            loopback_enabled: false,
            timeout_ms: 2000,
            settle_ms: 3000,
        }
    }
}

impl TestingConfig {
    /// Get the test timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset
    pub level: String,
    /// Log format: "json", "pretty", "compact"
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON format
    Json,
    /// Pretty format with colors
    #[default]
    Pretty,
    /// Compact format
    Compact,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.serial.baud_rate, 9600);
        assert_eq!(config.serial.minimum_read_size, 0);
        assert_eq!(config.serial.read_timeout(), None);
        assert_eq!(config.testing.baud, 19200);
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn test_port_alias_resolution() {
        let mut config = SerialDefaults::default();
        config
            .port_aliases
            .insert("arduino".to_string(), "COM3".to_string());

        assert_eq!(config.resolve_port("arduino"), "COM3");
        assert_eq!(config.resolve_port("COM5"), "COM5");
    }

    #[test]
    fn test_open_options_from_defaults() {
        let mut config = SerialDefaults {
            baud_rate: 19200,
            minimum_read_size: 4,
            read_timeout_ms: Some(2000),
            ..SerialDefaults::default()
        };
        config
            .port_aliases
            .insert("board".to_string(), "/dev/ttyACM0".to_string());

        let options = config.open_options("board");
        assert_eq!(options.port_name, "/dev/ttyACM0");
        assert_eq!(options.baud_rate, 19200);
        assert_eq!(options.minimum_read_size, 4);
        assert_eq!(options.read_timeout, Some(Duration::from_secs(2)));
        assert_eq!(options.poll_interval, DEFAULT_POLL_INTERVAL);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[serial]"));
        assert!(toml_str.contains("[testing]"));
        assert!(toml_str.contains("[logging]"));
    }

    #[test]
    fn test_config_deserialization() {
        let toml_str = r#"
            [serial]
            baud_rate = 115200
            read_timeout_ms = 500

            [serial.port_aliases]
            uno = "COM7"

            [logging]
            format = "json"
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.serial.baud_rate, 115200);
        assert_eq!(config.serial.read_timeout(), Some(Duration::from_millis(500)));
        assert_eq!(config.serial.resolve_port("uno"), "COM7");
        assert_eq!(config.logging.format, LogFormat::Json);
        // Defaults should still work
        assert_eq!(config.serial.data_bits, 8);
        assert_eq!(config.testing.timeout_ms, 2000);
    }
}
