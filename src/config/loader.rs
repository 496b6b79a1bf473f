//! Configuration loader with file resolution and environment override support.

use super::error::{ConfigError, ConfigResult};
use super::schema::{Config, LogFormat};
use crate::port::{DataBits, StopBits};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Environment variable prefix for overrides
const ENV_PREFIX: &str = "SERIAL_SESSION";

/// Config file name looked up in the current directory
const LOCAL_CONFIG_FILE_NAME: &str = "serial-session.toml";

/// Config file name inside the application config directory
const CONFIG_FILE_NAME: &str = "config.toml";

/// Application directory under the platform config directory
const APP_DIR_NAME: &str = "serial-session";

/// Environment variable for explicit config path
const CONFIG_PATH_ENV: &str = "SERIAL_SESSION_CONFIG";

/// Configuration loader with resolution and override logic.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Resolved config file path (if any)
    pub config_path: Option<PathBuf>,
    /// The loaded configuration
    pub config: Config,
}

impl ConfigLoader {
    /// Load configuration using standard resolution order.
    ///
    /// Resolution priority (highest to lowest):
    /// 1. `SERIAL_SESSION_CONFIG` environment variable (explicit path)
    /// 2. `./serial-session.toml` (current directory)
    /// 3. `~/.config/serial-session/config.toml` (XDG on Linux/macOS)
    /// 4. `%APPDATA%\serial-session\config.toml` (Windows)
    /// 5. Built-in defaults (no file required)
    ///
    /// Environment variables can override any config file values.
    pub fn load() -> ConfigResult<Self> {
        let config_path = resolve_config_path();

        let mut config = match config_path {
            Some(ref path) => load_from_file(path)?,
            None => Config::default(),
        };

        apply_env_overrides(&mut config)?;
        validate(&config)?;

        Ok(Self {
            config_path,
            config,
        })
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref().to_path_buf();
        let mut config = load_from_file(&path)?;
        apply_env_overrides(&mut config)?;
        validate(&config)?;

        Ok(Self {
            config_path: Some(path),
            config,
        })
    }

    /// Create a loader with default configuration (no file).
    ///
    /// Environment overrides are still applied; a malformed override is
    /// ignored here rather than reported.
    pub fn with_defaults() -> Self {
        let mut config = Config::default();
        if apply_env_overrides(&mut config).is_err() || validate(&config).is_err() {
            config = Config::default();
        }

        Self {
            config_path: None,
            config,
        }
    }

    /// Get the loaded configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Consume the loader and return the configuration.
    pub fn into_config(self) -> Config {
        self.config
    }
}

/// Resolve the configuration file path using standard locations.
pub fn resolve_config_path() -> Option<PathBuf> {
    // 1. Explicit environment variable
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
    }

    // 2. Current directory
    let cwd_config = PathBuf::from(LOCAL_CONFIG_FILE_NAME);
    if cwd_config.exists() {
        return Some(cwd_config);
    }

    // 3. XDG config directory (Linux/macOS) or APPDATA (Windows)
    get_default_config_path().filter(|path| path.exists())
}

/// Get the platform-specific config directory.
fn get_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var("APPDATA").ok().map(PathBuf::from)
    }

    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("XDG_CONFIG_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| {
                std::env::var("HOME")
                    .ok()
                    .map(|h| PathBuf::from(h).join(".config"))
            })
    }
}

/// Load configuration from a file.
fn load_from_file(path: &Path) -> ConfigResult<Config> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(format!("{}_{}", ENV_PREFIX, key)).ok()
}

fn parse_env<T: FromStr>(key: &str, value: &str, expected: &'static str) -> ConfigResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| {
            ConfigError::env_override(format!("{}_{}", ENV_PREFIX, key), value, expected)
        })
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "1" | "true" | "yes")
}

/// Apply environment variable overrides to the configuration.
///
/// Environment variables follow the pattern: `SERIAL_SESSION_<SECTION>_<KEY>`
/// For example:
/// - `SERIAL_SESSION_SERIAL_BAUD_RATE=19200`
/// - `SERIAL_SESSION_SERIAL_READ_TIMEOUT_MS=2000`
/// - `SERIAL_SESSION_TESTING_PORT=/dev/ttyACM0`
fn apply_env_overrides(config: &mut Config) -> ConfigResult<()> {
    // Serial overrides
    if let Some(val) = env_var("SERIAL_BAUD_RATE") {
        config.serial.baud_rate = parse_env("SERIAL_BAUD_RATE", &val, "a baud rate")?;
    }
    if let Some(val) = env_var("SERIAL_DATA_BITS") {
        config.serial.data_bits = parse_env("SERIAL_DATA_BITS", &val, "a data bit count")?;
    }
    if let Some(val) = env_var("SERIAL_STOP_BITS") {
        config.serial.stop_bits = parse_env("SERIAL_STOP_BITS", &val, "a stop bit count")?;
    }
    if let Some(val) = env_var("SERIAL_MINIMUM_READ_SIZE") {
        config.serial.minimum_read_size =
            parse_env("SERIAL_MINIMUM_READ_SIZE", &val, "a byte count")?;
    }
    if let Some(val) = env_var("SERIAL_READ_TIMEOUT_MS") {
        // An empty value clears the timeout.
        config.serial.read_timeout_ms = if val.trim().is_empty() {
            None
        } else {
            Some(parse_env("SERIAL_READ_TIMEOUT_MS", &val, "milliseconds")?)
        };
    }
    if let Some(val) = env_var("SERIAL_POLL_INTERVAL_MS") {
        config.serial.poll_interval_ms =
            parse_env("SERIAL_POLL_INTERVAL_MS", &val, "milliseconds")?;
    }

    // Testing overrides (also support the legacy SERIAL_PORT)
    if let Some(val) = env_var("TESTING_PORT").or_else(|| std::env::var("SERIAL_PORT").ok()) {
        config.testing.port = Some(val);
    }
    if let Some(val) = env_var("TESTING_BAUD") {
        config.testing.baud = parse_env("TESTING_BAUD", &val, "a baud rate")?;
    }
    if let Some(val) = env_var("TESTING_TIMEOUT_MS") {
        config.testing.timeout_ms = parse_env("TESTING_TIMEOUT_MS", &val, "milliseconds")?;
    }
    if let Some(val) = env_var("TESTING_SETTLE_MS") {
        config.testing.settle_ms = parse_env("TESTING_SETTLE_MS", &val, "milliseconds")?;
    }
    if let Some(val) = env_var("TESTING_LOOPBACK_ENABLED") {
        config.testing.loopback_enabled = parse_flag(&val);
    }

    // Logging overrides
    if let Some(val) = env_var("LOGGING_LEVEL") {
        config.logging.level = val;
    }
    if let Some(val) = env_var("LOGGING_FORMAT") {
        config.logging.format = match val.trim().to_lowercase().as_str() {
            "json" => LogFormat::Json,
            "pretty" => LogFormat::Pretty,
            "compact" => LogFormat::Compact,
            _ => {
                return Err(ConfigError::env_override(
                    format!("{}_LOGGING_FORMAT", ENV_PREFIX),
                    val,
                    "json, pretty or compact",
                ))
            }
        };
    }

    Ok(())
}

/// Reject values that can never open a port, so they surface at load time
/// rather than on the first open.
fn validate(config: &Config) -> ConfigResult<()> {
    let serial = &config.serial;
    if serial.baud_rate == 0 {
        return Err(ConfigError::invalid("serial.baud_rate", "must be greater than zero"));
    }
    DataBits::try_from(serial.data_bits)
        .map_err(|e| ConfigError::invalid("serial.data_bits", e.to_string()))?;
    StopBits::try_from(serial.stop_bits)
        .map_err(|e| ConfigError::invalid("serial.stop_bits", e.to_string()))?;
    if serial.poll_interval_ms == 0 {
        return Err(ConfigError::invalid(
            "serial.poll_interval_ms",
            "must be greater than zero",
        ));
    }
    if config.testing.baud == 0 {
        return Err(ConfigError::invalid("testing.baud", "must be greater than zero"));
    }
    Ok(())
}

/// Get the default config directory for creating new config files.
pub fn get_default_config_dir() -> Option<PathBuf> {
    get_config_dir().map(|d| d.join(APP_DIR_NAME))
}

/// Get the default config file path for creating new config files.
pub fn get_default_config_path() -> Option<PathBuf> {
    get_default_config_dir().map(|d| d.join(CONFIG_FILE_NAME))
}
