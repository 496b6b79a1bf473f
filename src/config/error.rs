//! Errors raised while loading configuration.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Why a configuration could not be loaded.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("config file {} is not valid: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// A `SERIAL_SESSION_*` variable that does not parse as its key's type.
    #[error("{var}={value:?} is not valid: expected {expected}")]
    EnvOverride {
        var: String,
        value: String,
        expected: &'static str,
    },

    /// A value that parsed but can never open a port.
    #[error("invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

impl ConfigError {
    pub fn env_override(
        var: impl Into<String>,
        value: impl Into<String>,
        expected: &'static str,
    ) -> Self {
        Self::EnvOverride {
            var: var.into(),
            value: value.into(),
            expected,
        }
    }

    pub fn invalid(key: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            message: message.into(),
        }
    }
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_override_message_names_variable() {
        let err =
            ConfigError::env_override("SERIAL_SESSION_SERIAL_BAUD_RATE", "fast", "a baud rate");
        assert_eq!(
            err.to_string(),
            "SERIAL_SESSION_SERIAL_BAUD_RATE=\"fast\" is not valid: expected a baud rate"
        );
    }

    #[test]
    fn test_invalid_message_names_key() {
        let err = ConfigError::invalid("serial.data_bits", "9 is not 5, 6, 7 or 8");
        assert_eq!(
            err.to_string(),
            "invalid value for serial.data_bits: 9 is not 5, 6, 7 or 8"
        );
    }
}
