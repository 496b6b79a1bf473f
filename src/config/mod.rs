//! Configuration module for serial-session.
//!
//! TOML-based defaults for opening ports, hardware-test settings and logging,
//! with environment variable overrides.
//!
//! # Configuration Resolution
//!
//! Configuration is loaded from the first of these that exists:
//!
//! 1. `SERIAL_SESSION_CONFIG` environment variable (explicit path)
//! 2. `./serial-session.toml` (current directory)
//! 3. `~/.config/serial-session/config.toml` (XDG on Linux/macOS)
//! 4. `%APPDATA%\serial-session\config.toml` (Windows)
//! 5. Built-in defaults (no file required)
//!
//! # Environment Overrides
//!
//! The pattern is `SERIAL_SESSION_<SECTION>_<KEY>`, for example
//! `SERIAL_SESSION_SERIAL_BAUD_RATE=19200` or
//! `SERIAL_SESSION_LOGGING_LEVEL=debug`. The legacy `SERIAL_PORT` variable
//! selects the hardware test port.
//!
//! # Example
//!
//! ```rust,no_run
//! use serial_session::config::ConfigLoader;
//!
//! let loader = ConfigLoader::load()?;
//! let options = loader.config().serial.open_options("arduino");
//! println!("opening {} at {} baud", options.port_name, options.baud_rate);
//! # Ok::<(), serial_session::config::ConfigError>(())
//! ```

mod error;
mod loader;
mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{
    get_default_config_dir, get_default_config_path, resolve_config_path, ConfigLoader,
};
pub use schema::{Config, LogFormat, LoggingConfig, SerialDefaults, TestingConfig};
