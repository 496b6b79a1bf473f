//! Cross-platform serial port sessions.
//!
//! Open a device with [`open`], exchange bytes through the returned
//! [`PortSession`], and release it with [`PortSession::close`]. [`list`]
//! reports the devices currently visible.
//!
//! ```rust,no_run
//! use serial_session::OpenOptions;
//! use std::time::Duration;
//!
//! let session = serial_session::open(
//!     OpenOptions::new("/dev/ttyACM0")
//!         .baud_rate(19200)
//!         .minimum_read_size(4)
//!         .read_timeout(Duration::from_secs(2)),
//! )?;
//! session.write_all(&[0x00, 0x17, 0xFE, 0xFF])?;
//! let mut reply = [0u8; 4];
//! let n = session.read(&mut reply)?;
//! println!("{:02X?}", &reply[..n]);
//! session.close()?;
//! # Ok::<(), serial_session::PortError>(())
//! ```
//!
//! # Modules
//!
//! - `port`: configuration, read coordination, sessions and enumeration
//! - `config`: TOML defaults and environment overrides

pub mod config;
pub mod port;

// Re-export commonly used types for convenience
pub use port::{
    configure, DataBits, ErrorKind, FlowControl, MockSerialPort, NativeHandle, OpenOptions,
    Parity, PortDescriptor, PortEnumerator, PortError, PortKind, PortResult, PortSession,
    StopBits, SystemEnumerator,
};

// Re-export config types
pub use config::{Config, ConfigError, ConfigLoader, ConfigResult};

/// Open and configure a device, returning an exclusively owned session.
///
/// # Errors
/// See [`configure`]; nothing is left open when this fails.
pub fn open(options: OpenOptions) -> PortResult<PortSession> {
    let handle = configure(&options)?;
    Ok(PortSession::new(options, handle))
}

/// Devices currently visible to the platform backend.
pub fn list() -> Vec<PortDescriptor> {
    SystemEnumerator.list()
}
