//! Port-specific error types.
//!
//! One error enum covers both open-time configuration failures and runtime
//! I/O failures on an open session. [`PortError::kind`] gives the coarse
//! category callers usually branch on.

use std::io;
use thiserror::Error;

/// Errors that can occur while opening or using a serial port.
#[derive(Debug, Error)]
pub enum PortError {
    /// Malformed configuration, such as an empty port name.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A configuration value this platform or device does not support.
    #[error("Unsupported {field}: {value}")]
    UnsupportedParameter { field: &'static str, value: String },

    /// The device does not exist or is held by someone else.
    #[error("Serial port {port} is unavailable: {reason}")]
    DeviceUnavailable { port: String, reason: String },

    /// The OS refused access to the device.
    #[error("Permission denied opening serial port: {0}")]
    PermissionDenied(String),

    /// A runtime I/O error on an open session.
    ///
    /// Any partial byte count that accompanied the failure is undefined.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The session was already closed.
    #[error("Session is closed")]
    SessionClosed,
}

/// Coarse classification of a [`PortError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidArgument,
    UnsupportedParameter,
    DeviceUnavailable,
    PermissionDenied,
    Io,
    SessionClosed,
}

/// Result type for port operations.
pub type PortResult<T> = Result<T, PortError>;

impl PortError {
    /// Create an InvalidArgument error from a message.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Create an UnsupportedParameter error naming the offending field.
    pub fn unsupported(field: &'static str, value: impl ToString) -> Self {
        Self::UnsupportedParameter {
            field,
            value: value.to_string(),
        }
    }

    /// Create a DeviceUnavailable error.
    pub fn unavailable(port: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DeviceUnavailable {
            port: port.into(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::UnsupportedParameter { .. } => ErrorKind::UnsupportedParameter,
            Self::DeviceUnavailable { .. } => ErrorKind::DeviceUnavailable,
            Self::PermissionDenied(_) => ErrorKind::PermissionDenied,
            Self::Io(_) => ErrorKind::Io,
            Self::SessionClosed => ErrorKind::SessionClosed,
        }
    }

    /// Whether this error was raised while acquiring or configuring a device,
    /// as opposed to during use of an open session.
    pub fn is_open_failure(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::InvalidArgument
                | ErrorKind::UnsupportedParameter
                | ErrorKind::DeviceUnavailable
                | ErrorKind::PermissionDenied
        )
    }

    /// Map a `serialport` open error onto the port taxonomy.
    pub(crate) fn from_open(port: &str, err: serialport::Error) -> Self {
        match err.kind() {
            serialport::ErrorKind::NoDevice => Self::unavailable(port, err.to_string()),
            serialport::ErrorKind::InvalidInput => {
                Self::unsupported("device settings", err.to_string())
            }
            // serialport keeps only the io kind, so EBUSY survives as text.
            serialport::ErrorKind::Io(_) if err.description.to_lowercase().contains("busy") => {
                Self::unavailable(port, err.description)
            }
            serialport::ErrorKind::Io(kind) => {
                Self::from_open_io(port, io::Error::new(kind, err.description))
            }
            serialport::ErrorKind::Unknown => Self::Io(io::Error::other(err.description)),
        }
    }

    pub(crate) fn from_open_io(port: &str, err: io::Error) -> Self {
        if is_busy(&err) {
            return Self::unavailable(port, "device or resource busy");
        }
        match err.kind() {
            io::ErrorKind::NotFound => Self::unavailable(port, err.to_string()),
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(port.to_string()),
            _ => Self::Io(err),
        }
    }
}

impl From<PortError> for io::Error {
    fn from(err: PortError) -> Self {
        let kind = match &err {
            PortError::SessionClosed => io::ErrorKind::NotConnected,
            PortError::PermissionDenied(_) => io::ErrorKind::PermissionDenied,
            PortError::DeviceUnavailable { .. } => io::ErrorKind::NotFound,
            _ => io::ErrorKind::InvalidInput,
        };
        match err {
            PortError::Io(e) => e,
            other => io::Error::new(kind, other),
        }
    }
}

#[cfg(unix)]
fn is_busy(err: &io::Error) -> bool {
    // EBUSY on Linux and macOS
    err.raw_os_error() == Some(16)
}

#[cfg(not(unix))]
fn is_busy(err: &io::Error) -> bool {
    // Windows reports a COM port held by another handle as ERROR_ACCESS_DENIED.
    err.raw_os_error() == Some(5)
}
