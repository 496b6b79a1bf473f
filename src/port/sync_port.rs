//! Synchronous serial port implementation.
//!
//! Wraps a `serialport::SerialPort` handle as a [`RawPort`]. The per-call
//! `wait` is applied through the handle's timeout, which is only
//! reprogrammed when it changes.

use super::traits::RawPort;
use std::io::{self, Read, Write};
use std::time::Duration;

/// One direction of an open native serial handle.
pub struct SyncSerialPort {
    /// The underlying serial port implementation.
    port: Box<dyn serialport::SerialPort>,
    /// The port name/path for identification.
    name: String,
    /// Timeout currently programmed on `port`.
    timeout: Option<Duration>,
}

impl SyncSerialPort {
    pub(crate) fn new(port: Box<dyn serialport::SerialPort>, name: impl Into<String>) -> Self {
        Self {
            port,
            name: name.into(),
            timeout: None,
        }
    }

    /// Duplicate the native handle so reads and writes can proceed from
    /// different threads.
    pub(crate) fn try_clone(&self) -> serialport::Result<Self> {
        Ok(Self::new(self.port.try_clone()?, self.name.clone()))
    }

    /// Get a reference to the underlying serialport implementation.
    ///
    /// This can be useful for accessing platform-specific features.
    pub fn as_raw(&self) -> &dyn serialport::SerialPort {
        &*self.port
    }

    fn apply_timeout(&mut self, wait: Duration) -> io::Result<()> {
        if self.timeout != Some(wait) {
            self.port.set_timeout(wait).map_err(io::Error::from)?;
            self.timeout = Some(wait);
        }
        Ok(())
    }
}

impl RawPort for SyncSerialPort {
    fn read_some(&mut self, buffer: &mut [u8], wait: Duration) -> io::Result<usize> {
        self.apply_timeout(wait)?;
        self.port.read(buffer)
    }

    fn write_some(&mut self, data: &[u8], wait: Duration) -> io::Result<usize> {
        self.apply_timeout(wait)?;
        self.port.write(data)
    }

    fn flush(&mut self) -> io::Result<()> {
        // tcdrain on Unix, FlushFileBuffers on Windows
        self.port.flush()
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for SyncSerialPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncSerialPort")
            .field("name", &self.name)
            .field("baud_rate", &self.port.baud_rate().ok())
            .finish()
    }
}
