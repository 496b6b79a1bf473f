//! Core traits for serial port abstraction.
//!
//! [`RawPort`] is the OS read/write primitive a session drives. Real ports
//! and [`MockSerialPort`](super::MockSerialPort) both implement it, so the
//! read coordination and session logic never need hardware to be tested.
//! [`Clock`] lets the coordinator's deadline arithmetic run on a fake clock.

use std::io;
use std::time::{Duration, Instant};

/// Trait for the raw, single-call serial I/O primitive.
///
/// Each call waits at most `wait` for the device. A call that sees no data
/// (or no room to write) within `wait` returns an error of kind
/// [`io::ErrorKind::TimedOut`] or [`io::ErrorKind::WouldBlock`]; callers
/// treat those as "nothing yet", not as failures. Short transfers are the
/// normal case for serial devices.
pub trait RawPort: Send + std::fmt::Debug {
    /// Read whatever is available into `buffer`, waiting up to `wait` for
    /// the first byte.
    fn read_some(&mut self, buffer: &mut [u8], wait: Duration) -> io::Result<usize>;

    /// Write as much of `data` as the device accepts in one call, waiting
    /// up to `wait` for room.
    fn write_some(&mut self, data: &[u8], wait: Duration) -> io::Result<usize>;

    /// Block until everything written so far has left the transmit buffer.
    fn flush(&mut self) -> io::Result<()>;

    /// Get the name/path of this serial port.
    fn name(&self) -> &str;
}

impl<P: RawPort + ?Sized> RawPort for Box<P> {
    fn read_some(&mut self, buffer: &mut [u8], wait: Duration) -> io::Result<usize> {
        (**self).read_some(buffer, wait)
    }

    fn write_some(&mut self, data: &[u8], wait: Duration) -> io::Result<usize> {
        (**self).write_some(data, wait)
    }

    fn flush(&mut self) -> io::Result<()> {
        (**self).flush()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Whether an error from a [`RawPort`] call only means "try again".
pub fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}

/// Source of the current time for deadline tracking.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall clock backed by [`Instant::now`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

impl<C: Clock + ?Sized> Clock for std::sync::Arc<C> {
    fn now(&self) -> Instant {
        (**self).now()
    }
}
