//! The open-session surface: read, write and close.
//!
//! A [`PortSession`] owns the read and write halves of one device. Both
//! halves sit behind their own lock, so one reader thread and one writer
//! thread can share a session through an `Arc` without waiting on each
//! other. Blocked calls wait in slices of the configured poll interval and
//! give up with [`PortError::SessionClosed`] once [`PortSession::close`]
//! runs on another thread.

use super::configurator::{AppliedSettings, NativeHandle};
use super::coordinator::ReadCoordinator;
use super::error::{PortError, PortResult};
use super::options::OpenOptions;
use super::traits::{is_transient, RawPort};
use parking_lot::Mutex;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// An open, exclusively owned serial device.
#[derive(Debug)]
pub struct PortSession {
    options: OpenOptions,
    applied: AppliedSettings,
    reader: Mutex<Option<Box<dyn RawPort>>>,
    writer: Mutex<Option<Box<dyn RawPort>>>,
    closed: AtomicBool,
    coordinator: ReadCoordinator,
}

impl PortSession {
    /// Wrap an already configured handle.
    ///
    /// `options` is kept as the session's configuration and is never changed
    /// afterwards.
    pub fn new(options: OpenOptions, handle: NativeHandle) -> Self {
        let applied = handle.applied();
        let coordinator = ReadCoordinator::new(options.poll_interval);
        Self {
            options,
            applied,
            reader: Mutex::new(Some(handle.reader)),
            writer: Mutex::new(Some(handle.writer)),
            closed: AtomicBool::new(false),
            coordinator,
        }
    }

    /// Get the name/path of the device.
    pub fn name(&self) -> &str {
        &self.options.port_name
    }

    pub fn options(&self) -> &OpenOptions {
        &self.options
    }

    /// Settings the device reported after opening.
    pub fn applied(&self) -> AppliedSettings {
        self.applied
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Write as many bytes as the device accepts in one call.
    ///
    /// The count may be less than `data.len()`; loop to deliver everything.
    /// An empty `data` returns `Ok(0)` without touching the device. A zero
    /// `write_timeout` makes exactly one attempt that does not wait.
    pub fn write(&self, data: &[u8]) -> PortResult<usize> {
        self.ensure_open()?;
        if data.is_empty() {
            return Ok(0);
        }

        let mut guard = self.writer.lock();
        let port = guard.as_mut().ok_or(PortError::SessionClosed)?;
        let poll = self.options.poll_interval;
        let deadline = self
            .options
            .write_timeout
            .and_then(|t| Instant::now().checked_add(t));
        let mut attempted = false;

        loop {
            self.ensure_open()?;
            let wait = match deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() && attempted {
                        return Err(PortError::Io(io::Error::new(
                            io::ErrorKind::TimedOut,
                            "write timed out",
                        )));
                    }
                    remaining.min(poll)
                }
                None => poll,
            };

            attempted = true;
            match port.write_some(data, wait) {
                Ok(0) => {}
                Ok(n) => {
                    debug!(port = self.name(), bytes = n, "wrote");
                    return Ok(n);
                }
                Err(e) if is_transient(&e) => {}
                Err(e) => return Err(PortError::Io(e)),
            }
        }
    }

    /// Write all of `data`, looping over short writes.
    pub fn write_all(&self, mut data: &[u8]) -> PortResult<()> {
        while !data.is_empty() {
            let n = self.write(data)?;
            data = &data[n..];
        }
        Ok(())
    }

    /// Wait until everything written has been transmitted.
    pub fn flush(&self) -> PortResult<()> {
        self.ensure_open()?;
        let mut guard = self.writer.lock();
        let port = guard.as_mut().ok_or(PortError::SessionClosed)?;
        port.flush().map_err(PortError::Io)
    }

    /// Read into `buffer` using the session's minimum read size and read
    /// timeout.
    ///
    /// Returns at most `buffer.len()` bytes, and at least
    /// `min(minimum_read_size, buffer.len())` unless the timeout expires
    /// first. A short count after expiry is a success, not an error.
    pub fn read(&self, buffer: &mut [u8]) -> PortResult<usize> {
        self.read_with(
            buffer,
            self.options.minimum_read_size,
            self.options.read_timeout,
        )
    }

    /// Read `buffer.len()` bytes, giving up after `timeout`.
    ///
    /// Returns the count actually read, which is short only if `timeout`
    /// expired.
    pub fn read_exact_with_timeout(
        &self,
        buffer: &mut [u8],
        timeout: Duration,
    ) -> PortResult<usize> {
        let wanted = buffer.len();
        self.read_with(buffer, wanted, Some(timeout))
    }

    /// Read with an explicit minimum and deadline instead of the session's
    /// configured ones.
    pub fn read_with(
        &self,
        buffer: &mut [u8],
        minimum: usize,
        timeout: Option<Duration>,
    ) -> PortResult<usize> {
        self.ensure_open()?;
        let mut guard = self.reader.lock();
        let port = guard.as_mut().ok_or(PortError::SessionClosed)?;
        let n = self
            .coordinator
            .read(port, buffer, minimum, timeout, &self.closed)?;
        debug!(port = self.name(), bytes = n, minimum, "read");
        Ok(n)
    }

    /// Release the device.
    ///
    /// Reads and writes blocked on other threads fail with
    /// [`PortError::SessionClosed`] within one poll interval. Closing an
    /// already closed session fails with [`PortError::SessionClosed`].
    pub fn close(&self) -> PortResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(PortError::SessionClosed);
        }
        self.release();
        info!(port = self.name(), "serial port closed");
        Ok(())
    }

    fn release(&self) {
        // Each lock is held by a blocked call for at most one poll interval
        // after `closed` is set.
        let reader = self.reader.lock().take();
        let writer = self.writer.lock().take();
        drop(reader);
        drop(writer);
    }

    fn ensure_open(&self) -> PortResult<()> {
        if self.is_closed() {
            Err(PortError::SessionClosed)
        } else {
            Ok(())
        }
    }
}

impl Drop for PortSession {
    fn drop(&mut self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            warn!(port = self.name(), "session dropped without close; releasing device");
            self.release();
        }
    }
}

impl io::Read for &PortSession {
    /// A deadline expiry with nothing read returns `Ok(0)`, which generic
    /// `io::Read` helpers treat as end of stream.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        PortSession::read(*self, buf).map_err(io::Error::from)
    }
}

impl io::Write for &PortSession {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        PortSession::write(*self, buf).map_err(io::Error::from)
    }

    fn flush(&mut self) -> io::Result<()> {
        PortSession::flush(*self).map_err(io::Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::{ErrorKind, MockSerialPort};

    fn session_over(mock: &MockSerialPort, options: OpenOptions) -> PortSession {
        let handle = NativeHandle::from_parts(
            Box::new(mock.clone()),
            Box::new(mock.clone()),
            AppliedSettings::requested(&options),
        );
        PortSession::new(options, handle)
    }

    fn options() -> OpenOptions {
        OpenOptions::new("MOCK0")
            .baud_rate(19200)
            .minimum_read_size(4)
            .read_timeout(Duration::from_secs(2))
            .poll_interval(Duration::from_millis(10))
    }

    #[test]
    fn test_write_then_read_echo() {
        let mock = MockSerialPort::loopback("MOCK0");
        let session = session_over(&mock, options());

        assert_eq!(session.write(b"ping").unwrap(), 4);
        let mut buffer = [0u8; 4];
        assert_eq!(session.read(&mut buffer).unwrap(), 4);
        assert_eq!(&buffer, b"ping");
    }

    #[test]
    fn test_zero_length_write() {
        let mock = MockSerialPort::new("MOCK0");
        let session = session_over(&mock, options());
        assert_eq!(session.write(&[]).unwrap(), 0);
        assert_eq!(mock.write_calls(), 0);
    }

    #[test]
    fn test_short_write_is_reported() {
        let mock = MockSerialPort::new("MOCK0");
        mock.set_write_chunk_size(Some(3));
        let session = session_over(&mock, options());

        assert_eq!(session.write(b"abcdefgh").unwrap(), 3);
        session.write_all(b"abcdefgh").unwrap();
        assert_eq!(mock.written_bytes(), b"abcabcdefgh");
    }

    #[test]
    fn test_close_twice() {
        let mock = MockSerialPort::new("MOCK0");
        let session = session_over(&mock, options());

        assert!(session.close().is_ok());
        let err = session.close().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SessionClosed);
    }

    #[test]
    fn test_close_releases_device() {
        let mock = MockSerialPort::new("MOCK0");
        let session = session_over(&mock, options());
        assert_eq!(mock.handle_count(), 3);

        session.close().unwrap();
        assert_eq!(mock.handle_count(), 1);
    }

    #[test]
    fn test_calls_after_close_fail() {
        let mock = MockSerialPort::new("MOCK0");
        let session = session_over(&mock, options());
        session.close().unwrap();

        assert!(matches!(session.write(b"x"), Err(PortError::SessionClosed)));
        assert!(matches!(
            session.read(&mut [0u8; 4]),
            Err(PortError::SessionClosed)
        ));
    }

    #[test]
    fn test_drop_releases_device() {
        let mock = MockSerialPort::new("MOCK0");
        let session = session_over(&mock, options());
        drop(session);
        assert_eq!(mock.handle_count(), 1);
    }

    #[test]
    fn test_write_timeout() {
        let mock = MockSerialPort::new("MOCK0");
        mock.set_stall_writes(true);
        let session = session_over(&mock, options().write_timeout(Duration::from_millis(40)));

        let err = session.write(b"data").unwrap_err();
        match err {
            PortError::Io(e) => assert_eq!(e.kind(), io::ErrorKind::TimedOut),
            other => panic!("expected timed out write, got {other:?}"),
        }
    }

    #[test]
    fn test_zero_write_timeout_attempts_once() {
        let mock = MockSerialPort::loopback("MOCK0");
        let session = session_over(&mock, options().write_timeout(Duration::ZERO));

        assert_eq!(session.write(b"x").unwrap(), 1);
        assert_eq!(mock.write_calls(), 1);
        assert_eq!(mock.written_bytes(), b"x");
    }

    #[test]
    fn test_zero_write_timeout_on_stalled_device() {
        let mock = MockSerialPort::new("MOCK0");
        mock.set_stall_writes(true);
        let session = session_over(&mock, options().write_timeout(Duration::ZERO));

        match session.write(b"x").unwrap_err() {
            PortError::Io(e) => assert_eq!(e.kind(), io::ErrorKind::TimedOut),
            other => panic!("expected timed out write, got {other:?}"),
        }
        assert_eq!(mock.write_calls(), 1);
    }

    #[test]
    fn test_flush_reaches_device() {
        use std::io::Write;

        let mock = MockSerialPort::new("MOCK0");
        let session = session_over(&mock, options());
        session.write_all(b"abc").unwrap();
        session.flush().unwrap();
        (&session).flush().unwrap();
        assert_eq!(mock.flush_calls(), 2);

        session.close().unwrap();
        assert!(matches!(session.flush(), Err(PortError::SessionClosed)));
    }

    #[test]
    fn test_disconnect_surfaces_io_error() {
        let mock = MockSerialPort::new("MOCK0");
        let session = session_over(&mock, options());
        mock.disconnect();

        assert_eq!(session.write(b"x").unwrap_err().kind(), ErrorKind::Io);
        assert_eq!(
            session.read(&mut [0u8; 4]).unwrap_err().kind(),
            ErrorKind::Io
        );
    }

    #[test]
    fn test_io_traits() {
        use std::io::{Read, Write};

        let mock = MockSerialPort::loopback("MOCK0");
        let session = session_over(&mock, options());
        (&session).write_all(b"abcd").unwrap();
        let mut buffer = [0u8; 4];
        (&session).read_exact(&mut buffer).unwrap();
        assert_eq!(&buffer, b"abcd");
    }

    #[test]
    fn test_options_are_kept() {
        let mock = MockSerialPort::new("MOCK0");
        let session = session_over(&mock, options());
        assert_eq!(session.name(), "MOCK0");
        assert_eq!(session.options().baud_rate, 19200);
        assert_eq!(session.applied().baud_rate, 19200);
        assert!(!session.is_closed());
    }
}
