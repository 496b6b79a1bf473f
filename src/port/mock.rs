//! Mock serial port implementation for testing.
//!
//! Provides a `MockSerialPort` that simulates serial device behavior without
//! requiring actual hardware. Clones share one simulated device, so a clone
//! can serve as the reader half and another as the writer half of a session.
//!
//! The mock runs on real time by default: an empty read blocks on a condition
//! variable for up to its `wait`, and a write from another thread (in
//! loopback mode) wakes it. Attach a [`ManualClock`] with
//! [`MockSerialPort::with_clock`] to make waits advance the clock instead of
//! sleeping.

use super::traits::{Clock, RawPort};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.offset.lock() += by;
    }

    /// Time elapsed since the clock was created.
    pub fn elapsed(&self) -> Duration {
        *self.offset.lock()
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + *self.offset.lock()
    }
}

/// Inner state of the simulated device.
#[derive(Debug, Default)]
struct MockPortState {
    /// Bytes ready to be returned by read operations.
    read_queue: VecDeque<u8>,
    /// Bytes that become readable at a later instant, ordered by release time.
    scheduled: Vec<(Instant, Vec<u8>)>,
    /// Log of all bytes accepted by write operations, one entry per call.
    write_log: Vec<Vec<u8>>,
    /// Written bytes are fed back into the read queue.
    loopback: bool,
    /// Applied to each looped-back byte.
    transform: Option<fn(u8) -> u8>,
    /// Maximum bytes handed out per read call.
    chunk_size: Option<usize>,
    /// Maximum bytes accepted per write call.
    write_chunk_size: Option<usize>,
    /// Number of read calls left before the injected error fires.
    read_fault: Option<(usize, io::ErrorKind)>,
    write_fault: Option<io::ErrorKind>,
    /// Writes accept nothing and time out, like a device with a full buffer.
    stall_writes: bool,
    disconnected: bool,
    read_calls: usize,
    write_calls: usize,
    flush_calls: usize,
}

impl MockPortState {
    fn release_due(&mut self, now: Instant) {
        while let Some((at, _)) = self.scheduled.first() {
            if *at > now {
                break;
            }
            let (_, data) = self.scheduled.remove(0);
            self.read_queue.extend(data);
        }
    }

    fn take_read_fault(&mut self) -> Option<io::ErrorKind> {
        match self.read_fault.as_mut() {
            Some((0, kind)) => {
                let kind = *kind;
                self.read_fault = None;
                Some(kind)
            }
            Some((remaining, _)) => {
                *remaining -= 1;
                None
            }
            None => None,
        }
    }
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<MockPortState>,
    data_ready: Condvar,
}

/// Mock serial port implementation for testing.
///
/// This implementation allows you to:
/// - Enqueue data to be returned by read operations, now or later
/// - Inspect what data was written
/// - Act as a loopback or increment-and-echo peer
/// - Split reads into small chunks
/// - Simulate I/O errors, stalled writes and disconnects
///
/// # Example
/// ```
/// use serial_session::port::{MockSerialPort, RawPort};
/// use std::time::Duration;
///
/// let mut port = MockSerialPort::new("MOCK0");
/// port.enqueue_read(b"Hello, World!");
///
/// let mut buffer = [0u8; 13];
/// let n = port.read_some(&mut buffer, Duration::ZERO).unwrap();
/// assert_eq!(&buffer[..n], b"Hello, World!");
///
/// port.write_some(b"Response", Duration::ZERO).unwrap();
/// assert_eq!(port.get_write_log(), vec![b"Response".to_vec()]);
/// ```
#[derive(Clone)]
pub struct MockSerialPort {
    name: String,
    shared: Arc<Shared>,
    clock: Option<Arc<ManualClock>>,
}

impl MockSerialPort {
    /// Create a new mock serial port with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            shared: Arc::new(Shared::default()),
            clock: None,
        }
    }

    /// A mock whose writes come straight back as reads.
    pub fn loopback(name: impl Into<String>) -> Self {
        let port = Self::new(name);
        port.shared.state.lock().loopback = true;
        port
    }

    /// A mock that echoes every written byte incremented by one, wrapping
    /// at 0xFF.
    pub fn increment_echo(name: impl Into<String>) -> Self {
        let port = Self::loopback(name);
        port.set_transform(Some(increment as fn(u8) -> u8));
        port
    }

    /// Drive waits from `clock` instead of sleeping.
    pub fn with_clock(mut self, clock: Arc<ManualClock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Enqueue bytes to be returned by subsequent read operations.
    pub fn enqueue_read(&self, data: &[u8]) {
        self.shared.state.lock().read_queue.extend(data);
        self.shared.data_ready.notify_all();
    }

    /// Make `data` readable once `delay` has passed.
    pub fn enqueue_read_after(&self, delay: Duration, data: &[u8]) {
        let at = self.now() + delay;
        let mut state = self.shared.state.lock();
        let index = state.scheduled.partition_point(|(t, _)| *t <= at);
        state.scheduled.insert(index, (at, data.to_vec()));
        drop(state);
        self.shared.data_ready.notify_all();
    }

    pub fn set_transform(&self, transform: Option<fn(u8) -> u8>) {
        self.shared.state.lock().transform = transform;
    }

    /// Limit how many bytes a single read call returns.
    pub fn set_chunk_size(&self, chunk: Option<usize>) {
        self.shared.state.lock().chunk_size = chunk.map(|c| c.max(1));
    }

    /// Limit how many bytes a single write call accepts.
    pub fn set_write_chunk_size(&self, chunk: Option<usize>) {
        self.shared.state.lock().write_chunk_size = chunk.map(|c| c.max(1));
    }

    /// Fail the read call that follows `calls` further read calls.
    pub fn fail_read_after(&self, calls: usize, kind: io::ErrorKind) {
        self.shared.state.lock().read_fault = Some((calls, kind));
    }

    /// Fail the next write call.
    pub fn fail_next_write(&self, kind: io::ErrorKind) {
        self.shared.state.lock().write_fault = Some(kind);
    }

    pub fn set_stall_writes(&self, stall: bool) {
        self.shared.state.lock().stall_writes = stall;
    }

    /// Simulate the device going away. Every later call fails with
    /// `BrokenPipe` and blocked reads wake up.
    pub fn disconnect(&self) {
        self.shared.state.lock().disconnected = true;
        self.shared.data_ready.notify_all();
    }

    /// Get a copy of all data written to the port.
    pub fn get_write_log(&self) -> Vec<Vec<u8>> {
        self.shared.state.lock().write_log.clone()
    }

    /// All written bytes, concatenated.
    pub fn written_bytes(&self) -> Vec<u8> {
        self.shared.state.lock().write_log.concat()
    }

    /// Clear the write log.
    pub fn clear_write_log(&self) {
        self.shared.state.lock().write_log.clear();
    }

    /// Get the number of bytes available to read right now.
    pub fn available_bytes(&self) -> usize {
        self.shared.state.lock().read_queue.len()
    }

    pub fn read_calls(&self) -> usize {
        self.shared.state.lock().read_calls
    }

    pub fn write_calls(&self) -> usize {
        self.shared.state.lock().write_calls
    }

    /// Number of live handles (clones) on this simulated device.
    pub fn flush_calls(&self) -> usize {
        self.shared.state.lock().flush_calls
    }

    pub fn handle_count(&self) -> usize {
        Arc::strong_count(&self.shared)
    }

    fn now(&self) -> Instant {
        match &self.clock {
            Some(clock) => clock.now(),
            None => Instant::now(),
        }
    }

    fn deadline_after(&self, wait: Duration) -> Instant {
        let now = self.now();
        now.checked_add(wait)
            .unwrap_or_else(|| now + Duration::from_secs(365 * 24 * 3600))
    }

    /// Block until `deadline` or until the state changes. Returns false once
    /// the deadline has passed.
    fn wait_until(
        &self,
        state: &mut parking_lot::MutexGuard<'_, MockPortState>,
        deadline: Instant,
    ) -> bool {
        let now = self.now();
        let next_release = state.scheduled.first().map(|(at, _)| *at);

        match &self.clock {
            Some(clock) => {
                let target = next_release
                    .filter(|at| *at <= deadline)
                    .unwrap_or(deadline);
                if target > now {
                    clock.advance(target - now);
                }
                next_release.map_or(false, |at| at <= deadline)
            }
            None => {
                if now >= deadline {
                    return false;
                }
                let until = next_release.map_or(deadline, |at| at.min(deadline));
                self.shared
                    .data_ready
                    .wait_for(state, until.saturating_duration_since(now));
                true
            }
        }
    }
}

fn increment(byte: u8) -> u8 {
    byte.wrapping_add(1)
}

impl RawPort for MockSerialPort {
    fn read_some(&mut self, buffer: &mut [u8], wait: Duration) -> io::Result<usize> {
        let deadline = self.deadline_after(wait);
        let mut state = self.shared.state.lock();
        state.read_calls += 1;

        if let Some(kind) = state.take_read_fault() {
            return Err(io::Error::new(kind, "injected read failure"));
        }

        loop {
            if state.disconnected {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "device disconnected"));
            }
            let now = self.now();
            state.release_due(now);

            if !state.read_queue.is_empty() {
                let limit = state.chunk_size.unwrap_or(usize::MAX);
                let n = buffer.len().min(limit).min(state.read_queue.len());
                for (slot, byte) in buffer.iter_mut().zip(state.read_queue.drain(..n)) {
                    *slot = byte;
                }
                return Ok(n);
            }

            if !self.wait_until(&mut state, deadline) {
                return Err(io::Error::new(io::ErrorKind::TimedOut, "no data available"));
            }
        }
    }

    fn write_some(&mut self, data: &[u8], wait: Duration) -> io::Result<usize> {
        let mut state = self.shared.state.lock();
        state.write_calls += 1;

        if let Some(kind) = state.write_fault.take() {
            return Err(io::Error::new(kind, "injected write failure"));
        }
        if state.disconnected {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "device disconnected"));
        }
        if state.stall_writes {
            match &self.clock {
                Some(clock) => clock.advance(wait),
                None => {
                    self.shared.data_ready.wait_for(&mut state, wait);
                }
            }
            return Err(io::Error::new(io::ErrorKind::TimedOut, "device not accepting data"));
        }

        let limit = state.write_chunk_size.unwrap_or(usize::MAX);
        let accepted = &data[..data.len().min(limit)];
        state.write_log.push(accepted.to_vec());

        if state.loopback {
            let transform = state.transform;
            state
                .read_queue
                .extend(accepted.iter().map(|&b| transform.map_or(b, |f| f(b))));
            drop(state);
            self.shared.data_ready.notify_all();
        }

        Ok(accepted.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut state = self.shared.state.lock();
        state.flush_calls += 1;
        if state.disconnected {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "device disconnected"));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for MockSerialPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockSerialPort")
            .field("name", &self.name)
            .field("available_bytes", &self.available_bytes())
            .finish()
    }
}
