//! Minimum-read-size and deadline handling for reads.
//!
//! Serial read primitives hand back whatever happens to be buffered, so one
//! call rarely yields the amount a caller asked for. [`ReadCoordinator`]
//! accumulates across calls until the minimum is met or the deadline passes.
//! It waits in slices of at most `poll_interval` and checks the session's
//! closed flag between slices, which bounds how long a concurrent close
//! takes to unblock a reader.

use super::error::{PortError, PortResult};
use super::traits::{is_transient, Clock, RawPort, SystemClock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::trace;

/// Implements "read at least N bytes, or give up at the deadline".
#[derive(Debug, Clone)]
pub struct ReadCoordinator<C = SystemClock> {
    clock: C,
    poll_interval: Duration,
}

impl ReadCoordinator<SystemClock> {
    pub fn new(poll_interval: Duration) -> Self {
        Self::with_clock(SystemClock, poll_interval)
    }
}

impl<C: Clock> ReadCoordinator<C> {
    pub fn with_clock(clock: C, poll_interval: Duration) -> Self {
        Self {
            clock,
            poll_interval,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Read into `buffer` until at least `min(minimum, buffer.len())` bytes
    /// have arrived or `timeout` elapses.
    ///
    /// Expiry of `timeout` is not an error; the count read so far (possibly
    /// zero) is returned. With `minimum == 0` and no positive timeout the
    /// device is polled once without waiting. With `minimum == 0` and a
    /// positive timeout the read returns as soon as one byte arrives.
    ///
    /// On a hard I/O error the accumulated count is discarded. Bytes already
    /// copied into `buffer` stay there but must be treated as undefined.
    /// Once `closed` is set, the read fails with [`PortError::SessionClosed`]
    /// within one poll interval.
    pub fn read<P>(
        &self,
        port: &mut P,
        buffer: &mut [u8],
        minimum: usize,
        timeout: Option<Duration>,
        closed: &AtomicBool,
    ) -> PortResult<usize>
    where
        P: RawPort + ?Sized,
    {
        if closed.load(Ordering::Acquire) {
            return Err(PortError::SessionClosed);
        }
        if buffer.is_empty() {
            return Ok(0);
        }

        let poll_only = minimum == 0 && timeout.map_or(true, |t| t.is_zero());
        if poll_only {
            return match port.read_some(buffer, Duration::ZERO) {
                Ok(n) => Ok(n),
                Err(e) if is_transient(&e) => Ok(0),
                Err(e) => Err(PortError::Io(e)),
            };
        }

        let target = minimum.clamp(1, buffer.len());
        // A timeout too large to represent is the same as none.
        let deadline = timeout.and_then(|t| self.clock.now().checked_add(t));
        let mut filled = 0;
        let mut attempted = false;

        loop {
            if closed.load(Ordering::Acquire) {
                return Err(PortError::SessionClosed);
            }

            let wait = match deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(self.clock.now());
                    if remaining.is_zero() && attempted {
                        trace!(filled, target, "read deadline expired");
                        return Ok(filled);
                    }
                    remaining.min(self.poll_interval)
                }
                None => self.poll_interval,
            };

            attempted = true;
            match port.read_some(&mut buffer[filled..], wait) {
                Ok(n) => {
                    filled += n;
                    if filled >= target {
                        return Ok(filled);
                    }
                }
                Err(e) if is_transient(&e) => {}
                Err(e) => return Err(PortError::Io(e)),
            }
        }
    }
}
