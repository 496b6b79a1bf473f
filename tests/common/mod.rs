//! Shared test utilities for serial-session integration tests.
//!
//! Builds sessions over [`MockSerialPort`] so the session surface can be
//! exercised without hardware.

#![allow(dead_code)]

use serial_session::port::{AppliedSettings, MockSerialPort, NativeHandle};
use serial_session::{OpenOptions, PortSession};
use std::time::Duration;

/// Poll interval used by test sessions; short so close is noticed quickly.
pub const TEST_POLL: Duration = Duration::from_millis(10);

/// Wrap clones of `mock` as the read and write halves of a session.
pub fn session_over_mock(mock: &MockSerialPort, options: OpenOptions) -> PortSession {
    let handle = NativeHandle::from_parts(
        Box::new(mock.clone()),
        Box::new(mock.clone()),
        AppliedSettings::requested(&options),
    );
    PortSession::new(options, handle)
}

/// Builder for the options the integration tests open mocks with.
pub struct OptionsBuilder {
    options: OpenOptions,
}

impl OptionsBuilder {
    pub fn new(port_name: &str) -> Self {
        Self {
            options: OpenOptions::new(port_name)
                .baud_rate(19200)
                .poll_interval(TEST_POLL),
        }
    }

    pub fn minimum(mut self, bytes: usize) -> Self {
        self.options = self.options.minimum_read_size(bytes);
        self
    }

    pub fn timeout_ms(mut self, ms: u64) -> Self {
        self.options = self.options.read_timeout(Duration::from_millis(ms));
        self
    }

    pub fn build(self) -> OpenOptions {
        self.options
    }
}

/// Options for the classic 4-byte exchange: 19200 baud, wait for 4 bytes,
/// two-second guard.
pub fn four_byte_exchange(port_name: &str) -> OpenOptions {
    OptionsBuilder::new(port_name).minimum(4).timeout_ms(2000).build()
}
