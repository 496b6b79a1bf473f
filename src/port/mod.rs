//! Port abstraction layer for serial communication.
//!
//! Leaves first: [`enumerate`] lists devices, [`configurator`] opens and
//! configures one, [`session`] exposes the open handle, and [`coordinator`]
//! implements the minimum-read-size and deadline policy sessions read with.
//! [`traits`] holds the seams that let [`mock`] stand in for hardware.

pub mod configurator;
pub mod coordinator;
pub mod enumerate;
pub mod error;
pub mod mock;
pub mod options;
pub mod session;
pub mod sync_port;
pub mod traits;

pub use configurator::{configure, AppliedSettings, NativeHandle};
pub use coordinator::ReadCoordinator;
pub use enumerate::{
    collect_probed, FixedEnumerator, PortDescriptor, PortEnumerator, PortKind, SystemEnumerator,
};
pub use error::{ErrorKind, PortError, PortResult};
pub use mock::{ManualClock, MockSerialPort};
pub use options::{
    is_supported_baud_rate, DataBits, FlowControl, OpenOptions, Parity, StopBits,
    DEFAULT_BAUD_RATE, DEFAULT_POLL_INTERVAL,
};
pub use session::PortSession;
pub use sync_port::SyncSerialPort;
pub use traits::{is_transient, Clock, RawPort, SystemClock};
