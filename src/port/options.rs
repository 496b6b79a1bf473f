//! Open-time configuration for a serial port.
//!
//! [`OpenOptions`] is a plain value: build it, hand it to
//! [`crate::port::configure`] or [`crate::open`], and the session keeps its
//! own copy. Nothing mutates it after that.

use super::error::{PortError, PortResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default baud rate used by [`OpenOptions::new`].
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Default slice length the read/write loops wait for before re-checking
/// the session state.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Baud rates every POSIX termios implementation understands.
const STANDARD_BAUD_RATES: &[u32] = &[
    50, 75, 110, 134, 150, 200, 300, 600, 1200, 1800, 2400, 4800, 9600, 19200, 38400, 57600,
    115200, 230400,
];

/// Additional rates Linux exposes through `termios2`.
#[cfg(target_os = "linux")]
const EXTENDED_BAUD_RATES: &[u32] = &[
    460800, 500000, 576000, 921600, 1000000, 1152000, 1500000, 2000000, 2500000, 3000000,
    3500000, 4000000,
];

/// Configuration used to open a serial port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenOptions {
    /// Device identifier, e.g. `/dev/ttyUSB0` or `COM3`.
    pub port_name: String,

    /// Baud rate (bits per second).
    pub baud_rate: u32,

    /// Number of data bits per character (5, 6, 7 or 8).
    pub data_bits: u8,

    /// Number of stop bits (1 or 2).
    pub stop_bits: u8,

    /// Parity checking mode.
    #[serde(default)]
    pub parity: Parity,

    /// Flow control mode.
    #[serde(default)]
    pub flow_control: FlowControl,

    /// Bytes a read blocks for before returning, capped at the buffer length.
    #[serde(default)]
    pub minimum_read_size: usize,

    /// Upper bound on how long a read waits for `minimum_read_size` bytes.
    ///
    /// `None` means wait indefinitely. Expiry is not an error: the read
    /// returns whatever arrived.
    #[serde(default, with = "duration_ms")]
    pub read_timeout: Option<Duration>,

    /// Upper bound on how long a write waits for the device to accept data.
    #[serde(default, with = "duration_ms")]
    pub write_timeout: Option<Duration>,

    /// How often blocked reads and writes re-check for a concurrent close.
    #[serde(default = "default_poll_interval", with = "duration_ms_required")]
    pub poll_interval: Duration,
}

fn default_poll_interval() -> Duration {
    DEFAULT_POLL_INTERVAL
}

impl OpenOptions {
    /// Options for `port_name` at 9600 baud, 8N1, non-blocking reads.
    pub fn new(port_name: impl Into<String>) -> Self {
        Self {
            port_name: port_name.into(),
            baud_rate: DEFAULT_BAUD_RATE,
            data_bits: 8,
            stop_bits: 1,
            parity: Parity::None,
            flow_control: FlowControl::None,
            minimum_read_size: 0,
            read_timeout: None,
            write_timeout: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    pub fn data_bits(mut self, data_bits: u8) -> Self {
        self.data_bits = data_bits;
        self
    }

    pub fn stop_bits(mut self, stop_bits: u8) -> Self {
        self.stop_bits = stop_bits;
        self
    }

    pub fn parity(mut self, parity: Parity) -> Self {
        self.parity = parity;
        self
    }

    pub fn flow_control(mut self, flow_control: FlowControl) -> Self {
        self.flow_control = flow_control;
        self
    }

    pub fn minimum_read_size(mut self, bytes: usize) -> Self {
        self.minimum_read_size = bytes;
        self
    }

    pub fn read_timeout(mut self, timeout: impl Into<Option<Duration>>) -> Self {
        self.read_timeout = timeout.into();
        self
    }

    pub fn write_timeout(mut self, timeout: impl Into<Option<Duration>>) -> Self {
        self.write_timeout = timeout.into();
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Check every field against what this platform supports.
    ///
    /// Does not touch the device.
    pub fn validate(&self) -> PortResult<()> {
        if self.port_name.trim().is_empty() {
            return Err(PortError::invalid_argument("port name must not be empty"));
        }
        if !is_supported_baud_rate(self.baud_rate) {
            return Err(PortError::unsupported("baud_rate", self.baud_rate));
        }
        DataBits::try_from(self.data_bits)?;
        StopBits::try_from(self.stop_bits)?;
        if self.poll_interval.is_zero() {
            return Err(PortError::invalid_argument("poll interval must be positive"));
        }
        Ok(())
    }
}

/// Whether `baud_rate` is one this platform can program.
pub fn is_supported_baud_rate(baud_rate: u32) -> bool {
    if baud_rate == 0 {
        return false;
    }
    if cfg!(windows) {
        // The Windows driver takes any positive rate and reports what it used.
        return true;
    }
    #[cfg(target_os = "linux")]
    {
        if EXTENDED_BAUD_RATES.contains(&baud_rate) {
            return true;
        }
    }
    STANDARD_BAUD_RATES.contains(&baud_rate)
}

/// Number of data bits per character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataBits {
    Five,
    Six,
    Seven,
    Eight,
}

impl TryFrom<u8> for DataBits {
    type Error = PortError;

    fn try_from(bits: u8) -> PortResult<Self> {
        match bits {
            5 => Ok(DataBits::Five),
            6 => Ok(DataBits::Six),
            7 => Ok(DataBits::Seven),
            8 => Ok(DataBits::Eight),
            other => Err(PortError::unsupported("data_bits", other)),
        }
    }
}

impl From<DataBits> for serialport::DataBits {
    fn from(bits: DataBits) -> Self {
        match bits {
            DataBits::Five => serialport::DataBits::Five,
            DataBits::Six => serialport::DataBits::Six,
            DataBits::Seven => serialport::DataBits::Seven,
            DataBits::Eight => serialport::DataBits::Eight,
        }
    }
}

/// Number of stop bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopBits {
    One,
    Two,
}

impl TryFrom<u8> for StopBits {
    type Error = PortError;

    fn try_from(bits: u8) -> PortResult<Self> {
        match bits {
            1 => Ok(StopBits::One),
            2 => Ok(StopBits::Two),
            other => Err(PortError::unsupported("stop_bits", other)),
        }
    }
}

impl From<StopBits> for serialport::StopBits {
    fn from(bits: StopBits) -> Self {
        match bits {
            StopBits::One => serialport::StopBits::One,
            StopBits::Two => serialport::StopBits::Two,
        }
    }
}

/// Parity checking modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Parity {
    #[default]
    None,
    Odd,
    Even,
}

impl From<Parity> for serialport::Parity {
    fn from(parity: Parity) -> Self {
        match parity {
            Parity::None => serialport::Parity::None,
            Parity::Odd => serialport::Parity::Odd,
            Parity::Even => serialport::Parity::Even,
        }
    }
}

impl From<serialport::Parity> for Parity {
    fn from(parity: serialport::Parity) -> Self {
        match parity {
            serialport::Parity::None => Parity::None,
            serialport::Parity::Odd => Parity::Odd,
            serialport::Parity::Even => Parity::Even,
        }
    }
}

/// Flow control modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowControl {
    #[default]
    None,
    Software,
    Hardware,
}

impl From<FlowControl> for serialport::FlowControl {
    fn from(flow: FlowControl) -> Self {
        match flow {
            FlowControl::None => serialport::FlowControl::None,
            FlowControl::Software => serialport::FlowControl::Software,
            FlowControl::Hardware => serialport::FlowControl::Hardware,
        }
    }
}

impl From<serialport::FlowControl> for FlowControl {
    fn from(flow: serialport::FlowControl) -> Self {
        match flow {
            serialport::FlowControl::None => FlowControl::None,
            serialport::FlowControl::Software => FlowControl::Software,
            serialport::FlowControl::Hardware => FlowControl::Hardware,
        }
    }
}

/// Durations are written as integer milliseconds in config files.
mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_some(&(d.as_millis() as u64)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?.map(Duration::from_millis))
    }
}

mod duration_ms_required {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}
