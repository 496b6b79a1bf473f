//! Translating [`OpenOptions`] into an open, configured native handle.
//!
//! Opening is all-or-nothing: the device is opened exclusively with every
//! setting applied, the settings are read back, and any mismatch releases
//! the device before an error is returned.
//!
//! Opening a port may pulse the modem control lines. Boards that wire DTR to
//! their reset pin (most Arduino-style microcontrollers) reboot when that
//! happens, so callers that talk to such a board must wait for it to come
//! back up before writing.

use super::error::{PortError, PortResult};
use super::options::{DataBits, FlowControl, OpenOptions, Parity, StopBits};
use super::sync_port::SyncSerialPort;
use super::traits::RawPort;
use serde::Serialize;
use std::fmt::Debug;
use tracing::{debug, info};

/// Line settings as reported by the device after opening.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AppliedSettings {
    pub baud_rate: u32,
    pub data_bits: u8,
    pub stop_bits: u8,
    pub parity: Parity,
    pub flow_control: FlowControl,
}

impl AppliedSettings {
    /// The settings `options` asks for.
    pub fn requested(options: &OpenOptions) -> Self {
        Self {
            baud_rate: options.baud_rate,
            data_bits: options.data_bits,
            stop_bits: options.stop_bits,
            parity: options.parity,
            flow_control: options.flow_control,
        }
    }
}

/// An open device handle, split into a read half and a write half.
#[derive(Debug)]
pub struct NativeHandle {
    pub(crate) reader: Box<dyn RawPort>,
    pub(crate) writer: Box<dyn RawPort>,
    applied: AppliedSettings,
}

impl NativeHandle {
    /// Assemble a handle from already-open halves, e.g. two clones of a
    /// [`MockSerialPort`](super::MockSerialPort).
    pub fn from_parts(
        reader: Box<dyn RawPort>,
        writer: Box<dyn RawPort>,
        applied: AppliedSettings,
    ) -> Self {
        Self {
            reader,
            writer,
            applied,
        }
    }

    pub fn applied(&self) -> AppliedSettings {
        self.applied
    }
}

/// Validate `options`, open the device exclusively and apply the line
/// settings.
///
/// # Errors
/// - [`PortError::InvalidArgument`] for an empty port name.
/// - [`PortError::UnsupportedParameter`] for a baud rate, data bit or stop
///   bit value the platform rejects, or one the device silently changed.
/// - [`PortError::DeviceUnavailable`] if the device does not exist or is
///   held elsewhere.
/// - [`PortError::PermissionDenied`] if the OS refuses access.
pub fn configure(options: &OpenOptions) -> PortResult<NativeHandle> {
    options.validate()?;
    let name = options.port_name.as_str();

    let builder = serialport::new(name, options.baud_rate)
        .data_bits(DataBits::try_from(options.data_bits)?.into())
        .stop_bits(StopBits::try_from(options.stop_bits)?.into())
        .parity(options.parity.into())
        .flow_control(options.flow_control.into())
        .timeout(options.poll_interval);

    debug!(port = name, baud = options.baud_rate, "opening serial port");
    let port = open_exclusive(builder).map_err(|e| PortError::from_open(name, e))?;

    // `port` is dropped, and the device released, on every early return below.
    let applied = read_back(&*port)?;
    verify(options, &applied)?;

    let reader = SyncSerialPort::new(port, name);
    let writer = reader
        .try_clone()
        .map_err(|e| PortError::from_open(name, e))?;

    info!(
        port = name,
        baud = applied.baud_rate,
        data_bits = applied.data_bits,
        stop_bits = applied.stop_bits,
        parity = ?applied.parity,
        flow_control = ?applied.flow_control,
        "serial port opened"
    );

    Ok(NativeHandle::from_parts(
        Box::new(reader),
        Box::new(writer),
        applied,
    ))
}

#[cfg(unix)]
fn open_exclusive(
    builder: serialport::SerialPortBuilder,
) -> serialport::Result<Box<dyn serialport::SerialPort>> {
    let mut port = builder.open_native()?;
    // TIOCEXCL: later opens by anyone but root fail with EBUSY.
    port.set_exclusive(true)?;
    Ok(Box::new(port))
}

#[cfg(not(unix))]
fn open_exclusive(
    builder: serialport::SerialPortBuilder,
) -> serialport::Result<Box<dyn serialport::SerialPort>> {
    // COM handles are opened without sharing, so a second open fails.
    builder.open()
}

fn read_back(port: &dyn serialport::SerialPort) -> PortResult<AppliedSettings> {
    let to_io = |e: serialport::Error| PortError::Io(e.into());
    Ok(AppliedSettings {
        baud_rate: port.baud_rate().map_err(to_io)?,
        data_bits: data_bits_value(port.data_bits().map_err(to_io)?),
        stop_bits: stop_bits_value(port.stop_bits().map_err(to_io)?),
        parity: port.parity().map_err(to_io)?.into(),
        flow_control: port.flow_control().map_err(to_io)?.into(),
    })
}

/// Reject a device that accepted the open but applied different settings.
fn verify(options: &OpenOptions, applied: &AppliedSettings) -> PortResult<()> {
    let requested = AppliedSettings::requested(options);
    check("baud_rate", requested.baud_rate, applied.baud_rate)?;
    check("data_bits", requested.data_bits, applied.data_bits)?;
    check("stop_bits", requested.stop_bits, applied.stop_bits)?;
    check("parity", requested.parity, applied.parity)?;
    check("flow_control", requested.flow_control, applied.flow_control)
}

fn check<T: PartialEq + Debug>(field: &'static str, requested: T, applied: T) -> PortResult<()> {
    if requested == applied {
        Ok(())
    } else {
        Err(PortError::unsupported(
            field,
            format!("{requested:?} (device applied {applied:?})"),
        ))
    }
}

fn data_bits_value(bits: serialport::DataBits) -> u8 {
    match bits {
        serialport::DataBits::Five => 5,
        serialport::DataBits::Six => 6,
        serialport::DataBits::Seven => 7,
        serialport::DataBits::Eight => 8,
    }
}

fn stop_bits_value(bits: serialport::StopBits) -> u8 {
    match bits {
        serialport::StopBits::One => 1,
        serialport::StopBits::Two => 2,
    }
}
