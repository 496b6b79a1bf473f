//! Discovery of serial devices on the host.
//!
//! [`PortEnumerator`] is the one seam between platform discovery and the rest
//! of the crate. [`SystemEnumerator`] asks the `serialport` backend;
//! [`FixedEnumerator`] serves a fixed list for tests.

use serde::{Deserialize, Serialize};
use serialport::{SerialPortInfo, SerialPortType};
use tracing::{debug, warn};

/// Kind of physical link behind a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortKind {
    Usb,
    Bluetooth,
    Pci,
    Unknown,
}

/// A serial device found by enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortDescriptor {
    /// Identifier to pass as `OpenOptions::port_name`.
    pub name: String,
    pub kind: PortKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vid: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,
}

impl PortDescriptor {
    /// A descriptor carrying only a name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: PortKind::Unknown,
            vid: None,
            pid: None,
            manufacturer: None,
            product: None,
            serial_number: None,
        }
    }

    /// Human-readable summary, e.g. `"Arduino LLC Arduino Uno (2341:0043)"`.
    pub fn description(&self) -> Option<String> {
        let mut parts: Vec<String> = [&self.manufacturer, &self.product]
            .into_iter()
            .flatten()
            .cloned()
            .collect();
        if let (Some(vid), Some(pid)) = (self.vid, self.pid) {
            parts.push(format!("({vid:04x}:{pid:04x})"));
        }
        (!parts.is_empty()).then(|| parts.join(" "))
    }
}

impl TryFrom<SerialPortInfo> for PortDescriptor {
    type Error = String;

    fn try_from(info: SerialPortInfo) -> Result<Self, Self::Error> {
        if info.port_name.trim().is_empty() {
            return Err("backend reported a port without a name".to_string());
        }

        let mut descriptor = PortDescriptor::named(info.port_name);
        match info.port_type {
            SerialPortType::UsbPort(usb) => {
                descriptor.kind = PortKind::Usb;
                descriptor.vid = Some(usb.vid);
                descriptor.pid = Some(usb.pid);
                descriptor.manufacturer = usb.manufacturer;
                descriptor.product = usb.product;
                descriptor.serial_number = usb.serial_number;
            }
            SerialPortType::BluetoothPort => descriptor.kind = PortKind::Bluetooth,
            SerialPortType::PciPort => descriptor.kind = PortKind::Pci,
            SerialPortType::Unknown => descriptor.kind = PortKind::Unknown,
        }
        Ok(descriptor)
    }
}

/// Capability to list the serial devices currently visible.
pub trait PortEnumerator {
    /// Snapshot of visible devices. Order is not stable between calls.
    /// Devices that fail to probe are skipped, never fatal.
    fn list(&self) -> Vec<PortDescriptor>;
}

/// Enumerates through the platform backend of the `serialport` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnumerator;

impl PortEnumerator for SystemEnumerator {
    fn list(&self) -> Vec<PortDescriptor> {
        match serialport::available_ports() {
            Ok(ports) => collect_probed(ports.into_iter().map(PortDescriptor::try_from)),
            Err(e) => {
                warn!(error = %e, "serial port enumeration failed");
                Vec::new()
            }
        }
    }
}

/// Serves a fixed list of descriptors.
#[derive(Debug, Clone, Default)]
pub struct FixedEnumerator {
    ports: Vec<PortDescriptor>,
}

impl FixedEnumerator {
    pub fn new(ports: Vec<PortDescriptor>) -> Self {
        Self { ports }
    }
}

impl PortEnumerator for FixedEnumerator {
    fn list(&self) -> Vec<PortDescriptor> {
        self.ports.clone()
    }
}

/// Keep every successfully probed device, logging and skipping the rest.
pub fn collect_probed<I, E>(probes: I) -> Vec<PortDescriptor>
where
    I: IntoIterator<Item = Result<PortDescriptor, E>>,
    E: std::fmt::Display,
{
    probes
        .into_iter()
        .filter_map(|probe| match probe {
            Ok(descriptor) => Some(descriptor),
            Err(e) => {
                debug!(error = %e, "skipping serial device that failed to probe");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serialport::UsbPortInfo;

    fn usb_info(name: &str) -> SerialPortInfo {
        SerialPortInfo {
            port_name: name.to_string(),
            port_type: SerialPortType::UsbPort(UsbPortInfo {
                vid: 0x2341,
                pid: 0x0043,
                serial_number: Some("8573531303735".to_string()),
                manufacturer: Some("Arduino LLC".to_string()),
                product: Some("Arduino Uno".to_string()),
            }),
        }
    }

    #[test]
    fn test_usb_descriptor_conversion() {
        let descriptor = PortDescriptor::try_from(usb_info("/dev/ttyACM0")).unwrap();
        assert_eq!(descriptor.name, "/dev/ttyACM0");
        assert_eq!(descriptor.kind, PortKind::Usb);
        assert_eq!(descriptor.vid, Some(0x2341));
        assert_eq!(
            descriptor.description().as_deref(),
            Some("Arduino LLC Arduino Uno (2341:0043)")
        );
    }

    #[test]
    fn test_unnamed_port_fails_probe() {
        let info = SerialPortInfo {
            port_name: String::new(),
            port_type: SerialPortType::PciPort,
        };
        assert!(PortDescriptor::try_from(info).is_err());
    }

    #[test]
    fn test_failed_probe_does_not_abort_listing() {
        let probes: Vec<Result<PortDescriptor, String>> = vec![
            Ok(PortDescriptor::named("/dev/ttyS0")),
            Err("permission denied reading sysfs".to_string()),
            Ok(PortDescriptor::named("/dev/ttyUSB0")),
        ];
        let names: Vec<String> = collect_probed(probes).into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["/dev/ttyS0", "/dev/ttyUSB0"]);
    }

    #[test]
    fn test_fixed_enumerator() {
        let enumerator = FixedEnumerator::new(vec![PortDescriptor::named("COM3")]);
        assert_eq!(enumerator.list(), vec![PortDescriptor::named("COM3")]);
        assert!(FixedEnumerator::default().list().is_empty());
    }

    #[test]
    fn test_system_enumerator_never_panics() {
        let _ = SystemEnumerator.list();
    }

    #[test]
    fn test_descriptor_json_omits_missing_metadata() {
        let json = serde_json::to_value(PortDescriptor::named("/dev/ttyS1")).unwrap();
        assert_eq!(json, serde_json::json!({"name": "/dev/ttyS1", "kind": "unknown"}));
    }
}
