use std::path::Path;
use std::time::Duration;

#[cfg(feature = "serial")]
use tracing::info;

use crate::error::{Result, TransportError};
use crate::traits::LinkStream;

/// Baud rate the stand controller firmware is built for.
pub const DEFAULT_BAUD: u32 = 115_200;

/// A serial port discovered on the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    /// Device name (`/dev/ttyACM0`, `COM6`, ...).
    pub name: String,
    /// Short description of the port type (`usb 2e8a:000a`, `pci`, ...).
    pub kind: String,
}

/// Open a serial port as a telemetry link.
///
/// `timeout` bounds each read so the decode loop can service the command
/// queue even when the controller is silent.
#[cfg(feature = "serial")]
pub fn open_serial(path: impl AsRef<Path>, baud: u32, timeout: Duration) -> Result<LinkStream> {
    let path = path.as_ref();
    let name = path.to_string_lossy();
    let port = serialport::new(name.as_ref(), baud)
        .timeout(timeout)
        .open()
        .map_err(|e| TransportError::Open {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
    info!(port = %name, baud, "opened serial link");
    Ok(LinkStream::from_serial(port))
}

/// Open a serial port as a telemetry link.
#[cfg(not(feature = "serial"))]
pub fn open_serial(path: impl AsRef<Path>, baud: u32, timeout: Duration) -> Result<LinkStream> {
    let _ = (path.as_ref(), baud, timeout);
    Err(TransportError::Unsupported(
        "serial support not compiled in (enable the `serial` feature)",
    ))
}

/// List serial ports visible to the host.
#[cfg(feature = "serial")]
pub fn available_ports() -> Result<Vec<PortInfo>> {
    use serialport::SerialPortType;

    let ports =
        serialport::available_ports().map_err(|e| TransportError::Enumerate(e.to_string()))?;
    Ok(ports
        .into_iter()
        .map(|p| {
            let kind = match p.port_type {
                SerialPortType::UsbPort(usb) => format!("usb {:04x}:{:04x}", usb.vid, usb.pid),
                SerialPortType::PciPort => "pci".to_string(),
                SerialPortType::BluetoothPort => "bluetooth".to_string(),
                SerialPortType::Unknown => "unknown".to_string(),
            };
            PortInfo {
                name: p.port_name,
                kind,
            }
        })
        .collect())
}

/// List serial ports visible to the host.
#[cfg(not(feature = "serial"))]
pub fn available_ports() -> Result<Vec<PortInfo>> {
    Err(TransportError::Unsupported(
        "serial support not compiled in (enable the `serial` feature)",
    ))
}
