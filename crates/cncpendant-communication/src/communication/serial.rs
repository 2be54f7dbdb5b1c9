//! Serial port transport
//!
//! Wraps a `serialport` handle as a polled [`ByteTransport`]. Reads never
//! block: incoming bytes are pulled in chunks only when the driver reports
//! them as pending.

use cncpendant_core::{ByteTransport, TransportError};
use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::time::Duration;

/// Information about an available serial port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialPortInfo {
    /// Port name (e.g., "/dev/ttyUSB0", "COM3")
    pub port_name: String,

    /// Port description (e.g., "USB Serial Port")
    pub description: String,

    /// USB vendor ID if applicable
    pub vid: Option<u16>,

    /// USB product ID if applicable
    pub pid: Option<u16>,
}

/// List serial ports that look like motion controllers
///
/// Filters ports to include only CNC controller patterns:
/// - Windows: COM* (e.g., COM1, COM3)
/// - Linux: /dev/ttyUSB*, /dev/ttyACM*
/// - macOS: /dev/cu.usbserial-*, /dev/cu.usbmodem*
pub fn list_ports() -> Result<Vec<SerialPortInfo>, TransportError> {
    let ports = serialport::available_ports().map_err(|e| {
        tracing::error!("Failed to enumerate serial ports: {}", e);
        TransportError::PortNotFound {
            port: format!("<enumeration failed: {}>", e),
        }
    })?;

    Ok(ports
        .iter()
        .filter(|port| is_valid_cnc_port(&port.port_name))
        .map(|port| {
            let (vid, pid) = match &port.port_type {
                serialport::SerialPortType::UsbPort(usb) => (Some(usb.vid), Some(usb.pid)),
                _ => (None, None),
            };
            SerialPortInfo {
                port_name: port.port_name.clone(),
                description: get_port_description(port),
                vid,
                pid,
            }
        })
        .collect())
}

/// Check if a port name matches CNC controller patterns
pub fn is_valid_cnc_port(port_name: &str) -> bool {
    if let Some(digits) = port_name.strip_prefix("COM") {
        return !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit());
    }

    port_name.starts_with("/dev/ttyUSB")
        || port_name.starts_with("/dev/ttyACM")
        || port_name.starts_with("/dev/cu.usbserial-")
        || port_name.starts_with("/dev/cu.usbmodem")
}

fn get_port_description(port: &serialport::SerialPortInfo) -> String {
    match &port.port_type {
        serialport::SerialPortType::UsbPort(usb_info) => {
            format!(
                "USB {} {}",
                usb_info.manufacturer.as_deref().unwrap_or("Device"),
                usb_info.product.as_deref().unwrap_or("Serial Port")
            )
        }
        serialport::SerialPortType::BluetoothPort => "Bluetooth Serial".to_string(),
        serialport::SerialPortType::PciPort => "PCI Serial".to_string(),
        _ => "Serial Port".to_string(),
    }
}

/// Serial link to the controller
pub struct SerialTransport {
    name: String,
    port: Box<dyn serialport::SerialPort>,
    pending: VecDeque<u8>,
}

impl SerialTransport {
    /// Open `port_name` at `baud_rate`, 8N1, no flow control
    pub fn open(port_name: &str, baud_rate: u32) -> Result<Self, TransportError> {
        let port = serialport::new(port_name, baud_rate)
            // Short timeout for non-blocking reads
            .timeout(Duration::from_millis(10))
            .data_bits(serialport::DataBits::Eight)
            .stop_bits(serialport::StopBits::One)
            .parity(serialport::Parity::None)
            .flow_control(serialport::FlowControl::None)
            .open()
            .map_err(|e| {
                tracing::warn!("Failed to open serial port {}: {}", port_name, e);
                match e.kind {
                    serialport::ErrorKind::NoDevice => TransportError::PortNotFound {
                        port: port_name.to_string(),
                    },
                    _ => TransportError::FailedToOpen {
                        port: port_name.to_string(),
                        reason: e.to_string(),
                    },
                }
            })?;

        tracing::info!("Opened serial port {} at {} baud", port_name, baud_rate);
        Ok(Self {
            name: port_name.to_string(),
            port,
            pending: VecDeque::new(),
        })
    }

    /// Port name
    pub fn name(&self) -> &str {
        &self.name
    }

    fn fill(&mut self) -> Result<(), TransportError> {
        let waiting = self
            .port
            .bytes_to_read()
            .map_err(|e| TransportError::ReadFailed {
                reason: e.to_string(),
            })? as usize;
        if waiting == 0 {
            return Ok(());
        }

        let mut buf = vec![0u8; waiting.min(512)];
        match self.port.read(&mut buf) {
            Ok(n) => {
                self.pending.extend(&buf[..n]);
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(()),
            Err(e) => Err(TransportError::ReadFailed {
                reason: e.to_string(),
            }),
        }
    }
}

impl ByteTransport for SerialTransport {
    fn available(&mut self) -> Result<usize, TransportError> {
        if self.pending.is_empty() {
            self.fill()?;
        }
        Ok(self.pending.len())
    }

    fn read_byte(&mut self) -> Result<Option<u8>, TransportError> {
        if self.pending.is_empty() {
            self.fill()?;
        }
        Ok(self.pending.pop_front())
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.port
            .write_all(bytes)
            .and_then(|_| self.port.flush())
            .map_err(|e| TransportError::WriteFailed {
                reason: e.to_string(),
            })
    }

    fn set_baud(&mut self, rate: u32) -> Result<(), TransportError> {
        self.port
            .set_baud_rate(rate)
            .map_err(|e| TransportError::UnsupportedBaudRate {
                baud: rate,
                reason: e.to_string(),
            })?;
        tracing::debug!("{} switched to {} baud", self.name, rate);
        Ok(())
    }

    fn drain_input(&mut self) -> Result<usize, TransportError> {
        let drained = self.pending.len();
        self.pending.clear();
        let waiting = self.port.bytes_to_read().unwrap_or(0) as usize;
        self.port
            .clear(serialport::ClearBuffer::Input)
            .map_err(|e| TransportError::ReadFailed {
                reason: e.to_string(),
            })?;
        Ok(drained + waiting)
    }
}
