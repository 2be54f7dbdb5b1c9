//! Byte transports to the controller
//!
//! - `serial`: hardware serial ports via the `serialport` crate
//! - `virtual_port`: in-memory connected pair

pub mod serial;
pub mod virtual_port;

pub use serial::{is_valid_cnc_port, list_ports, SerialPortInfo, SerialTransport};
pub use virtual_port::VirtualPort;
