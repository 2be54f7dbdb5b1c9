//! # CNC Pendant Communication
//!
//! Everything between the host and the motion controller:
//! - `flow`: downstream counters, command queues and admission budgets
//! - `communication`: serial and in-memory byte transports
//! - `firmware`: GRBL and Marlin dialects, firmware detection
//! - `device`: the tick-driven protocol engine and its producer handle
//! - `job`: streaming a program file under backpressure
//! - `session`: the shared event bus, device slot and job

pub mod communication;
pub mod device;
pub mod firmware;
pub mod flow;
pub mod job;
pub mod session;

pub use communication::{list_ports, SerialPortInfo, SerialTransport, VirtualPort};
pub use device::{
    CommandSink, CounterLimits, Device, DeviceConfig, DeviceHandle, DeviceSnapshot, FirmwareInfo,
    Telemetry,
};
pub use firmware::{Detection, DetectorConfig, DeviceDetector, Dialect, FirmwareKind, Outgoing};
pub use flow::{
    Command, CommandQueue, DualCommandQueue, Lane, LengthCounter, PayloadCounter, SentCounter,
    LINE_OVERHEAD, MAX_COMMAND_LEN,
};
pub use job::{Job, JobConfig, JOB_SENDER};
pub use session::{OperationalState, Session};
