//! Device protocol engine
//!
//! - [`Device`]: single-owner engine driven by `tick()`
//! - [`DeviceHandle`]: thread-safe producer handle
//! - [`DeviceSnapshot`]: published machine state

pub mod config;
pub mod engine;
pub mod handle;
pub mod line_reader;
pub mod snapshot;
pub mod watchdog;

pub use config::{CounterLimits, DeviceConfig};
pub use engine::{Device, EngineCore};
pub use handle::{CommandSink, DeviceHandle};
pub use line_reader::LineAssembler;
pub use snapshot::{
    DeviceSnapshot, FirmwareInfo, GrblTelemetry, MarlinTelemetry, Telemetry, MAX_EXTRUDERS,
};
pub use watchdog::Watchdog;
