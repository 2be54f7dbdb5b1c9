//! # CNC Pendant
//!
//! A host-side pendant for CNC machines and 3D printers:
//! - Detects GRBL or Marlin firmware on a serial port
//! - Streams G-code programs under the firmware's flow control
//! - Jogs, polls status and recovers from protocol faults
//!
//! ## Architecture
//!
//! CNC Pendant is organized as a workspace with multiple crates:
//!
//! 1. **cncpendant-core** - Errors, events, data models, transport traits
//! 2. **cncpendant-communication** - Queues, device engine, dialects, detection, jobs
//! 3. **cncpendant-settings** - Configuration files
//! 4. **cncpendant** - Main binary that integrates all crates

pub mod console;
pub mod pendant;

pub use cncpendant_communication::{
    Device, DeviceHandle, DeviceSnapshot, FirmwareKind, Job, OperationalState, Session,
};
pub use cncpendant_core::{AppEvent, EventBus, Position, Result};
pub use cncpendant_settings::Config;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (set at compile time)
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Target triple the binary was built for
pub const BUILD_TARGET: &str = env!("BUILD_TARGET");

/// Set to any value to log JSON lines instead of text
pub const LOG_JSON_ENV: &str = "CNCPENDANT_LOG_JSON";

/// Install the global subscriber
///
/// Filtering follows `RUST_LOG` (default `info`). Output goes to stderr so
/// stdout stays with the console.
pub fn init_logging() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if std::env::var_os(LOG_JSON_ENV).is_some() {
        let layer = fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_thread_names(true);
        registry.with(layer).try_init()?;
    } else {
        let layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_thread_names(true)
            .with_line_number(true);
        registry.with(layer).try_init()?;
    }

    Ok(())
}
