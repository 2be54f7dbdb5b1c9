//! CNC Pendant Settings Crate
//!
//! Handles persistent configuration and maps it onto the engine's plain
//! config structs.

pub mod config;
pub mod error;

pub use config::{Config, ConnectionSettings, DeviceSettings, JobSettings, AUTO_PORT};
pub use error::{ConfigError, SettingsError, SettingsResult};
