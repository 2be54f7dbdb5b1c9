//! Published machine state
//!
//! Written by the engine after each tick that changes something; read by
//! any number of producers without touching the engine.

use crate::firmware::grbl::BufferState;
use crate::firmware::FirmwareKind;
use cncpendant_core::{OverrideState, Position, Temperature};
use serde::{Deserialize, Serialize};

/// Most extruders tracked per machine
pub const MAX_EXTRUDERS: usize = 4;

/// What the firmware reported about itself
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirmwareInfo {
    /// Firmware name and version
    pub description: String,
    /// Machine name
    pub machine_type: String,
    /// Build options (`[OPT:`)
    pub options: String,
    /// Hotend count, 1..=MAX_EXTRUDERS
    pub extruders: usize,
    /// Temperature autoreport supported
    pub autoreport_temp: bool,
    /// Temperature autoreport currently enabled
    pub autoreport_enabled: bool,
    /// Progress reporting supported
    pub progress: bool,
    /// Build percentage display supported
    pub build_percent: bool,
}

impl Default for FirmwareInfo {
    fn default() -> Self {
        Self {
            description: String::new(),
            machine_type: String::new(),
            options: String::new(),
            extruders: 1,
            autoreport_temp: false,
            autoreport_enabled: false,
            progress: false,
            build_percent: false,
        }
    }
}

/// GRBL telemetry
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GrblTelemetry {
    /// Machine state text
    pub status: String,
    /// Work coordinate offset
    pub work_offset: Position,
    /// Current feed rate
    pub feed: f64,
    /// Current spindle speed
    pub spindle: f64,
    /// Override percentages
    pub overrides: OverrideState,
    /// Last buffer report
    pub buffer: Option<BufferState>,
}

/// Marlin telemetry
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MarlinTelemetry {
    /// Hotend temperatures, one per extruder
    pub tools: Vec<Temperature>,
    /// Bed temperature
    pub bed: Temperature,
    /// Extruder axis position
    pub extruder_position: f64,
    /// G91 relative positioning active
    pub relative: bool,
}

/// Dialect-specific telemetry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Telemetry {
    /// GRBL status report fields
    Grbl(GrblTelemetry),
    /// Marlin temperatures and modes
    Marlin(MarlinTelemetry),
}

impl Telemetry {
    fn for_kind(kind: FirmwareKind) -> Self {
        match kind {
            FirmwareKind::Grbl => Telemetry::Grbl(GrblTelemetry::default()),
            FirmwareKind::Marlin => Telemetry::Marlin(MarlinTelemetry {
                tools: vec![Temperature::default()],
                ..Default::default()
            }),
        }
    }
}

/// Point-in-time view of the device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceSnapshot {
    /// Controller family
    pub kind: FirmwareKind,
    /// Line speed
    pub baud: u32,
    /// Machine position
    pub position: Position,
    /// Work position
    pub work_position: Position,
    /// Firmware identity and capabilities
    pub firmware: FirmwareInfo,
    /// Dialect-specific telemetry
    pub telemetry: Telemetry,
    /// Last informational message
    pub last_message: String,
    /// Last fault or warning line
    pub last_response: String,
    /// Commands held in the queues
    pub queued: usize,
    /// Lines outstanding inside the firmware
    pub in_flight: usize,
    /// Free bytes in the firmware window
    pub free_bytes: usize,
}

impl DeviceSnapshot {
    /// Initial state for a freshly detected device
    pub fn new(kind: FirmwareKind, baud: u32) -> Self {
        Self {
            kind,
            baud,
            position: Position::default(),
            work_position: Position::default(),
            firmware: FirmwareInfo::default(),
            telemetry: Telemetry::for_kind(kind),
            last_message: String::new(),
            last_response: String::new(),
            queued: 0,
            in_flight: 0,
            free_bytes: 0,
        }
    }

    /// GRBL telemetry, if this is a GRBL device
    pub fn grbl(&self) -> Option<&GrblTelemetry> {
        match &self.telemetry {
            Telemetry::Grbl(t) => Some(t),
            Telemetry::Marlin(_) => None,
        }
    }

    /// Marlin telemetry, if this is a Marlin device
    pub fn marlin(&self) -> Option<&MarlinTelemetry> {
        match &self.telemetry {
            Telemetry::Marlin(t) => Some(t),
            Telemetry::Grbl(_) => None,
        }
    }
}
