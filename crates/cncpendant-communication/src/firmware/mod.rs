//! Firmware dialects
//!
//! Supported controllers:
//! - GRBL: character-counting flow control, realtime control bytes
//! - Marlin: one line in flight per acknowledgment window, command-aware
//!   response parsing
//!
//! A [`Dialect`] owns its downstream counter and its telemetry state; the
//! generic send/receive/watchdog cycle lives in [`crate::device`].

pub mod detector;
pub mod grbl;
pub mod marlin;

pub use detector::{Detection, DetectorConfig, DeviceDetector};
pub use grbl::GrblDialect;
pub use marlin::MarlinDialect;

use crate::device::{DeviceConfig, EngineCore};
use crate::flow::SentCounter;
use cncpendant_core::Axis;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supported controller families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FirmwareKind {
    /// GRBL and derivatives
    Grbl,
    /// Marlin and derivatives
    Marlin,
}

/// One item of a dialect command sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outgoing {
    /// Control byte written straight to the transport
    Realtime(u8),
    /// Line queued for acknowledgment
    Line(String),
}

impl FirmwareKind {
    /// All dialects in probe order
    pub const ALL: [FirmwareKind; 2] = [FirmwareKind::Grbl, FirmwareKind::Marlin];

    /// Query sent while probing, framed by newlines
    pub fn probe(&self) -> &'static [u8] {
        match self {
            FirmwareKind::Grbl => b"\n$I\n",
            FirmwareKind::Marlin => b"\nM115\n",
        }
    }

    /// Substring that confirms the dialect in a probe answer
    pub fn signature(&self) -> &'static str {
        match self {
            FirmwareKind::Grbl => "[VER:",
            FirmwareKind::Marlin => "MACHINE_TYPE",
        }
    }

    /// Whether `byte` is a realtime control byte in this dialect
    pub fn is_realtime(&self, byte: u8) -> bool {
        match self {
            FirmwareKind::Grbl => grbl::realtime::is_realtime(byte),
            FirmwareKind::Marlin => false,
        }
    }

    /// Commands that move one axis by `distance` at `feed`
    pub fn jog_lines(&self, axis: Axis, distance: f64, feed: f64) -> Vec<String> {
        match self {
            FirmwareKind::Grbl => vec![format!(
                "$J=G91 F{:.0} {}{:.3}",
                feed,
                axis.letter(),
                distance
            )],
            FirmwareKind::Marlin => vec![
                "G91".to_string(),
                format!("G0 F{:.0} {}{:.3}", feed, axis.letter(), distance),
                "G90".to_string(),
            ],
        }
    }

    /// Position/telemetry poll
    pub fn status_request(&self, temperature_autoreport: bool) -> Vec<Outgoing> {
        match self {
            FirmwareKind::Grbl => vec![Outgoing::Realtime(grbl::realtime::STATUS_REPORT)],
            FirmwareKind::Marlin if temperature_autoreport => {
                vec![Outgoing::Line("M114".to_string())]
            }
            FirmwareKind::Marlin => vec![
                Outgoing::Line("M114".to_string()),
                Outgoing::Line("M105".to_string()),
            ],
        }
    }

    /// Create the dialect state machine
    pub fn dialect(&self, config: &DeviceConfig) -> Box<dyn Dialect> {
        match self {
            FirmwareKind::Grbl => Box::new(GrblDialect::new(config)),
            FirmwareKind::Marlin => Box::new(MarlinDialect::new(config)),
        }
    }
}

impl fmt::Display for FirmwareKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FirmwareKind::Grbl => write!(f, "GRBL"),
            FirmwareKind::Marlin => write!(f, "Marlin"),
        }
    }
}

impl FromStr for FirmwareKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "grbl" => Ok(FirmwareKind::Grbl),
            "marlin" => Ok(FirmwareKind::Marlin),
            other => Err(format!("unknown firmware dialect: {}", other)),
        }
    }
}

/// Dialect-specific half of the device engine
///
/// The engine drives the generic cycle and calls back into the dialect for
/// everything that depends on the firmware's grammar.
pub trait Dialect: Send {
    /// Controller family
    fn kind(&self) -> FirmwareKind;

    /// Downstream buffer accounting
    fn counter(&self) -> &dyn SentCounter;

    /// Downstream buffer accounting, mutable
    fn counter_mut(&mut self) -> &mut dyn SentCounter;

    /// Issue introspection commands after connecting
    fn begin(&mut self, core: &mut EngineCore);

    /// Interpret one complete response line
    fn parse_line(&mut self, core: &mut EngineCore, line: &str);

    /// Issue the soft reset sequence; queues are already flushed
    fn soft_reset(&mut self, core: &mut EngineCore);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jog_lines() {
        assert_eq!(
            FirmwareKind::Grbl.jog_lines(Axis::X, 1.5, 1000.0),
            vec!["$J=G91 F1000 X1.500"]
        );
        assert_eq!(
            FirmwareKind::Marlin.jog_lines(Axis::Z, -0.1, 300.0),
            vec!["G91", "G0 F300 Z-0.100", "G90"]
        );
    }

    #[test]
    fn test_status_request() {
        assert_eq!(
            FirmwareKind::Grbl.status_request(false),
            vec![Outgoing::Realtime(b'?')]
        );
        assert_eq!(FirmwareKind::Marlin.status_request(false).len(), 2);
        assert_eq!(
            FirmwareKind::Marlin.status_request(true),
            vec![Outgoing::Line("M114".into())]
        );
    }

    #[test]
    fn test_parse_kind() {
        assert_eq!("GRBL".parse::<FirmwareKind>(), Ok(FirmwareKind::Grbl));
        assert_eq!("marlin".parse::<FirmwareKind>(), Ok(FirmwareKind::Marlin));
        assert!("smoothie".parse::<FirmwareKind>().is_err());
    }
}
