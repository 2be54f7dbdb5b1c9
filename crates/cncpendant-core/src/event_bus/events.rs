//! Event type definitions for the event bus.
//!
//! Events are cloneable and serializable so they can be logged or mirrored.

use serde::{Deserialize, Serialize};

use crate::data::SenderToken;

/// Root event enum for all pendant events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AppEvent {
    /// Device state change or failure
    Device(DeviceStatusEvent),
    /// Job state change
    Job(JobStatusEvent),
    /// A raw line received from the firmware
    Traffic(RawLine),
}

impl AppEvent {
    /// Get the category of this event
    pub fn category(&self) -> EventCategory {
        match self {
            AppEvent::Device(_) => EventCategory::Device,
            AppEvent::Job(_) => EventCategory::Job,
            AppEvent::Traffic(_) => EventCategory::Traffic,
        }
    }

    /// Get a short description of this event for logging
    pub fn description(&self) -> String {
        match self {
            AppEvent::Device(e) => format!("device: {}", e),
            AppEvent::Job(e) => format!("job: {}", e),
            AppEvent::Traffic(line) => format!("rx: {}", line.text),
        }
    }
}

/// Event category for filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventCategory {
    /// Device status events.
    Device,
    /// Job status events.
    Job,
    /// Raw received lines.
    Traffic,
}

impl std::fmt::Display for EventCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventCategory::Device => write!(f, "Device"),
            EventCategory::Job => write!(f, "Job"),
            EventCategory::Traffic => write!(f, "Traffic"),
        }
    }
}

/// Device status notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceStatusEvent {
    /// Position, telemetry, capabilities or connection changed
    Changed,
    /// Protocol fault, communication timeout or non-fatal firmware warning
    Failure,
}

impl DeviceStatusEvent {
    /// Numeric code: 0 = general state change, 1 = failure/panic
    pub fn code(&self) -> u8 {
        match self {
            DeviceStatusEvent::Changed => 0,
            DeviceStatusEvent::Failure => 1,
        }
    }

    /// Build from a numeric code; anything non-zero is a failure
    pub fn from_code(code: u8) -> Self {
        if code == 0 {
            DeviceStatusEvent::Changed
        } else {
            DeviceStatusEvent::Failure
        }
    }
}

impl std::fmt::Display for DeviceStatusEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceStatusEvent::Changed => write!(f, "changed"),
            DeviceStatusEvent::Failure => write!(f, "failure"),
        }
    }
}

/// Job state change signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobStatusEvent {
    /// A new file was bound (or binding failed)
    FileSelected,
    /// Feeding started
    Started,
    /// Feeding paused
    Paused,
    /// Feeding resumed
    Resumed,
    /// Job cancelled
    Cancelled,
    /// End of file reached
    Completed,
}

impl std::fmt::Display for JobStatusEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatusEvent::FileSelected => write!(f, "file selected"),
            JobStatusEvent::Started => write!(f, "started"),
            JobStatusEvent::Paused => write!(f, "paused"),
            JobStatusEvent::Resumed => write!(f, "resumed"),
            JobStatusEvent::Cancelled => write!(f, "cancelled"),
            JobStatusEvent::Completed => write!(f, "completed"),
        }
    }
}

/// A line received from the firmware, attributed to the command it answered
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawLine {
    /// Line text without terminator
    pub text: String,
    /// Sender of the oldest unacknowledged command when the line arrived
    pub sender: Option<SenderToken>,
}

impl RawLine {
    /// Create a new raw line
    pub fn new(text: impl Into<String>, sender: Option<SenderToken>) -> Self {
        Self {
            text: text.into(),
            sender,
        }
    }
}
