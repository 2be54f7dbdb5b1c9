//! Error handling for CNC Pendant
//!
//! Provides error types for each layer of the pendant:
//! - Transport errors (serial/byte stream)
//! - Device errors (firmware protocol, admission)
//! - Job errors (program file streaming)
//!
//! All error types use `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Transport error type
///
/// Represents failures of the byte stream that connects the pendant to
/// the motion controller.
#[derive(Error, Debug, Clone)]
pub enum TransportError {
    /// Port not found
    #[error("Port not found: {port}")]
    PortNotFound {
        /// The name of the port that was not found.
        port: String,
    },

    /// Failed to open port
    #[error("Failed to open port {port}: {reason}")]
    FailedToOpen {
        /// The name of the port that failed to open.
        port: String,
        /// The reason the port failed to open.
        reason: String,
    },

    /// Baud rate could not be applied
    #[error("Baud rate {baud} not supported: {reason}")]
    UnsupportedBaudRate {
        /// The rejected baud rate.
        baud: u32,
        /// The reason reported by the driver.
        reason: String,
    },

    /// Read failed
    #[error("Read failed: {reason}")]
    ReadFailed {
        /// The reason for the read failure.
        reason: String,
    },

    /// Write failed
    #[error("Write failed: {reason}")]
    WriteFailed {
        /// The reason for the write failure.
        reason: String,
    },

    /// The other end of the stream went away
    #[error("Transport closed")]
    Closed,
}

/// Device error type
///
/// Represents errors raised by the device engine. Admission rejections are
/// reported as `bool` by the scheduling API; these variants describe why.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// A device was already registered for this session
    #[error("A device is already registered")]
    AlreadyRegistered,

    /// Device is in panic and rejects all scheduling until reset
    #[error("Device in panic: {reason}")]
    Panic {
        /// Last response that caused the panic.
        reason: String,
    },

    /// Queue is full
    #[error("Command queue full ({lane} lane)")]
    QueueFull {
        /// Lane that had no free slots.
        lane: String,
    },

    /// Empty command
    #[error("Empty command")]
    EmptyCommand,

    /// Command longer than the maximum line length
    #[error("Command too long: {len} bytes (max {max})")]
    CommandTooLong {
        /// Length of the rejected command.
        len: usize,
        /// Maximum allowed length.
        max: usize,
    },

    /// Receive watchdog expired
    #[error("No response within {timeout_ms}ms")]
    Timeout {
        /// The watchdog timeout in milliseconds.
        timeout_ms: u64,
    },
}

/// Job error type
///
/// Errors local to a job; they never escalate to the device engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JobError {
    /// Program file could not be opened
    #[error("Failed to open {path}: {reason}")]
    OpenFailed {
        /// Path of the program file.
        path: String,
        /// The reason the open failed.
        reason: String,
    },

    /// A program line does not fit in one command
    #[error("Line at byte {file_pos} exceeds {max} bytes")]
    LineTooLong {
        /// File offset where the line ended.
        file_pos: u64,
        /// Maximum allowed length.
        max: usize,
    },

    /// Device accepted the capacity check but rejected the command
    #[error("Device rejected a command it reported capacity for")]
    Rejected,
}

/// Main error type for CNC Pendant
///
/// A unified error type that can represent any error from all layers.
#[derive(Error, Debug)]
pub enum Error {
    /// Transport error
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Device error
    #[error(transparent)]
    Device(#[from] DeviceError),

    /// Job error
    #[error(transparent)]
    Job(#[from] JobError),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an error from a string message
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// Check if this is a timeout error
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Device(DeviceError::Timeout { .. }))
    }

    /// Check if this is a transport error
    pub fn is_transport_error(&self) -> bool {
        matches!(self, Error::Transport(_))
    }

    /// Check if this is a device error
    pub fn is_device_error(&self) -> bool {
        matches!(self, Error::Device(_))
    }

    /// Check if this is a job error
    pub fn is_job_error(&self) -> bool {
        matches!(self, Error::Job(_))
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let err: Error = DeviceError::Timeout { timeout_ms: 2500 }.into();
        assert!(err.is_timeout());
        assert!(err.is_device_error());
        assert!(!err.is_transport_error());

        let err: Error = TransportError::Closed.into();
        assert!(err.is_transport_error());
        assert_eq!(err.to_string(), "Transport closed");
    }

    #[test]
    fn test_error_messages() {
        let err = DeviceError::CommandTooLong { len: 120, max: 100 };
        assert_eq!(err.to_string(), "Command too long: 120 bytes (max 100)");

        let err: Error = JobError::LineTooLong {
            file_pos: 42,
            max: 100,
        }
        .into();
        assert!(err.is_job_error());
        assert_eq!(err.to_string(), "Line at byte 42 exceeds 100 bytes");
    }
}
