//! Device engine configuration

use crate::firmware::FirmwareKind;
use crate::flow::{LINE_OVERHEAD, MAX_COMMAND_LEN};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Size of the firmware's receive window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterLimits {
    /// Lines the firmware accepts before acknowledging
    pub lines: usize,
    /// Bytes the firmware accepts before acknowledging, terminators included
    pub bytes: usize,
}

impl CounterLimits {
    /// Create limits
    pub const fn new(lines: usize, bytes: usize) -> Self {
        Self { lines, bytes }
    }

    /// Longest line that fits the window with its terminator
    pub fn max_line_len(&self) -> usize {
        self.bytes.saturating_sub(LINE_OVERHEAD)
    }
}

/// Device engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Normal lane capacity in commands
    pub normal_lines: usize,
    /// Priority lane capacity in commands (0 routes priority to normal)
    pub priority_lines: usize,
    /// Receive watchdog timeout
    pub watchdog_timeout: Duration,
    /// GRBL receive window (128-byte RX buffer)
    pub grbl_window: CounterLimits,
    /// Marlin receive window
    pub marlin_window: CounterLimits,
    /// Honour XON/XOFF from the firmware
    pub xon_xoff: bool,
    /// Longest accepted command line
    pub max_command_len: usize,
    /// Marlin temperature autoreport interval in seconds (0 = off)
    pub autoreport_interval_s: u32,
    /// Received lines are truncated to this many bytes
    pub max_response_len: usize,
}

impl DeviceConfig {
    /// Receive window of the given dialect
    pub fn window(&self, kind: FirmwareKind) -> CounterLimits {
        match kind {
            FirmwareKind::Grbl => self.grbl_window,
            FirmwareKind::Marlin => self.marlin_window,
        }
    }

    /// Longest command the dialect can ever transmit
    ///
    /// A longer line would never fit the receive window and would block
    /// the queue head forever.
    pub fn command_len_limit(&self, kind: FirmwareKind) -> usize {
        self.max_command_len.min(self.window(kind).max_line_len())
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            normal_lines: 16,
            priority_lines: 4,
            watchdog_timeout: Duration::from_millis(2500),
            grbl_window: CounterLimits::new(32, 127),
            marlin_window: CounterLimits::new(4, 384),
            xon_xoff: false,
            max_command_len: MAX_COMMAND_LEN,
            autoreport_interval_s: 2,
            max_response_len: 200,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_len_limited_by_window() {
        let config = DeviceConfig::default();
        assert_eq!(config.command_len_limit(FirmwareKind::Grbl), MAX_COMMAND_LEN);

        let config = DeviceConfig {
            grbl_window: CounterLimits::new(32, 40),
            ..Default::default()
        };
        assert_eq!(config.command_len_limit(FirmwareKind::Grbl), 39);
        assert_eq!(config.command_len_limit(FirmwareKind::Marlin), MAX_COMMAND_LEN);
    }
}
