//! Firmware detection
//!
//! Probes a transport at each candidate speed with each dialect's query and
//! waits for that dialect's signature. The search never gives up on its own;
//! the caller's `should_stop` predicate is the only way out without a match.

use super::FirmwareKind;
use crate::device::{Device, DeviceConfig};
use cncpendant_core::{ByteTransport, EventBus};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Detection settings
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorConfig {
    /// Candidate speeds, most popular first
    pub baud_rates: Vec<u32>,
    /// Dialects probed at each speed, in order
    pub dialects: Vec<FirmwareKind>,
    /// Tried once before the candidate loop
    pub preferred: Option<(u32, FirmwareKind)>,
    /// Longest wait for a probe answer
    pub probe_timeout: Duration,
    /// Stop reading once the line has been silent this long after data arrived
    pub quiet_timeout: Duration,
    /// Probes per (speed, dialect) attempt
    pub retries: u32,
    /// Sleep between reads while waiting
    pub poll_interval: Duration,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            baud_rates: vec![115200, 250000, 57600],
            dialects: FirmwareKind::ALL.to_vec(),
            preferred: Some((250000, FirmwareKind::Marlin)),
            probe_timeout: Duration::from_millis(1000),
            quiet_timeout: Duration::from_millis(200),
            retries: 2,
            poll_interval: Duration::from_millis(1),
        }
    }
}

/// A confirmed match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Detection {
    /// Dialect that answered
    pub kind: FirmwareKind,
    /// Speed it answered at
    pub baud: u32,
}

/// Finds which firmware is on the other end of a transport
#[derive(Debug, Clone, Default)]
pub struct DeviceDetector {
    config: DetectorConfig,
}

impl DeviceDetector {
    /// Create a detector
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    /// Detection settings
    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Read until the signature shows up, the line goes quiet or time runs out
    fn read_answer<T: ByteTransport + ?Sized>(&self, transport: &mut T, signature: &str) -> String {
        let start = Instant::now();
        let mut last_data: Option<Instant> = None;
        let mut answer = Vec::new();

        loop {
            let now = Instant::now();
            if now.duration_since(start) >= self.config.probe_timeout {
                break;
            }
            if last_data.is_some_and(|t| now.duration_since(t) >= self.config.quiet_timeout) {
                break;
            }

            match transport.read_byte() {
                Ok(Some(byte)) => {
                    answer.push(byte);
                    last_data = Some(now);
                    if byte == b'\n' && String::from_utf8_lossy(&answer).contains(signature) {
                        break;
                    }
                }
                Ok(None) => std::thread::sleep(self.config.poll_interval),
                Err(e) => {
                    tracing::debug!("Read failed while probing: {}", e);
                    break;
                }
            }
        }

        String::from_utf8_lossy(&answer).into_owned()
    }

    /// One (speed, dialect) attempt, with retries
    pub fn attempt<T: ByteTransport + ?Sized>(
        &self,
        transport: &mut T,
        baud: u32,
        kind: FirmwareKind,
    ) -> bool {
        if let Err(e) = transport.set_baud(baud) {
            tracing::warn!("Cannot probe at {} baud: {}", baud, e);
            return false;
        }

        for retry in 0..self.config.retries.max(1) {
            tracing::debug!("Probe {} at {} baud, attempt {}", kind, baud, retry + 1);
            if let Err(e) = transport.drain_input() {
                tracing::debug!("Drain failed while probing: {}", e);
            }
            if let Err(e) = transport.write(kind.probe()) {
                tracing::warn!("Probe write failed: {}", e);
                return false;
            }

            let answer = self.read_answer(transport, kind.signature());
            tracing::trace!("Probe answer: {:?}", answer);
            if answer.contains(kind.signature()) {
                tracing::info!("Detected {} at {} baud", kind, baud);
                return true;
            }
        }
        false
    }

    /// Search until a firmware answers or `should_stop` returns true
    pub fn detect<T, F>(&self, transport: &mut T, mut should_stop: F) -> Option<Detection>
    where
        T: ByteTransport + ?Sized,
        F: FnMut() -> bool,
    {
        if let Some((baud, kind)) = self.config.preferred {
            if should_stop() {
                return None;
            }
            if self.attempt(transport, baud, kind) {
                return Some(Detection { kind, baud });
            }
        }

        if self.config.baud_rates.is_empty() || self.config.dialects.is_empty() {
            tracing::error!("No detection candidates configured");
            return None;
        }

        loop {
            for &baud in &self.config.baud_rates {
                for &kind in &self.config.dialects {
                    if should_stop() {
                        tracing::info!("Detection stopped");
                        return None;
                    }
                    if self.attempt(transport, baud, kind) {
                        return Some(Detection { kind, baud });
                    }
                }
            }
        }
    }

    /// Detect and bind an engine to the transport
    pub fn detect_device<F>(
        &self,
        mut transport: Box<dyn ByteTransport>,
        device_config: DeviceConfig,
        bus: Arc<EventBus>,
        should_stop: F,
    ) -> Option<Device>
    where
        F: FnMut() -> bool,
    {
        let found = self.detect(transport.as_mut(), should_stop)?;
        Some(Device::new(
            found.kind,
            transport,
            found.baud,
            device_config,
            bus,
        ))
    }
}
