//! Pendant session
//!
//! Owns what the rest of the program shares: the event bus, the one device
//! registration slot, and the job. Built once at startup and passed to
//! whoever needs it.

use crate::device::DeviceHandle;
use crate::job::{Job, JobConfig};
use cncpendant_core::{DeviceError, EventBus};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Summary state shown to operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationalState {
    /// No device detected yet
    Discovering,
    /// Device in panic
    Error,
    /// Device not responding
    Offline,
    /// Job paused
    Paused,
    /// Job feeding
    Printing,
    /// Job cancelled, firmware still working off sent lines
    Cancelling,
    /// Job cancelled
    Cancelled,
    /// Ready
    Operational,
}

impl OperationalState {
    /// Derive the state from the device and the job, first match wins
    pub fn evaluate(device: Option<&DeviceHandle>, job: &Job) -> Self {
        let Some(device) = device else {
            return OperationalState::Discovering;
        };
        if device.is_in_panic() {
            OperationalState::Error
        } else if !device.is_connected() {
            OperationalState::Offline
        } else if job.is_paused() {
            OperationalState::Paused
        } else if job.is_running() {
            OperationalState::Printing
        } else if job.is_cancelled() {
            if device.in_flight() == 0 {
                OperationalState::Cancelled
            } else {
                OperationalState::Cancelling
            }
        } else {
            OperationalState::Operational
        }
    }
}

impl fmt::Display for OperationalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            OperationalState::Discovering => "Discovering",
            OperationalState::Error => "Error",
            OperationalState::Offline => "Offline",
            OperationalState::Paused => "Paused",
            OperationalState::Printing => "Printing",
            OperationalState::Cancelling => "Cancelling",
            OperationalState::Cancelled => "Cancelled",
            OperationalState::Operational => "Operational",
        };
        f.write_str(text)
    }
}

/// Shared pendant context
pub struct Session {
    bus: Arc<EventBus>,
    device: OnceLock<DeviceHandle>,
    job: Job,
}

impl Session {
    /// Create a session with a fresh event bus
    pub fn new(job_config: JobConfig) -> Self {
        Self::with_bus(Arc::new(EventBus::new()), job_config)
    }

    /// Create a session around an existing bus
    pub fn with_bus(bus: Arc<EventBus>, job_config: JobConfig) -> Self {
        Self {
            job: Job::new(job_config, bus.clone()),
            bus,
            device: OnceLock::new(),
        }
    }

    /// Event bus shared by the device and the job
    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// The job
    pub fn job(&self) -> &Job {
        &self.job
    }

    /// The registered device, `None` while discovering
    pub fn device(&self) -> Option<&DeviceHandle> {
        self.device.get()
    }

    /// Register the detected device; only the first call succeeds
    pub fn register_device(&self, handle: DeviceHandle) -> Result<(), DeviceError> {
        let kind = handle.kind();
        self.device
            .set(handle)
            .map_err(|_| DeviceError::AlreadyRegistered)?;
        self.job.watch_device_failures();
        tracing::info!("Registered {} device", kind);
        Ok(())
    }

    /// Feed the job into the registered device
    pub fn tick_job(&self) {
        if let Some(device) = self.device() {
            self.job.tick(device);
        }
    }

    /// Current operational state
    pub fn state(&self) -> OperationalState {
        OperationalState::evaluate(self.device(), &self.job)
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(JobConfig::default())
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("device", &self.device().map(DeviceHandle::kind))
            .field("job", &self.job)
            .field("state", &self.state())
            .finish()
    }
}
