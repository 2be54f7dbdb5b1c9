//! Producer-side access to a running device engine
//!
//! A [`DeviceHandle`] is cheap to clone and safe to use from any thread.
//! Scheduling reserves queue slots up front, so a `true` return means the
//! command is already counted against the queue and will be transmitted.

use super::snapshot::DeviceSnapshot;
use crate::firmware::{FirmwareKind, Outgoing};
use crate::flow::{Command, Lane, SlotBudget};
use cncpendant_core::{Axis, DeviceError, Position, SenderToken};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

/// Anything a job can feed lines into
pub trait CommandSink {
    /// Whether a line of `len` bytes would be accepted now
    fn can_schedule(&self, len: usize) -> bool;

    /// Enqueue a normal-priority line
    fn schedule_command(&self, line: &str, sender: Option<SenderToken>) -> bool;
}

/// Out-of-band requests to the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Control {
    Reset,
}

/// State shared between the engine and its handles
#[derive(Debug)]
pub(crate) struct DeviceShared {
    pub(crate) kind: FirmwareKind,
    pub(crate) baud: u32,
    pub(crate) max_command_len: usize,
    pub(crate) panic: AtomicBool,
    pub(crate) connected: AtomicBool,
    pub(crate) normal: SlotBudget,
    pub(crate) priority: Option<SlotBudget>,
    pub(crate) snapshot: RwLock<DeviceSnapshot>,
}

impl DeviceShared {
    /// Budget backing a lane; priority falls back to normal without a lane
    pub(crate) fn budget(&self, lane: Lane) -> &SlotBudget {
        match (lane, self.priority.as_ref()) {
            (Lane::Priority, Some(budget)) => budget,
            _ => &self.normal,
        }
    }
}

/// Producer channels into the engine
#[derive(Debug, Clone)]
pub(crate) struct Senders {
    pub(crate) normal: UnboundedSender<Command>,
    pub(crate) priority: UnboundedSender<Command>,
    pub(crate) realtime: UnboundedSender<u8>,
    pub(crate) control: UnboundedSender<Control>,
}

/// Clonable handle to a device engine
#[derive(Debug, Clone)]
pub struct DeviceHandle {
    shared: Arc<DeviceShared>,
    tx: Senders,
}

impl DeviceHandle {
    pub(crate) fn new(shared: Arc<DeviceShared>, tx: Senders) -> Self {
        Self { shared, tx }
    }

    /// Controller family
    pub fn kind(&self) -> FirmwareKind {
        self.shared.kind
    }

    /// Line speed the device was detected at
    pub fn baud(&self) -> u32 {
        self.shared.baud
    }

    /// Whether the engine considers the link alive
    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::Acquire)
    }

    /// Whether a protocol fault is blocking all scheduling
    pub fn is_in_panic(&self) -> bool {
        self.shared.panic.load(Ordering::Acquire)
    }

    /// Copy of the published machine state
    pub fn snapshot(&self) -> DeviceSnapshot {
        self.shared.snapshot.read().clone()
    }

    /// Last known machine position
    pub fn position(&self) -> Position {
        self.shared.snapshot.read().position
    }

    /// Lines outstanding inside the firmware
    pub fn in_flight(&self) -> usize {
        self.shared.snapshot.read().in_flight
    }

    /// Free normal-lane slots
    pub fn free_slots(&self) -> usize {
        self.shared.normal.free()
    }

    /// Free slots in the lane priority commands land in
    pub fn priority_free_slots(&self) -> usize {
        self.shared.budget(Lane::Priority).free()
    }

    /// Commands reserved and not yet acknowledged, both lanes
    pub fn pending(&self) -> usize {
        self.shared.normal.used() + self.shared.priority.as_ref().map_or(0, SlotBudget::used)
    }

    fn check_line(&self, line: &str) -> Result<(), DeviceError> {
        let max = self.shared.max_command_len;
        match line.len() {
            0 => Err(DeviceError::EmptyCommand),
            len if len > max => Err(DeviceError::CommandTooLong { len, max }),
            _ => Ok(()),
        }
    }

    /// Why a batch of lines cannot be scheduled right now, if it cannot
    fn admission(&self, lane: Lane, lines: &[String]) -> Result<(), DeviceError> {
        if self.is_in_panic() {
            return Err(DeviceError::Panic {
                reason: self.shared.snapshot.read().last_response.clone(),
            });
        }
        lines.iter().try_for_each(|line| self.check_line(line))?;
        if self.shared.budget(lane).free() < lines.len() {
            return Err(DeviceError::QueueFull {
                lane: lane.to_string(),
            });
        }
        Ok(())
    }

    fn channel(&self, lane: Lane) -> &UnboundedSender<Command> {
        match lane {
            Lane::Priority => &self.tx.priority,
            Lane::Normal => &self.tx.normal,
        }
    }

    /// Reserve slots for all lines at once and hand them to the engine
    fn schedule_lines(&self, lane: Lane, lines: &[String], sender: Option<SenderToken>) -> bool {
        if lines.is_empty() {
            return false;
        }
        if let Err(e) = self.admission(lane, lines) {
            tracing::debug!("Rejected {:?}: {}", lines, e);
            return false;
        }

        // free() is only a hint; the reservation is authoritative
        let budget = self.shared.budget(lane);
        if !budget.try_reserve(lines.len()) {
            return false;
        }

        for (i, line) in lines.iter().enumerate() {
            let cmd = match lane {
                Lane::Priority => Command::priority(line, sender),
                Lane::Normal => Command::new(line, sender),
            };
            if self.channel(lane).send(cmd).is_err() {
                tracing::warn!("Device engine is gone; dropping {} command(s)", lines.len() - i);
                budget.release(lines.len() - i);
                return false;
            }
        }
        true
    }

    /// Enqueue a normal-priority line
    ///
    /// False if the device is in panic, the line is empty or too long, or
    /// the normal lane is full.
    pub fn schedule_command(&self, line: &str, sender: Option<SenderToken>) -> bool {
        self.schedule_lines(Lane::Normal, &[line.to_string()], sender)
    }

    /// Enqueue a priority line; single realtime bytes bypass the queue
    pub fn schedule_priority_command(&self, line: &str, sender: Option<SenderToken>) -> bool {
        if let [byte] = line.as_bytes() {
            if self.kind().is_realtime(*byte) {
                return self.schedule_realtime(*byte);
            }
        }
        self.schedule_lines(Lane::Priority, &[line.to_string()], sender)
    }

    /// Write a realtime control byte on the next tick
    ///
    /// False for bytes the dialect does not treat as realtime.
    pub fn schedule_realtime(&self, byte: u8) -> bool {
        if self.is_in_panic() || !self.kind().is_realtime(byte) {
            return false;
        }
        self.tx.realtime.send(byte).is_ok()
    }

    /// Whether a normal line of `len` bytes would be accepted now
    pub fn can_schedule(&self, len: usize) -> bool {
        !self.is_in_panic()
            && len > 0
            && len <= self.shared.max_command_len
            && self.shared.normal.free() > 0
    }

    /// Move one axis relative to its current position
    ///
    /// Either every line of the dialect's jog sequence is queued or none.
    pub fn jog(&self, axis: Axis, distance: f64, feed: f64, sender: Option<SenderToken>) -> bool {
        let lines = self.kind().jog_lines(axis, distance, feed);
        self.schedule_lines(Lane::Priority, &lines, sender)
    }

    /// Poll position and telemetry
    pub fn request_status_update(&self, sender: Option<SenderToken>) -> bool {
        let autoreport = self.shared.snapshot.read().firmware.autoreport_enabled;
        let mut lines = Vec::new();
        for item in self.kind().status_request(autoreport) {
            match item {
                Outgoing::Realtime(byte) => {
                    if !self.schedule_realtime(byte) {
                        return false;
                    }
                }
                Outgoing::Line(line) => lines.push(line),
            }
        }
        lines.is_empty() || self.schedule_lines(Lane::Priority, &lines, sender)
    }

    /// Flush everything, clear panic and soft-reset the firmware
    ///
    /// Takes effect at the start of the engine's next tick.
    pub fn reset(&self) -> bool {
        self.tx.control.send(Control::Reset).is_ok()
    }
}

impl CommandSink for DeviceHandle {
    fn can_schedule(&self, len: usize) -> bool {
        DeviceHandle::can_schedule(self, len)
    }

    fn schedule_command(&self, line: &str, sender: Option<SenderToken>) -> bool {
        DeviceHandle::schedule_command(self, line, sender)
    }
}
