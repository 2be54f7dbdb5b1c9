//! Device engine
//!
//! [`Device`] owns the transport, the command queues and the dialect. Each
//! [`Device::tick`] runs, in order: control requests, intake from producer
//! channels, the send phase, the receive phase and the watchdog phase.
//! Later phases rely on state the earlier ones left behind.

use super::config::DeviceConfig;
use super::handle::{Control, DeviceHandle, DeviceShared, Senders};
use super::line_reader::LineAssembler;
use super::snapshot::DeviceSnapshot;
use super::watchdog::Watchdog;
use crate::firmware::{Dialect, FirmwareKind};
use crate::flow::{Command, DualCommandQueue, Lane, SentCounter, SlotBudget};
use cncpendant_core::{
    AppEvent, ByteTransport, DeviceError, DeviceStatusEvent, EventBus, RawLine, TransportError,
};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{self, UnboundedReceiver};

const XON: u8 = 0x11;
const XOFF: u8 = 0x13;

struct Intake {
    normal: UnboundedReceiver<Command>,
    priority: UnboundedReceiver<Command>,
    realtime: UnboundedReceiver<u8>,
    control: UnboundedReceiver<Control>,
}

/// Dialect-independent half of the engine
///
/// Dialects receive it in their callbacks to acknowledge commands, raise
/// faults, enqueue follow-up commands and publish state.
pub struct EngineCore {
    transport: Box<dyn ByteTransport>,
    queue: DualCommandQueue,
    shared: Arc<DeviceShared>,
    intake: Intake,
    bus: Arc<EventBus>,
    watchdog: Watchdog,
    lines: LineAssembler,
    config: DeviceConfig,
    xoff: bool,
    io_error: Option<TransportError>,
    now: Instant,
}

impl EngineCore {
    /// Engine configuration
    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    /// Whether the link is considered alive
    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::Acquire)
    }

    /// Mark the link alive or dead
    pub fn set_connected(&mut self, connected: bool) {
        let was = self.shared.connected.swap(connected, Ordering::AcqRel);
        if was != connected {
            tracing::info!(
                "{} {}",
                self.shared.kind,
                if connected { "connected" } else { "disconnected" }
            );
        }
    }

    /// Whether a protocol fault is active
    pub fn is_in_panic(&self) -> bool {
        self.shared.panic.load(Ordering::Acquire)
    }

    /// Publish a device notification
    pub fn notify(&self, event: DeviceStatusEvent) {
        let _ = self.bus.publish(AppEvent::Device(event));
    }

    /// Mutate the published snapshot
    pub fn update_snapshot(&self, f: impl FnOnce(&mut DeviceSnapshot)) {
        f(&mut *self.shared.snapshot.write());
    }

    /// Retire the oldest outstanding command
    pub fn acknowledge(&mut self, counter: &mut dyn SentCounter) -> Option<Command> {
        counter.pop();
        let (lane, cmd) = self.queue.mark_acknowledged()?;
        self.shared.budget(lane).release(1);
        Some(cmd)
    }

    /// Drop all queued and in-flight work
    ///
    /// Commands still sitting in producer channels are dropped too, and
    /// every slot goes back to the admission budget.
    pub fn flush(&mut self, counter: &mut dyn SentCounter) {
        counter.clear();
        let (priority, normal) = self.queue.clear();
        self.shared.budget(Lane::Priority).release(priority);
        self.shared.budget(Lane::Normal).release(normal);

        while self.intake.priority.try_recv().is_ok() {
            self.shared.budget(Lane::Priority).release(1);
        }
        while self.intake.normal.try_recv().is_ok() {
            self.shared.budget(Lane::Normal).release(1);
        }
        while self.intake.realtime.try_recv().is_ok() {}

        self.watchdog.disarm();
        self.xoff = false;
        tracing::debug!("Flushed command queues");
    }

    /// Protocol fault: panic, flush and notify
    pub fn fault(&mut self, counter: &mut dyn SentCounter, response: &str) {
        let fault = DeviceError::Panic {
            reason: response.to_string(),
        };
        tracing::error!("{}: {}", self.shared.kind, fault);
        self.shared.panic.store(true, Ordering::Release);
        self.flush(counter);
        self.update_snapshot(|s| s.last_response = response.to_string());
        self.notify(DeviceStatusEvent::Failure);
    }

    /// Non-fatal firmware warning
    pub fn warn(&mut self, response: &str) {
        tracing::warn!("{} warning: {}", self.shared.kind, response);
        self.update_snapshot(|s| s.last_response = response.to_string());
        self.notify(DeviceStatusEvent::Failure);
    }

    /// Queue a command generated by the engine itself
    pub fn enqueue(&mut self, lane: Lane, text: &str) -> bool {
        let budget = self.shared.budget(lane);
        if !budget.try_reserve(1) {
            tracing::warn!("No {} slot for internal command {}", lane, text);
            return false;
        }
        let cmd = match lane {
            Lane::Priority => Command::priority(text, None),
            Lane::Normal => Command::new(text, None),
        };
        if !self.queue.push_to(lane, cmd) {
            budget.release(1);
            return false;
        }
        true
    }

    /// Write bytes that bypass the queues
    pub fn write_raw(&mut self, bytes: &[u8]) {
        if let Err(e) = self.transport.write(bytes) {
            self.io_error.get_or_insert(e);
        }
    }

    fn begin(&mut self) {
        match self.transport.drain_input() {
            Ok(n) if n > 0 => tracing::debug!("Discarded {} stale bytes", n),
            Ok(_) => {}
            Err(e) => tracing::warn!("Failed to drain input: {}", e),
        }
        self.lines.clear();
        self.set_connected(true);
        self.notify(DeviceStatusEvent::Changed);
    }

    fn control_phase(&mut self, dialect: &mut dyn Dialect) {
        while let Ok(control) = self.intake.control.try_recv() {
            match control {
                Control::Reset => self.reset(dialect),
            }
        }
    }

    fn reset(&mut self, dialect: &mut dyn Dialect) {
        tracing::info!("Resetting {}", self.shared.kind);
        self.flush(dialect.counter_mut());
        // the reset command takes its slot while producers are still locked out
        dialect.soft_reset(self);
        self.shared.panic.store(false, Ordering::Release);
        self.notify(DeviceStatusEvent::Changed);
    }

    fn intake_phase(&mut self) {
        while let Ok(cmd) = self.intake.priority.try_recv() {
            if !self.queue.push_priority(cmd) {
                tracing::warn!("Priority queue overflow");
                self.shared.budget(Lane::Priority).release(1);
            }
        }
        while let Ok(cmd) = self.intake.normal.try_recv() {
            if !self.queue.push(cmd) {
                tracing::warn!("Normal queue overflow");
                self.shared.budget(Lane::Normal).release(1);
            }
        }
    }

    fn send_phase(&mut self, counter: &mut dyn SentCounter) {
        while let Ok(byte) = self.intake.realtime.try_recv() {
            if self.is_in_panic() {
                continue;
            }
            tracing::trace!("> realtime {:#04x}", byte);
            self.write_raw(&[byte]);
        }

        if self.is_in_panic() || self.xoff {
            return;
        }

        while self.io_error.is_none() {
            let Some(len) = self.queue.peek_unsent().map(Command::len) else {
                break;
            };
            if !counter.can_push(len) || !self.queue.can_send() {
                break;
            }
            let Some(cmd) = self.queue.mark_sent() else {
                break;
            };
            counter.push(cmd.as_str());
            tracing::debug!("> {}", cmd);

            let mut wire = Vec::with_capacity(cmd.len() + 1);
            wire.extend_from_slice(cmd.as_bytes());
            wire.push(b'\n');
            self.write_raw(&wire);
            self.watchdog.arm(self.now);
        }
    }

    fn receive_phase(&mut self, dialect: &mut dyn Dialect) {
        loop {
            let byte = match self.transport.read_byte() {
                Ok(Some(byte)) => byte,
                Ok(None) => break,
                Err(e) => {
                    self.io_error.get_or_insert(e);
                    break;
                }
            };

            if self.config.xon_xoff && (byte == XON || byte == XOFF) {
                self.xoff = byte == XOFF;
                continue;
            }

            if let Some(line) = self.lines.push(byte) {
                self.dispatch(dialect, line);
            }
        }
    }

    fn dispatch(&mut self, dialect: &mut dyn Dialect, line: String) {
        let sender = self.queue.peek_unacknowledged().and_then(Command::sender);
        tracing::debug!("< {}", line);
        let _ = self
            .bus
            .publish(AppEvent::Traffic(RawLine::new(line.as_str(), sender)));

        dialect.parse_line(self, &line);

        if dialect.counter().is_empty() {
            self.watchdog.disarm();
        } else {
            self.watchdog.arm(self.now);
        }
    }

    fn watchdog_phase(&mut self, counter: &mut dyn SentCounter) {
        if !self.watchdog.expired(self.now) {
            return;
        }
        let timeout = DeviceError::Timeout {
            timeout_ms: self.watchdog.timeout().as_millis() as u64,
        };
        tracing::error!("{}: {}", self.shared.kind, timeout);
        self.communication_failure(counter);
    }

    fn communication_failure(&mut self, counter: &mut dyn SentCounter) {
        self.flush(counter);
        self.set_connected(false);
        self.notify(DeviceStatusEvent::Failure);
    }

    fn check_io(&mut self, counter: &mut dyn SentCounter) {
        let Some(e) = self.io_error.take() else {
            return;
        };
        tracing::error!("Transport failure: {}", e);
        if self.is_connected() {
            self.communication_failure(counter);
        } else {
            self.flush(counter);
        }
    }

    fn publish_counts(&self, counter: &dyn SentCounter) {
        let (priority, normal) = self.queue.lens();
        self.update_snapshot(|s| {
            s.queued = priority + normal;
            s.in_flight = counter.size();
            s.free_bytes = counter.free_bytes();
        });
    }
}

/// A detected device: transport, queues and dialect driven by `tick()`
pub struct Device {
    core: EngineCore,
    dialect: Box<dyn Dialect>,
    handle: DeviceHandle,
}

impl Device {
    /// Bind a dialect to a transport already running at `baud`
    pub fn new(
        kind: FirmwareKind,
        transport: Box<dyn ByteTransport>,
        baud: u32,
        config: DeviceConfig,
        bus: Arc<EventBus>,
    ) -> Self {
        let dialect = kind.dialect(&config);

        let (normal_tx, normal_rx) = mpsc::unbounded_channel();
        let (priority_tx, priority_rx) = mpsc::unbounded_channel();
        let (realtime_tx, realtime_rx) = mpsc::unbounded_channel();
        let (control_tx, control_rx) = mpsc::unbounded_channel();

        let shared = Arc::new(DeviceShared {
            kind,
            baud,
            max_command_len: config.command_len_limit(kind),
            panic: AtomicBool::new(false),
            connected: AtomicBool::new(false),
            normal: SlotBudget::new(config.normal_lines.max(1)),
            priority: (config.priority_lines > 0).then(|| SlotBudget::new(config.priority_lines)),
            snapshot: RwLock::new(DeviceSnapshot::new(kind, baud)),
        });

        let handle = DeviceHandle::new(
            shared.clone(),
            Senders {
                normal: normal_tx,
                priority: priority_tx,
                realtime: realtime_tx,
                control: control_tx,
            },
        );

        let core = EngineCore {
            transport,
            queue: DualCommandQueue::new(config.normal_lines.max(1), config.priority_lines, 0),
            shared,
            intake: Intake {
                normal: normal_rx,
                priority: priority_rx,
                realtime: realtime_rx,
                control: control_rx,
            },
            bus,
            watchdog: Watchdog::new(config.watchdog_timeout),
            lines: LineAssembler::new(config.max_response_len),
            config,
            xoff: false,
            io_error: None,
            now: Instant::now(),
        };

        let mut device = Self {
            core,
            dialect,
            handle,
        };
        device.core.publish_counts(device.dialect.counter());
        tracing::info!("{} device bound at {} baud", kind, baud);
        device
    }

    /// Handle for producers
    pub fn handle(&self) -> DeviceHandle {
        self.handle.clone()
    }

    /// Controller family
    pub fn kind(&self) -> FirmwareKind {
        self.dialect.kind()
    }

    /// Whether the link is considered alive
    pub fn is_connected(&self) -> bool {
        self.core.is_connected()
    }

    /// Whether a protocol fault is active
    pub fn is_in_panic(&self) -> bool {
        self.core.is_in_panic()
    }

    /// Whether the receive watchdog is armed
    pub fn is_watchdog_armed(&self) -> bool {
        self.core.watchdog.is_armed()
    }

    /// Arm the receive watchdog with an explicit deadline
    pub fn set_watchdog_deadline(&mut self, deadline: Instant) {
        self.core.watchdog.arm_at(deadline);
    }

    /// Commands held in the queues, both lanes
    pub fn queued(&self) -> usize {
        let (priority, normal) = self.core.queue.lens();
        priority + normal
    }

    /// Lines outstanding inside the firmware
    pub fn in_flight(&self) -> usize {
        self.dialect.counter().size()
    }

    /// Drain stale input, mark connected and query the firmware
    pub fn begin(&mut self) {
        self.core.begin();
        self.dialect.begin(&mut self.core);
        self.settle();
    }

    /// Run one engine cycle
    pub fn tick(&mut self) {
        self.tick_at(Instant::now());
    }

    /// Run one engine cycle against an explicit clock reading
    pub fn tick_at(&mut self, now: Instant) {
        self.core.now = now;
        let dialect = self.dialect.as_mut();

        self.core.control_phase(dialect);
        self.core.intake_phase();
        self.core.send_phase(dialect.counter_mut());
        self.core.check_io(dialect.counter_mut());
        self.core.receive_phase(dialect);
        self.core.check_io(dialect.counter_mut());
        self.core.watchdog_phase(dialect.counter_mut());

        self.settle();
    }

    fn settle(&mut self) {
        self.core.check_io(self.dialect.counter_mut());
        self.core.publish_counts(self.dialect.counter());
    }

    /// Tick until `stop` is set, sleeping `period` between cycles
    pub fn run(mut self, stop: Arc<AtomicBool>, period: Duration) {
        tracing::info!("{} engine running", self.kind());
        while !stop.load(Ordering::Acquire) {
            self.tick();
            std::thread::sleep(period);
        }
        tracing::info!("{} engine stopped", self.kind());
    }
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("kind", &self.kind())
            .field("connected", &self.is_connected())
            .field("panic", &self.is_in_panic())
            .field("queued", &self.queued())
            .field("in_flight", &self.in_flight())
            .finish()
    }
}
