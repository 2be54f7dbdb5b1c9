//! GRBL dialect
//!
//! Character-counting flow control: commands are streamed while their bytes
//! fit the controller's RX buffer, each `ok` frees the oldest line.

pub mod realtime;
pub mod status_parser;

pub use status_parser::{parse_status_report, BufferState, StatusReport};

use super::{Dialect, FirmwareKind};
use crate::device::{DeviceConfig, EngineCore, GrblTelemetry, Telemetry};
use crate::flow::{Lane, LengthCounter, SentCounter};
use cncpendant_core::{DeviceStatusEvent, Position};

/// GRBL protocol state
#[derive(Debug)]
pub struct GrblDialect {
    counter: LengthCounter,
    machine_position: Position,
    telemetry: GrblTelemetry,
}

impl GrblDialect {
    /// Create a dialect with the configured RX window
    pub fn new(config: &DeviceConfig) -> Self {
        Self {
            counter: LengthCounter::new(config.grbl_window.lines, config.grbl_window.bytes),
            machine_position: Position::default(),
            telemetry: GrblTelemetry::default(),
        }
    }

    fn apply_status(&mut self, report: StatusReport) {
        self.telemetry.status = report.state;
        if let Some(wco) = report.work_offset {
            self.telemetry.work_offset = wco;
        }
        if let Some(mpos) = report.machine_position {
            self.machine_position = mpos;
        } else if let Some(wpos) = report.work_position {
            self.machine_position = wpos.offset_by(&self.telemetry.work_offset);
        }
        if let Some(feed) = report.feed {
            self.telemetry.feed = feed;
        }
        if let Some(spindle) = report.spindle {
            self.telemetry.spindle = spindle;
        }
        if let Some(overrides) = report.overrides {
            self.telemetry.overrides = overrides;
        }
        if report.buffer.is_some() {
            self.telemetry.buffer = report.buffer;
        }
    }

    fn publish(&self, core: &EngineCore) {
        let position = self.machine_position;
        let work = position.relative_to(&self.telemetry.work_offset);
        core.update_snapshot(|s| {
            s.position = position;
            s.work_position = work;
            s.telemetry = Telemetry::Grbl(self.telemetry.clone());
        });
        core.notify(DeviceStatusEvent::Changed);
    }
}

impl Dialect for GrblDialect {
    fn kind(&self) -> FirmwareKind {
        FirmwareKind::Grbl
    }

    fn counter(&self) -> &dyn SentCounter {
        &self.counter
    }

    fn counter_mut(&mut self) -> &mut dyn SentCounter {
        &mut self.counter
    }

    fn begin(&mut self, core: &mut EngineCore) {
        core.enqueue(Lane::Priority, "$I");
        core.write_raw(&[realtime::STATUS_REPORT]);
    }

    fn parse_line(&mut self, core: &mut EngineCore, line: &str) {
        if line.starts_with("ok") {
            core.acknowledge(&mut self.counter);
            core.set_connected(true);
        } else if line.starts_with("error") || line.starts_with("ALARM:") {
            core.acknowledge(&mut self.counter);
            core.fault(&mut self.counter, line);
        } else if line.starts_with('<') {
            match parse_status_report(line) {
                Some(report) => {
                    self.apply_status(report);
                    self.publish(core);
                }
                None => tracing::debug!("Unparseable status report: {}", line),
            }
        } else if let Some(msg) = line.strip_prefix("[MSG:") {
            let msg = msg.trim_end_matches(']').to_string();
            tracing::info!("GRBL message: {}", msg);
            core.update_snapshot(|s| s.last_message = msg);
            core.notify(DeviceStatusEvent::Changed);
        } else if let Some(version) = line.strip_prefix("[VER:") {
            let version = version.trim_end_matches(']').to_string();
            core.update_snapshot(|s| s.firmware.description = format!("Grbl {}", version));
            core.notify(DeviceStatusEvent::Changed);
        } else if let Some(options) = line.strip_prefix("[OPT:") {
            let options = options.trim_end_matches(']').to_string();
            core.update_snapshot(|s| s.firmware.options = options);
        } else {
            tracing::trace!("Ignored GRBL line: {}", line);
        }
    }

    fn soft_reset(&mut self, core: &mut EngineCore) {
        core.write_raw(&[realtime::SOFT_RESET]);
    }
}
