//! Marlin dialect
//!
//! Line-acknowledgment flow control. Every `ok` answers the oldest command
//! still in the counter, so the counter keeps command text and responses
//! are interpreted in the light of the command they answer.

pub mod response_parser;

use self::response_parser::{
    command_code, gcode_words, parse_capabilities, parse_position, parse_temperatures,
    TemperatureReport,
};
use super::{Dialect, FirmwareKind};
use crate::device::{
    DeviceConfig, EngineCore, FirmwareInfo, MarlinTelemetry, Telemetry, MAX_EXTRUDERS,
};
use crate::flow::{Lane, PayloadCounter, SentCounter};
use cncpendant_core::{DeviceStatusEvent, Position, Temperature};

const COLD_EXTRUSION: &str = "echo: cold extrusion prevented";

/// Marlin protocol state
#[derive(Debug)]
pub struct MarlinDialect {
    counter: PayloadCounter,
    info: FirmwareInfo,
    tools: [Temperature; MAX_EXTRUDERS],
    bed: Temperature,
    position: Position,
    extruder_position: f64,
    relative: bool,
    autoreport_interval_s: u32,
}

impl MarlinDialect {
    /// Create a dialect with the configured acknowledgment window
    pub fn new(config: &DeviceConfig) -> Self {
        Self {
            counter: PayloadCounter::new(config.marlin_window.lines, config.marlin_window.bytes),
            info: FirmwareInfo::default(),
            tools: [Temperature::default(); MAX_EXTRUDERS],
            bed: Temperature::default(),
            position: Position::default(),
            extruder_position: 0.0,
            relative: false,
            autoreport_interval_s: config.autoreport_interval_s,
        }
    }

    fn publish(&self, core: &EngineCore) {
        let telemetry = MarlinTelemetry {
            tools: self.tools[..self.info.extruders].to_vec(),
            bed: self.bed,
            extruder_position: self.extruder_position,
            relative: self.relative,
        };
        core.update_snapshot(|s| {
            s.position = self.position;
            s.work_position = self.position;
            s.firmware = self.info.clone();
            s.telemetry = Telemetry::Marlin(telemetry);
        });
        core.notify(DeviceStatusEvent::Changed);
    }

    fn apply_capabilities(&mut self, line: &str) -> bool {
        let report = parse_capabilities(line);
        if report.is_empty() {
            return false;
        }
        let identity_line = report.firmware_name.is_some();
        if let Some(name) = report.firmware_name {
            self.info.description = name;
        }
        if let Some(machine) = report.machine_type {
            self.info.machine_type = machine;
        }
        if identity_line {
            self.info.extruders = report.extruders.unwrap_or(1).clamp(1, MAX_EXTRUDERS);
        }
        if let Some(v) = report.autoreport_temp {
            self.info.autoreport_temp = v;
        }
        if let Some(v) = report.progress {
            self.info.progress = v;
        }
        if let Some(v) = report.build_percent {
            self.info.build_percent = v;
        }
        tracing::debug!(
            "Capabilities: {} ({}), extruders: {}, autotemp: {}, progress: {}, build percent: {}",
            self.info.description,
            self.info.machine_type,
            self.info.extruders,
            self.info.autoreport_temp,
            self.info.progress,
            self.info.build_percent
        );
        true
    }

    fn apply_temperatures(&mut self, report: TemperatureReport) {
        for (i, t) in report.tools {
            if report.actual_only {
                self.tools[i].actual = t.actual;
            } else {
                self.tools[i] = t;
            }
        }
        if let Some(bed) = report.bed {
            if report.actual_only {
                self.bed.actual = bed.actual;
            } else {
                self.bed = bed;
            }
        }
    }

    fn try_temperatures(&mut self, line: &str) -> bool {
        match parse_temperatures(line, self.info.extruders, MAX_EXTRUDERS) {
            Some(report) => {
                self.apply_temperatures(report);
                true
            }
            None => false,
        }
    }

    /// Track position from the text of an acknowledged motion command
    fn apply_motion(&mut self, command: &str) {
        for (letter, value) in gcode_words(command) {
            let current = match letter {
                'X' => &mut self.position.x,
                'Y' => &mut self.position.y,
                'Z' => &mut self.position.z,
                'E' => &mut self.extruder_position,
                _ => continue,
            };
            if self.relative {
                *current += value;
            } else {
                *current = value;
            }
        }
    }

    /// Side effects of an `ok` for `command`; true if state changed
    fn on_acknowledged(&mut self, core: &mut EngineCore, command: &str, line: &str) -> bool {
        if command.starts_with("M105") {
            return self.try_temperatures(line);
        }
        if self.info.autoreport_temp && command.starts_with("M155 S") {
            let interval = gcode_words(command)
                .into_iter()
                .find(|(l, _)| *l == 'S')
                .map_or(0.0, |(_, v)| v);
            self.info.autoreport_enabled = interval != 0.0;
            return true;
        }
        match command_code(command) {
            Some(('G', 0 | 1)) => {
                self.apply_motion(command);
                true
            }
            Some(('G', 90)) => {
                self.relative = false;
                true
            }
            Some(('G', 91)) => {
                self.relative = true;
                true
            }
            Some(('M', 115)) => {
                if self.info.autoreport_temp && self.autoreport_interval_s > 0 {
                    let cmd = format!("M155 S{}", self.autoreport_interval_s);
                    core.enqueue(Lane::Priority, &cmd);
                }
                false
            }
            _ => false,
        }
    }
}

impl Dialect for MarlinDialect {
    fn kind(&self) -> FirmwareKind {
        FirmwareKind::Marlin
    }

    fn counter(&self) -> &dyn SentCounter {
        &self.counter
    }

    fn counter_mut(&mut self) -> &mut dyn SentCounter {
        &mut self.counter
    }

    fn begin(&mut self, core: &mut EngineCore) {
        core.enqueue(Lane::Priority, "M115");
        core.enqueue(Lane::Priority, "M114");
    }

    fn parse_line(&mut self, core: &mut EngineCore, line: &str) {
        let current = self.counter.peek().unwrap_or_default().to_string();

        if line.starts_with("ok") {
            let changed = self.on_acknowledged(core, &current, line);
            core.acknowledge(&mut self.counter);
            core.set_connected(true);
            if changed {
                self.publish(core);
            }
            return;
        }

        if !core.is_connected() {
            tracing::trace!("Discovery noise: {}", line);
            return;
        }

        let capability_line = line.contains("FIRMWARE_NAME") || current.starts_with("M115");
        if capability_line && self.apply_capabilities(line) {
            self.publish(core);
        } else if self.try_temperatures(line) {
            self.publish(core);
        } else if let Some((position, e)) = parse_position(line) {
            self.position = position;
            self.extruder_position = e;
            self.publish(core);
        } else if line.starts_with(COLD_EXTRUSION) {
            core.warn("cold extrusion prevented");
        } else if line.starts_with("Error:") {
            core.fault(&mut self.counter, line);
        } else {
            tracing::trace!("Ignored Marlin line: {}", line);
        }
    }

    fn soft_reset(&mut self, core: &mut EngineCore) {
        core.enqueue(Lane::Priority, "M999");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_motion_tracking() {
        let mut dialect = MarlinDialect::new(&DeviceConfig::default());
        dialect.apply_motion("G1 X10 Y5 E1");
        assert_eq!(dialect.position, Position::new(10.0, 5.0, 0.0));

        dialect.relative = true;
        dialect.apply_motion("G0 F300 X-2.5");
        assert_eq!(dialect.position, Position::new(7.5, 5.0, 0.0));
        assert_eq!(dialect.extruder_position, 1.0);
    }

    #[test]
    fn test_capabilities_accumulate_across_lines() {
        let mut dialect = MarlinDialect::new(&DeviceConfig::default());
        assert!(dialect.apply_capabilities("FIRMWARE_NAME:Marlin MACHINE_TYPE:Printer EXTRUDER_COUNT:9"));
        assert!(dialect.apply_capabilities("Cap:AUTOREPORT_TEMP:1"));
        assert!(!dialect.apply_capabilities("echo:busy: processing"));
        assert_eq!(dialect.info.extruders, MAX_EXTRUDERS);
        assert_eq!(dialect.info.description, "Marlin");
        assert!(dialect.info.autoreport_temp);
    }
}
