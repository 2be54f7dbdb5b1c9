//! GRBL Status Report Parsing
//!
//! Parses `<State|Field:value|...>` realtime status reports: machine or work
//! position, work coordinate offsets, feed/spindle, buffer state and
//! overrides. Unknown fields are skipped.

use cncpendant_core::{OverrideState, Position};
use serde::{Deserialize, Serialize};

/// Planner and serial buffer availability (`Bf:`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferState {
    /// Free planner blocks
    pub planner_blocks: u16,
    /// Free bytes in the serial RX buffer
    pub rx_bytes: u16,
}

impl BufferState {
    fn parse(s: &str) -> Option<Self> {
        let (plan, rx) = s.split_once(',')?;
        Some(Self {
            planner_blocks: plan.trim().parse().ok()?,
            rx_bytes: rx.trim().parse().ok()?,
        })
    }
}

/// Fields of one status report; absent fields are `None`
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StatusReport {
    /// Machine state text (`Idle`, `Run`, `Hold:0`, ...)
    pub state: String,
    /// `MPos:` machine position
    pub machine_position: Option<Position>,
    /// `WPos:` work position
    pub work_position: Option<Position>,
    /// `WCO:` work coordinate offset
    pub work_offset: Option<Position>,
    /// `F:` or first half of `FS:`
    pub feed: Option<f64>,
    /// Second half of `FS:`
    pub spindle: Option<f64>,
    /// `Bf:`
    pub buffer: Option<BufferState>,
    /// `Ov:`
    pub overrides: Option<OverrideState>,
}

fn parse_overrides(s: &str) -> Option<OverrideState> {
    let mut parts = s.split(',').map(|p| p.trim().parse::<u16>());
    Some(OverrideState {
        feed: parts.next()?.ok()?,
        rapid: parts.next()?.ok()?,
        spindle: parts.next()?.ok()?,
    })
}

/// Parse a status report line; `None` if it is not one
pub fn parse_status_report(line: &str) -> Option<StatusReport> {
    let body = line.trim().strip_prefix('<')?;
    let body = body.strip_suffix('>').unwrap_or(body);

    let mut fields = body.split('|');
    let mut report = StatusReport {
        state: fields.next()?.to_string(),
        ..Default::default()
    };

    for field in fields {
        if let Some(v) = field.strip_prefix("MPos:") {
            report.machine_position = Position::parse_csv(v);
        } else if let Some(v) = field.strip_prefix("WPos:") {
            report.work_position = Position::parse_csv(v);
        } else if let Some(v) = field.strip_prefix("WCO:") {
            report.work_offset = Position::parse_csv(v);
        } else if let Some(v) = field.strip_prefix("FS:") {
            let mut parts = v.split(',');
            report.feed = parts.next().and_then(|p| p.trim().parse().ok());
            report.spindle = parts.next().and_then(|p| p.trim().parse().ok());
        } else if let Some(v) = field.strip_prefix("F:") {
            report.feed = v.trim().parse().ok();
        } else if let Some(v) = field.strip_prefix("Bf:") {
            report.buffer = BufferState::parse(v);
        } else if let Some(v) = field.strip_prefix("Ov:") {
            report.overrides = parse_overrides(v);
        }
    }

    Some(report)
}
