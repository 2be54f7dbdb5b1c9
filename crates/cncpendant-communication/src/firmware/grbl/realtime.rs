//! GRBL realtime control bytes
//!
//! Picked out of the input stream by GRBL as soon as they arrive; they take
//! no space in its line buffer and are never acknowledged.

/// Status report query
pub const STATUS_REPORT: u8 = b'?';
/// Cycle start / resume
pub const CYCLE_START: u8 = b'~';
/// Feed hold
pub const FEED_HOLD: u8 = b'!';
/// Soft reset (Ctrl-X)
pub const SOFT_RESET: u8 = 0x18;
/// Safety door
pub const SAFETY_DOOR: u8 = 0x84;
/// Jog cancel
pub const JOG_CANCEL: u8 = 0x85;
/// Toggle spindle stop during feed hold
pub const SPINDLE_STOP: u8 = 0x9E;
/// Toggle flood coolant
pub const COOLANT_FLOOD: u8 = 0xA0;
/// Toggle mist coolant
pub const COOLANT_MIST: u8 = 0xA1;
/// First feed/rapid/spindle override byte
pub const OVERRIDE_FIRST: u8 = 0x90;
/// Last feed/rapid/spindle override byte
pub const OVERRIDE_LAST: u8 = 0x9D;

/// Whether `byte` is on the realtime allow-list
pub fn is_realtime(byte: u8) -> bool {
    matches!(
        byte,
        STATUS_REPORT
            | CYCLE_START
            | FEED_HOLD
            | SOFT_RESET
            | SAFETY_DOOR
            | JOG_CANCEL
            | SPINDLE_STOP
            | COOLANT_FLOOD
            | COOLANT_MIST
    ) || (OVERRIDE_FIRST..=OVERRIDE_LAST).contains(&byte)
}
