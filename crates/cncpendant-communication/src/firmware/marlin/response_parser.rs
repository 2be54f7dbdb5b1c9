//! Marlin response parsing
//!
//! Pure functions over single response lines:
//! - `M115` capability report fields and `Cap:` flags
//! - `T:` / `T<n>:` / `B:` temperature pairs, and the Prusa heating form
//! - `X: Y: Z: E:` position reports
//! - G-code words of outbound commands, for artificial position tracking

use cncpendant_core::{Position, Temperature};

/// Value of `KEY:` in a capability report
///
/// Values can contain spaces; one ends where the next `KEY:` begins.
pub fn capability_field<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let pattern = format!("{}:", key);
    let start = line.find(&pattern)? + pattern.len();
    let rest = &line[start..];
    let end = match rest.find(':') {
        // back up to the space before the next key
        Some(colon) => rest[..colon].rfind(' ').unwrap_or(rest.len()),
        None => rest.len(),
    };
    let value = rest[..end].trim();
    (!value.is_empty()).then_some(value)
}

/// Capability values carried by one report line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilityReport {
    /// `FIRMWARE_NAME`
    pub firmware_name: Option<String>,
    /// `MACHINE_TYPE`
    pub machine_type: Option<String>,
    /// `EXTRUDER_COUNT`
    pub extruders: Option<usize>,
    /// `Cap:AUTOREPORT_TEMP`
    pub autoreport_temp: Option<bool>,
    /// `Cap:PROGRESS`
    pub progress: Option<bool>,
    /// `Cap:BUILD_PERCENT`
    pub build_percent: Option<bool>,
}

impl CapabilityReport {
    /// Whether the line carried any recognised field
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Parse the fields of one capability report line
pub fn parse_capabilities(line: &str) -> CapabilityReport {
    let flag = |key: &str| capability_field(line, key).map(|v| v == "1");
    CapabilityReport {
        firmware_name: capability_field(line, "FIRMWARE_NAME").map(str::to_string),
        machine_type: capability_field(line, "MACHINE_TYPE").map(str::to_string),
        extruders: capability_field(line, "EXTRUDER_COUNT").and_then(|v| v.parse().ok()),
        autoreport_temp: flag("Cap:AUTOREPORT_TEMP"),
        progress: flag("Cap:PROGRESS"),
        build_percent: flag("Cap:BUILD_PERCENT"),
    }
}

fn is_float(s: &str) -> bool {
    !s.is_empty() && s.parse::<f64>().is_ok()
}

/// Parse `KEY:<actual> /<target>`
pub fn parse_temperature(line: &str, key: &str) -> Option<Temperature> {
    let pattern = format!("{}:", key);
    let mut tokens = line.split_whitespace();
    let value = tokens.find_map(|t| t.strip_prefix(pattern.as_str()))?;

    let (actual, target) = match value.split_once('/') {
        Some((actual, target)) => (actual, target),
        None => (value, tokens.next()?.strip_prefix('/')?),
    };
    if !is_float(actual) || !is_float(target) {
        return None;
    }
    Some(Temperature::new(actual.parse().ok()?, target.parse().ok()?))
}

/// Temperatures found in one line
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemperatureReport {
    /// `(extruder index, temperature)` pairs
    pub tools: Vec<(usize, Temperature)>,
    /// Bed temperature
    pub bed: Option<Temperature>,
    /// Prusa heating form: only actual values were reported
    pub actual_only: bool,
}

impl TemperatureReport {
    /// Whether nothing was found
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty() && self.bed.is_none()
    }
}

/// Parse temperature pairs for a machine with `extruders` hotends
///
/// Single-extruder machines report `T:`; others report `T0:`, `T1:`, ...
/// Falls back to Prusa's `T:<a> E:<n> B:<a>` heating lines.
pub fn parse_temperatures(line: &str, extruders: usize, max_extruders: usize) -> Option<TemperatureReport> {
    let mut report = TemperatureReport::default();
    if extruders <= 1 {
        if let Some(t) = parse_temperature(line, "T") {
            report.tools.push((0, t));
        }
    } else {
        for i in 0..extruders {
            if let Some(t) = parse_temperature(line, &format!("T{}", i)) {
                report.tools.push((i, t));
            }
        }
    }
    report.bed = parse_temperature(line, "B");

    if report.is_empty() {
        report = parse_prusa_heating(line, max_extruders)?;
    }
    Some(report)
}

fn token_value<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    line.split_whitespace()
        .find_map(|t| t.strip_prefix(key))
        .filter(|v| is_float(v))
}

fn parse_prusa_heating(line: &str, max_extruders: usize) -> Option<TemperatureReport> {
    let mut report = TemperatureReport {
        actual_only: true,
        ..Default::default()
    };

    let extruder = token_value(line, "E:").and_then(|v| v.parse::<f64>().ok());
    if let (Some(e), Some(t)) = (extruder, token_value(line, "T:")) {
        let e = e as usize;
        if e < max_extruders {
            report.tools.push((e, Temperature::new(t.parse().ok()?, 0.0)));
        }
    }
    if let Some(b) = token_value(line, "B:") {
        report.bed = Some(Temperature::new(b.parse().ok()?, 0.0));
    }

    (!report.is_empty()).then_some(report)
}

/// Parse a `X:<x> Y:<y> Z:<z> E:<e> ...` position report
///
/// Returns the position and the extruder coordinate; all four are required.
pub fn parse_position(line: &str) -> Option<(Position, f64)> {
    let value = |key: &str| token_value(line, key)?.parse::<f64>().ok();
    let position = Position::new(value("X:")?, value("Y:")?, value("Z:")?);
    Some((position, value("E:")?))
}

/// Letter/number words of a G-code line, up to any `;` comment
pub fn gcode_words(line: &str) -> Vec<(char, f64)> {
    let code = line.split(';').next().unwrap_or_default();
    let mut words = Vec::new();
    let mut chars = code.char_indices().peekable();

    while let Some((start, c)) = chars.next() {
        if !c.is_ascii_alphabetic() {
            continue;
        }
        let from = start + c.len_utf8();
        let mut to = from;
        while let Some(&(i, d)) = chars.peek() {
            if d.is_ascii_digit() || matches!(d, '.' | '-' | '+') {
                to = i + d.len_utf8();
                chars.next();
            } else {
                break;
            }
        }
        if let Ok(value) = code[from..to].parse::<f64>() {
            words.push((c.to_ascii_uppercase(), value));
        }
    }
    words
}

/// First G or M word of a command, e.g. `('G', 1)`
pub fn command_code(line: &str) -> Option<(char, u32)> {
    gcode_words(line)
        .into_iter()
        .find(|(letter, _)| matches!(letter, 'G' | 'M'))
        .map(|(letter, value)| (letter, value as u32))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_fields() {
        let line = "FIRMWARE_NAME:Marlin 2.0.9 (Github) SOURCE_CODE_URL:github.com/MarlinFirmware/Marlin PROTOCOL_VERSION:1.0 MACHINE_TYPE:Ender-3 V2 EXTRUDER_COUNT:1 UUID:cede2a2f";
        assert_eq!(capability_field(line, "FIRMWARE_NAME"), Some("Marlin 2.0.9 (Github)"));
        assert_eq!(capability_field(line, "MACHINE_TYPE"), Some("Ender-3 V2"));
        assert_eq!(capability_field(line, "EXTRUDER_COUNT"), Some("1"));
        assert_eq!(capability_field(line, "UUID"), Some("cede2a2f"));
        assert_eq!(capability_field(line, "Cap:PROGRESS"), None);
    }

    #[test]
    fn test_parse_capabilities() {
        let report = parse_capabilities("FIRMWARE_NAME:Marlin MACHINE_TYPE:Printer EXTRUDER_COUNT:2");
        assert_eq!(report.firmware_name.as_deref(), Some("Marlin"));
        assert_eq!(report.machine_type.as_deref(), Some("Printer"));
        assert_eq!(report.extruders, Some(2));

        let cap = parse_capabilities("Cap:AUTOREPORT_TEMP:1");
        assert_eq!(cap.autoreport_temp, Some(true));
        assert_eq!(parse_capabilities("Cap:PROGRESS:0").progress, Some(false));
        assert!(parse_capabilities("echo:busy: processing").is_empty());
    }

    #[test]
    fn test_parse_temperatures_single() {
        let report = parse_temperatures("ok T:32.8 /0.0 B:31.8 /60.0 T0:32.8 /0.0 @:0 B@:0", 1, 4).unwrap();
        assert_eq!(report.tools, vec![(0, Temperature::new(32.8, 0.0))]);
        assert_eq!(report.bed, Some(Temperature::new(31.8, 60.0)));
        assert!(!report.actual_only);
    }

    #[test]
    fn test_parse_temperatures_multi() {
        let report =
            parse_temperatures(" T:200.0 /200.0 B:60 /60 T0:200.0 /200.0 T1:25.0 /0.0 @:0", 2, 4).unwrap();
        assert_eq!(
            report.tools,
            vec![(0, Temperature::new(200.0, 200.0)), (1, Temperature::new(25.0, 0.0))]
        );
    }

    #[test]
    fn test_parse_prusa_heating() {
        let report = parse_temperatures("T:32.8 E:0 B:31.8", 1, 4).unwrap();
        assert!(report.actual_only);
        assert_eq!(report.tools, vec![(0, Temperature::new(32.8, 0.0))]);
        assert_eq!(report.bed, Some(Temperature::new(31.8, 0.0)));
    }

    #[test]
    fn test_not_temperatures() {
        assert!(parse_temperatures("X:1.00 Y:2.00 Z:3.00 E:0.00 Count X:100", 1, 4).is_none());
        assert!(parse_temperatures("echo:busy: processing", 1, 4).is_none());
    }

    #[test]
    fn test_parse_position() {
        let (pos, e) =
            parse_position("X:-33.00 Y:-10.00 Z:5.00 E:37.95 Count X:-3300 Y:-1000 Z:2000").unwrap();
        assert_eq!(pos, Position::new(-33.0, -10.0, 5.0));
        assert_eq!(e, 37.95);
        assert!(parse_position("X:1.00 Y:2.00 Z:3.00").is_none());
    }

    #[test]
    fn test_gcode_words() {
        assert_eq!(
            gcode_words("G1X10 Y-2.5 F300 ; move"),
            vec![('G', 1.0), ('X', 10.0), ('Y', -2.5), ('F', 300.0)]
        );
        assert_eq!(command_code("G0 F1000 Z0.100"), Some(('G', 0)));
        assert_eq!(command_code("M155 S2"), Some(('M', 155)));
        assert_eq!(command_code("G02 X1 Y1 I1"), Some(('G', 2)));
        assert_eq!(command_code(""), None);
    }
}
