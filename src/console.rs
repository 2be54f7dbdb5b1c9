//! Line console on stdin
//!
//! Lines starting with `:` are operator commands; any other non-empty line
//! is scheduled on the device as a normal command. Replies to console
//! commands are mirrored back through the traffic stream.

use anyhow::{anyhow, bail};
use cncpendant_communication::{DeviceHandle, DeviceSnapshot, Session, Telemetry};
use cncpendant_core::{AppEvent, Axis, EventCategory, EventFilter, SenderToken};
use std::path::PathBuf;
use std::sync::Arc;

/// Sender token of lines typed at the console
pub const CONSOLE_SENDER: SenderToken = SenderToken(1);

/// Feed used by `:jog` when none is given, mm/min
pub const DEFAULT_JOG_FEED: f64 = 1000.0;

const HELP: &str = "commands: :load <path> :start :pause :resume :cancel :reset :status \
                    :jog <axis> <distance> [feed] :state :help; anything else is sent as G-code";

/// Parsed console input
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    /// Bind a program file
    Load(PathBuf),
    /// Start the bound program
    Start,
    /// Pause feeding
    Pause,
    /// Resume feeding
    Resume,
    /// Cancel the job
    Cancel,
    /// Reset the device
    Reset,
    /// Poll and print machine state
    Status,
    /// Relative single-axis move
    Jog {
        /// Axis to move
        axis: Axis,
        /// Distance in mm
        distance: f64,
        /// Feed in mm/min
        feed: f64,
    },
    /// Print the operational state
    State,
    /// Print the command list
    Help,
    /// Raw line for the device
    Send(String),
}

impl ConsoleCommand {
    /// Parse one input line; `None` for blank input
    pub fn parse(line: &str) -> anyhow::Result<Option<Self>> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        let Some(rest) = line.strip_prefix(':') else {
            return Ok(Some(ConsoleCommand::Send(line.to_string())));
        };

        let mut words = rest.split_whitespace();
        let name = words.next().unwrap_or_default().to_ascii_lowercase();
        let command = match name.as_str() {
            "load" => {
                let path = rest.trim_start()[name.len()..].trim();
                if path.is_empty() {
                    bail!("usage: :load <path>");
                }
                ConsoleCommand::Load(PathBuf::from(path))
            }
            "start" => ConsoleCommand::Start,
            "pause" => ConsoleCommand::Pause,
            "resume" => ConsoleCommand::Resume,
            "cancel" => ConsoleCommand::Cancel,
            "reset" => ConsoleCommand::Reset,
            "status" => ConsoleCommand::Status,
            "state" => ConsoleCommand::State,
            "help" => ConsoleCommand::Help,
            "jog" => {
                let usage = || anyhow!("usage: :jog <x|y|z> <distance> [feed]");
                let axis = words
                    .next()
                    .and_then(|w| w.chars().next())
                    .and_then(Axis::from_letter)
                    .ok_or_else(usage)?;
                let distance = words
                    .next()
                    .and_then(|w| w.parse::<f64>().ok())
                    .ok_or_else(usage)?;
                let feed = match words.next() {
                    Some(w) => w.parse::<f64>().map_err(|_| usage())?,
                    None => DEFAULT_JOG_FEED,
                };
                if feed <= 0.0 {
                    bail!("jog feed must be > 0");
                }
                ConsoleCommand::Jog {
                    axis,
                    distance,
                    feed,
                }
            }
            other => bail!("unknown command :{}", other),
        };
        Ok(Some(command))
    }
}

/// Executes console commands against a session
pub struct Console {
    session: Arc<Session>,
    max_command_len: usize,
}

impl Console {
    /// Create a console for `session`
    pub fn new(session: Arc<Session>, max_command_len: usize) -> Self {
        Self {
            session,
            max_command_len,
        }
    }

    /// Handle one input line, returning the text to show
    pub fn handle_line(&self, line: &str) -> Option<String> {
        match ConsoleCommand::parse(line) {
            Ok(Some(command)) => Some(self.execute(command)),
            Ok(None) => None,
            Err(e) => Some(e.to_string()),
        }
    }

    fn device(&self) -> anyhow::Result<&DeviceHandle> {
        self.session
            .device()
            .ok_or_else(|| anyhow!("no device yet ({})", self.session.state()))
    }

    /// Run a parsed command
    pub fn execute(&self, command: ConsoleCommand) -> String {
        match self.try_execute(command) {
            Ok(reply) => reply,
            Err(e) => e.to_string(),
        }
    }

    fn try_execute(&self, command: ConsoleCommand) -> anyhow::Result<String> {
        let job = self.session.job();
        let reply = match command {
            ConsoleCommand::Load(path) => {
                if job.is_running() {
                    bail!("a job is running");
                }
                if !job.set_file(&path) {
                    bail!("cannot open {}", path.display());
                }
                format!("loaded {} ({} bytes)", job.file_name(), job.file_size())
            }
            ConsoleCommand::Start => {
                self.device()?;
                if !job.start() {
                    bail!("nothing to start");
                }
                format!("started {}", job.file_name())
            }
            ConsoleCommand::Pause => flag(job.pause(), "paused", "not running"),
            ConsoleCommand::Resume => flag(job.resume(), "resumed", "not paused"),
            ConsoleCommand::Cancel => flag(job.cancel(), "cancelled", "no job"),
            ConsoleCommand::Reset => flag(self.device()?.reset(), "reset requested", "engine gone"),
            ConsoleCommand::Status => {
                let device = self.device()?;
                device.request_status_update(Some(CONSOLE_SENDER));
                describe(&device.snapshot())
            }
            ConsoleCommand::Jog {
                axis,
                distance,
                feed,
            } => flag(
                self.device()?.jog(axis, distance, feed, Some(CONSOLE_SENDER)),
                "jog queued",
                "jog rejected",
            ),
            ConsoleCommand::State => {
                let mut text = self.session.state().to_string();
                if job.is_valid() || job.is_completed() {
                    text.push_str(&format!(
                        " | {} {:.1}%",
                        job.file_name(),
                        job.percentage() * 100.0
                    ));
                }
                if let Some(elapsed) = job.print_duration() {
                    text.push_str(&format!(" | {}s", elapsed.as_secs()));
                }
                text
            }
            ConsoleCommand::Help => HELP.to_string(),
            ConsoleCommand::Send(line) => {
                if line.len() > self.max_command_len {
                    bail!("line longer than {} bytes", self.max_command_len);
                }
                let device = self.device()?;
                let accepted = if line.len() == 1 {
                    device.schedule_priority_command(&line, Some(CONSOLE_SENDER))
                } else {
                    device.schedule_command(&line, Some(CONSOLE_SENDER))
                };
                flag(accepted, "queued", "rejected")
            }
        };
        Ok(reply)
    }
}

fn flag(ok: bool, yes: &str, no: &str) -> String {
    let text = if ok { yes } else { no };
    text.to_string()
}

/// One-line summary of a snapshot
pub fn describe(snapshot: &DeviceSnapshot) -> String {
    let mut text = format!(
        "{} @ {} | {} | queued {} in flight {}",
        snapshot.kind, snapshot.baud, snapshot.position, snapshot.queued, snapshot.in_flight
    );
    match &snapshot.telemetry {
        Telemetry::Grbl(grbl) => {
            if !grbl.status.is_empty() {
                text.push_str(&format!(" | {}", grbl.status));
            }
            text.push_str(&format!(" | F{:.0} S{:.0}", grbl.feed, grbl.spindle));
        }
        Telemetry::Marlin(marlin) => {
            for (i, tool) in marlin.tools.iter().enumerate() {
                text.push_str(&format!(" | T{} {}", i, tool));
            }
            text.push_str(&format!(" | B {}", marlin.bed));
        }
    }
    if !snapshot.last_response.is_empty() {
        text.push_str(&format!(" | last fault: {}", snapshot.last_response));
    }
    text
}

/// Log all traffic and echo answers to console commands on stdout
pub fn mirror_traffic(session: &Session) {
    session.bus().subscribe(
        EventFilter::Categories(vec![EventCategory::Traffic]),
        |event| {
            if let AppEvent::Traffic(line) = event {
                tracing::debug!(target: "traffic", "< {}", line.text);
                if line.sender == Some(CONSOLE_SENDER) {
                    println!("< {}", line.text);
                }
            }
        },
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(ConsoleCommand::parse("   ").unwrap(), None);
        assert_eq!(
            ConsoleCommand::parse("G0 X10").unwrap(),
            Some(ConsoleCommand::Send("G0 X10".to_string()))
        );
        assert_eq!(
            ConsoleCommand::parse(":load /tmp/my part.gcode").unwrap(),
            Some(ConsoleCommand::Load(PathBuf::from("/tmp/my part.gcode")))
        );
        assert_eq!(
            ConsoleCommand::parse(":Pause").unwrap(),
            Some(ConsoleCommand::Pause)
        );
    }

    #[test]
    fn test_parse_jog() {
        assert_eq!(
            ConsoleCommand::parse(":jog y -2.5").unwrap(),
            Some(ConsoleCommand::Jog {
                axis: Axis::Y,
                distance: -2.5,
                feed: DEFAULT_JOG_FEED,
            })
        );
        assert_eq!(
            ConsoleCommand::parse(":jog Z 1 300").unwrap(),
            Some(ConsoleCommand::Jog {
                axis: Axis::Z,
                distance: 1.0,
                feed: 300.0,
            })
        );
        assert!(ConsoleCommand::parse(":jog e 1").is_err());
        assert!(ConsoleCommand::parse(":jog x").is_err());
        assert!(ConsoleCommand::parse(":jog x 1 0").is_err());
    }

    #[test]
    fn test_parse_errors() {
        assert!(ConsoleCommand::parse(":load").is_err());
        assert!(ConsoleCommand::parse(":fly").is_err());
    }

    #[test]
    fn test_commands_need_a_device() {
        let console = Console::new(Arc::new(Session::default()), 100);
        assert_eq!(
            console.handle_line("G0 X1").unwrap(),
            "no device yet (Discovering)"
        );
        assert_eq!(console.handle_line(":state").unwrap(), "Discovering");
        assert_eq!(console.handle_line(":pause").unwrap(), "not running");
    }
}
