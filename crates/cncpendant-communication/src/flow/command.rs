//! Outbound command line

use cncpendant_core::SenderToken;
use std::fmt;
use std::sync::Arc;

/// Maximum length of one command line, terminator excluded
pub const MAX_COMMAND_LEN: usize = 100;

/// Bytes added on the wire per line (the `\n` terminator)
pub const LINE_OVERHEAD: usize = 1;

/// One command line scheduled for the firmware
///
/// Cloning is cheap; the text is shared between the queue slot and the
/// copy handed to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    text: Arc<str>,
    priority: bool,
    sender: Option<SenderToken>,
}

impl Command {
    /// Create a normal-priority command
    pub fn new(text: impl AsRef<str>, sender: Option<SenderToken>) -> Self {
        Self {
            text: Arc::from(text.as_ref()),
            priority: false,
            sender,
        }
    }

    /// Create a priority command (jogs, status polls, control)
    pub fn priority(text: impl AsRef<str>, sender: Option<SenderToken>) -> Self {
        Self {
            priority: true,
            ..Self::new(text, sender)
        }
    }

    /// Command text
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Command bytes, terminator excluded
    pub fn as_bytes(&self) -> &[u8] {
        self.text.as_bytes()
    }

    /// Length in bytes, terminator excluded
    pub fn len(&self) -> usize {
        self.text.len()
    }

    /// Whether the command has no text
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Whether the command was scheduled on the priority lane
    pub fn is_priority(&self) -> bool {
        self.priority
    }

    /// Token of whoever scheduled the command
    pub fn sender(&self) -> Option<SenderToken> {
        self.sender
    }

    /// Whether the text begins with `prefix`
    pub fn starts_with(&self, prefix: &str) -> bool {
        self.text.starts_with(prefix)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_accessors() {
        let cmd = Command::priority("G91", Some(SenderToken(3)));
        assert!(cmd.is_priority());
        assert_eq!(cmd.len(), 3);
        assert_eq!(cmd.sender(), Some(SenderToken(3)));
        assert!(cmd.starts_with("G9"));
        assert!(!Command::new("G1", None).is_priority());
        assert!(Command::new("", None).is_empty());
    }
}
