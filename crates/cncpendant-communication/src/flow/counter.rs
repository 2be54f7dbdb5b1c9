//! Sent-command counters
//!
//! Track how many lines and bytes are outstanding inside the firmware's
//! receive buffer. Each outstanding line costs its length plus the
//! terminator. Lines are retired oldest-first, one per acknowledgment.

use super::command::LINE_OVERHEAD;
use std::collections::VecDeque;

/// Accounting of lines sent but not yet acknowledged
pub trait SentCounter: Send {
    /// Line capacity of the firmware buffer
    fn capacity_lines(&self) -> usize;

    /// Byte capacity of the firmware buffer
    fn capacity_bytes(&self) -> usize;

    /// Lines outstanding
    fn size(&self) -> usize;

    /// Bytes outstanding, terminators included
    fn bytes(&self) -> usize;

    /// Record a line as sent; false if it does not fit
    fn push(&mut self, line: &str) -> bool;

    /// Retire the oldest line, returning the bytes it gave back
    ///
    /// Only the cost is common to both counters; [`PayloadCounter::pop_line`]
    /// also hands back the text.
    fn pop(&mut self) -> Option<usize>;

    /// Text of the oldest line, if the counter retains payloads
    fn peek(&self) -> Option<&str> {
        None
    }

    /// Forget everything outstanding
    fn clear(&mut self);

    /// Lines that could still be pushed
    fn free_lines(&self) -> usize {
        self.capacity_lines().saturating_sub(self.size())
    }

    /// Bytes that could still be pushed
    fn free_bytes(&self) -> usize {
        self.capacity_bytes().saturating_sub(self.bytes())
    }

    /// Whether a line of `len` bytes (terminator excluded) fits
    fn can_push(&self, len: usize) -> bool {
        self.free_lines() > 0 && self.free_bytes() >= len + LINE_OVERHEAD
    }

    /// Whether nothing is outstanding
    fn is_empty(&self) -> bool {
        self.size() == 0
    }
}

/// Counter that keeps only line lengths
///
/// Used where responses never need to be matched against the command text.
#[derive(Debug, Clone)]
pub struct LengthCounter {
    lengths: VecDeque<usize>,
    bytes: usize,
    capacity_lines: usize,
    capacity_bytes: usize,
}

impl LengthCounter {
    /// Create a counter for a firmware buffer of the given size
    pub fn new(capacity_lines: usize, capacity_bytes: usize) -> Self {
        Self {
            lengths: VecDeque::with_capacity(capacity_lines),
            bytes: 0,
            capacity_lines,
            capacity_bytes,
        }
    }
}

impl SentCounter for LengthCounter {
    fn capacity_lines(&self) -> usize {
        self.capacity_lines
    }

    fn capacity_bytes(&self) -> usize {
        self.capacity_bytes
    }

    fn size(&self) -> usize {
        self.lengths.len()
    }

    fn bytes(&self) -> usize {
        self.bytes
    }

    fn push(&mut self, line: &str) -> bool {
        if !self.can_push(line.len()) {
            return false;
        }
        let cost = line.len() + LINE_OVERHEAD;
        self.lengths.push_back(cost);
        self.bytes += cost;
        true
    }

    fn pop(&mut self) -> Option<usize> {
        let cost = self.lengths.pop_front()?;
        self.bytes -= cost;
        Some(cost)
    }

    fn clear(&mut self) {
        self.lengths.clear();
        self.bytes = 0;
    }
}

/// Counter that retains the text of each outstanding line
///
/// `peek()` names the command an incoming response answers.
#[derive(Debug, Clone)]
pub struct PayloadCounter {
    lines: VecDeque<String>,
    bytes: usize,
    capacity_lines: usize,
    capacity_bytes: usize,
}

impl PayloadCounter {
    /// Create a counter for a firmware buffer of the given size
    pub fn new(capacity_lines: usize, capacity_bytes: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(capacity_lines),
            bytes: 0,
            capacity_lines,
            capacity_bytes,
        }
    }

    /// Retire the oldest line and return its text
    pub fn pop_line(&mut self) -> Option<String> {
        let line = self.lines.pop_front()?;
        self.bytes -= line.len() + LINE_OVERHEAD;
        Some(line)
    }
}

impl SentCounter for PayloadCounter {
    fn capacity_lines(&self) -> usize {
        self.capacity_lines
    }

    fn capacity_bytes(&self) -> usize {
        self.capacity_bytes
    }

    fn size(&self) -> usize {
        self.lines.len()
    }

    fn bytes(&self) -> usize {
        self.bytes
    }

    fn push(&mut self, line: &str) -> bool {
        if !self.can_push(line.len()) {
            return false;
        }
        self.bytes += line.len() + LINE_OVERHEAD;
        self.lines.push_back(line.to_string());
        true
    }

    fn pop(&mut self) -> Option<usize> {
        self.pop_line().map(|line| line.len() + LINE_OVERHEAD)
    }

    fn peek(&self) -> Option<&str> {
        self.lines.front().map(String::as_str)
    }

    fn clear(&mut self) {
        self.lines.clear();
        self.bytes = 0;
    }
}
