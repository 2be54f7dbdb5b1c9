//! Bounded command ring
//!
//! Fixed slot arena walked by three cursors: `head` (next write),
//! `send_tail` (next to transmit) and `ack_tail` (oldest awaiting an
//! acknowledgment). Occupancy is tracked with explicit counts, so all
//! `capacity` slots are usable.

use super::command::Command;

/// Fixed-capacity FIFO of commands with separate send and ack cursors
#[derive(Debug, Clone)]
pub struct CommandQueue {
    slots: Vec<Option<Command>>,
    head: usize,
    send_tail: usize,
    ack_tail: usize,
    /// Slots between `ack_tail` and `head`
    len: usize,
    /// Slots between `send_tail` and `head`
    unsent: usize,
    capacity_bytes: usize,
    /// Downstream byte budget; meaningful only when `capacity_bytes > 0`
    free_bytes: usize,
}

impl CommandQueue {
    /// Create a queue holding `capacity_lines` commands
    ///
    /// `capacity_bytes == 0` disables downstream byte tracking.
    pub fn new(capacity_lines: usize, capacity_bytes: usize) -> Self {
        let capacity_lines = capacity_lines.max(1);
        Self {
            slots: vec![None; capacity_lines],
            head: 0,
            send_tail: 0,
            ack_tail: 0,
            len: 0,
            unsent: 0,
            capacity_bytes,
            free_bytes: capacity_bytes,
        }
    }

    /// Slot capacity
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Byte capacity, 0 when untracked
    pub fn capacity_bytes(&self) -> usize {
        self.capacity_bytes
    }

    /// Commands held (unsent plus unacknowledged)
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether no command is held
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether every slot is occupied
    pub fn is_full(&self) -> bool {
        self.len == self.capacity()
    }

    /// Free slots
    pub fn get_free_slots(&self) -> usize {
        self.capacity() - self.len
    }

    /// Downstream bytes not yet committed to sent commands
    pub fn free_bytes(&self) -> usize {
        self.free_bytes
    }

    /// Commands transmitted but not yet acknowledged
    pub fn in_flight(&self) -> usize {
        self.len - self.unsent
    }

    fn next(&self, index: usize) -> usize {
        (index + 1) % self.capacity()
    }

    /// Append a command; false if full or the command is empty
    pub fn push(&mut self, cmd: Command) -> bool {
        if cmd.is_empty() || self.is_full() {
            return false;
        }
        self.slots[self.head] = Some(cmd);
        self.head = self.next(self.head);
        self.len += 1;
        self.unsent += 1;
        true
    }

    /// Whether a command is waiting for transmission
    pub fn has_unsent(&self) -> bool {
        self.unsent > 0
    }

    /// Next command to transmit
    pub fn peek_unsent(&self) -> Option<&Command> {
        if !self.has_unsent() {
            return None;
        }
        self.slots[self.send_tail].as_ref()
    }

    /// Whether the next unsent command fits the downstream byte budget
    pub fn can_send(&self) -> bool {
        match self.peek_unsent() {
            Some(cmd) => self.capacity_bytes == 0 || cmd.len() <= self.free_bytes,
            None => false,
        }
    }

    /// Advance the send cursor, returning the command to transmit
    pub fn mark_sent(&mut self) -> Option<Command> {
        if !self.can_send() {
            return None;
        }
        let cmd = self.slots[self.send_tail].clone()?;
        if self.capacity_bytes > 0 {
            self.free_bytes -= cmd.len();
        }
        self.send_tail = self.next(self.send_tail);
        self.unsent -= 1;
        Some(cmd)
    }

    /// Whether a transmitted command awaits acknowledgment
    pub fn has_unacknowledged(&self) -> bool {
        self.in_flight() > 0
    }

    /// Whether every transmitted command was acknowledged
    pub fn all_acknowledged(&self) -> bool {
        !self.has_unacknowledged()
    }

    /// Oldest transmitted command awaiting acknowledgment
    pub fn peek_unacknowledged(&self) -> Option<&Command> {
        if !self.has_unacknowledged() {
            return None;
        }
        self.slots[self.ack_tail].as_ref()
    }

    /// Retire the oldest transmitted command
    pub fn mark_acknowledged(&mut self) -> Option<Command> {
        if !self.has_unacknowledged() {
            return None;
        }
        let cmd = self.slots[self.ack_tail].take()?;
        if self.capacity_bytes > 0 {
            self.free_bytes = (self.free_bytes + cmd.len()).min(self.capacity_bytes);
        }
        self.ack_tail = self.next(self.ack_tail);
        self.len -= 1;
        Some(cmd)
    }

    /// Drop everything, returning how many commands were held
    pub fn clear(&mut self) -> usize {
        let dropped = self.len;
        self.slots.iter_mut().for_each(|slot| *slot = None);
        self.head = 0;
        self.send_tail = 0;
        self.ack_tail = 0;
        self.len = 0;
        self.unsent = 0;
        self.free_bytes = self.capacity_bytes;
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cmd(text: &str) -> Command {
        Command::new(text, None)
    }

    #[test]
    fn test_push_until_full() {
        let mut queue = CommandQueue::new(3, 20);
        assert!(queue.push(cmd("G1 X1")));
        assert!(queue.push(cmd("G1 Y1")));
        assert!(queue.push(cmd("G1 Z1")));
        assert!(!queue.push(cmd("G1 X2")));
        assert_eq!(queue.get_free_slots(), 0);
    }

    #[test]
    fn test_rejects_empty_command() {
        let mut queue = CommandQueue::new(2, 0);
        assert!(!queue.push(cmd("")));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_send_then_ack_preserves_order() {
        let mut queue = CommandQueue::new(3, 20);
        for text in ["G1 X1", "G1 Y1", "G1 Z1"] {
            queue.push(cmd(text));
        }
        let sent: Vec<String> = (0..3)
            .filter_map(|_| queue.mark_sent())
            .map(|c| c.to_string())
            .collect();
        assert_eq!(sent, ["G1 X1", "G1 Y1", "G1 Z1"]);
        assert_eq!(queue.free_bytes(), 5);

        let acked: Vec<String> = (0..3)
            .filter_map(|_| queue.mark_acknowledged())
            .map(|c| c.to_string())
            .collect();
        assert_eq!(acked, sent);
        assert_eq!(queue.free_bytes(), 20);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_byte_budget_blocks_send() {
        let mut queue = CommandQueue::new(4, 8);
        queue.push(cmd("G1 X1"));
        queue.push(cmd("G1 Y1"));
        assert!(queue.mark_sent().is_some());
        assert!(!queue.can_send());
        assert!(queue.mark_sent().is_none());
        queue.mark_acknowledged();
        assert!(queue.can_send());
    }

    #[test]
    fn test_ack_before_send_is_noop() {
        let mut queue = CommandQueue::new(2, 0);
        queue.push(cmd("M105"));
        assert!(queue.peek_unacknowledged().is_none());
        assert!(queue.mark_acknowledged().is_none());
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_wraps_around() {
        let mut queue = CommandQueue::new(2, 0);
        for i in 0..5 {
            assert!(queue.push(cmd(&format!("G0 X{}", i))));
            let sent = queue.mark_sent().unwrap();
            assert_eq!(queue.mark_acknowledged(), Some(sent));
        }
        assert!(queue.is_empty());
        assert_eq!(queue.get_free_slots(), 2);
    }

    #[test]
    fn test_clear_drops_everything() {
        let mut queue = CommandQueue::new(4, 40);
        queue.push(cmd("G1 X1"));
        queue.push(cmd("G1 X2"));
        queue.mark_sent();
        assert_eq!(queue.clear(), 2);
        assert!(queue.is_empty());
        assert!(!queue.has_unsent());
        assert!(queue.all_acknowledged());
        assert_eq!(queue.get_free_slots(), 4);
        assert_eq!(queue.free_bytes(), 40);
    }
}
