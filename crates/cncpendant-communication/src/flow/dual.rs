//! Two-lane command queue
//!
//! Unsent work is taken from the priority lane first. The lane of every
//! transmitted command is remembered so acknowledgments, which arrive in
//! wire order, retire the right command.

use super::command::Command;
use super::queue::CommandQueue;
use std::collections::VecDeque;
use std::fmt;

/// Queue lane
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lane {
    /// Jogs, status polls, control commands
    Priority,
    /// Program lines and ad-hoc commands
    Normal,
}

impl fmt::Display for Lane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lane::Priority => write!(f, "priority"),
            Lane::Normal => write!(f, "normal"),
        }
    }
}

/// Priority lane composed with a normal lane
#[derive(Debug, Clone)]
pub struct DualCommandQueue {
    priority: Option<CommandQueue>,
    normal: CommandQueue,
    sent_order: VecDeque<Lane>,
}

impl DualCommandQueue {
    /// Create a queue; `priority_lines == 0` disables the priority lane
    pub fn new(normal_lines: usize, priority_lines: usize, capacity_bytes: usize) -> Self {
        Self {
            priority: (priority_lines > 0)
                .then(|| CommandQueue::new(priority_lines, capacity_bytes)),
            normal: CommandQueue::new(normal_lines, capacity_bytes),
            sent_order: VecDeque::new(),
        }
    }

    /// Whether a separate priority lane exists
    pub fn has_priority_lane(&self) -> bool {
        self.priority.is_some()
    }

    /// Lane a priority command actually lands in
    pub fn priority_target(&self) -> Lane {
        if self.has_priority_lane() {
            Lane::Priority
        } else {
            Lane::Normal
        }
    }

    fn lane(&self, lane: Lane) -> &CommandQueue {
        match (lane, self.priority.as_ref()) {
            (Lane::Priority, Some(q)) => q,
            _ => &self.normal,
        }
    }

    fn lane_mut(&mut self, lane: Lane) -> &mut CommandQueue {
        match (lane, self.priority.as_mut()) {
            (Lane::Priority, Some(q)) => q,
            _ => &mut self.normal,
        }
    }

    /// Append to the normal lane
    pub fn push(&mut self, cmd: Command) -> bool {
        self.normal.push(cmd)
    }

    /// Append to the priority lane, or the normal lane if there is none
    pub fn push_priority(&mut self, cmd: Command) -> bool {
        let lane = self.priority_target();
        self.lane_mut(lane).push(cmd)
    }

    /// Append to the given lane
    pub fn push_to(&mut self, lane: Lane, cmd: Command) -> bool {
        match lane {
            Lane::Priority => self.push_priority(cmd),
            Lane::Normal => self.push(cmd),
        }
    }

    fn send_lane(&self) -> Lane {
        match &self.priority {
            Some(q) if q.has_unsent() => Lane::Priority,
            _ => Lane::Normal,
        }
    }

    /// Whether either lane has a command waiting for transmission
    pub fn has_unsent(&self) -> bool {
        self.priority.as_ref().is_some_and(CommandQueue::has_unsent) || self.normal.has_unsent()
    }

    /// Next command to transmit, priority lane first
    pub fn peek_unsent(&self) -> Option<&Command> {
        self.lane(self.send_lane()).peek_unsent()
    }

    /// Whether the next command fits the downstream byte budget
    pub fn can_send(&self) -> bool {
        self.lane(self.send_lane()).can_send()
    }

    /// Transmit the next command, priority lane first
    pub fn mark_sent(&mut self) -> Option<Command> {
        let lane = self.send_lane();
        let cmd = self.lane_mut(lane).mark_sent()?;
        self.sent_order.push_back(lane);
        Some(cmd)
    }

    /// Whether a transmitted command awaits acknowledgment
    pub fn has_unacknowledged(&self) -> bool {
        !self.sent_order.is_empty()
    }

    /// Whether every transmitted command was acknowledged
    pub fn all_acknowledged(&self) -> bool {
        self.sent_order.is_empty()
    }

    /// Oldest transmitted command, in wire order
    pub fn peek_unacknowledged(&self) -> Option<&Command> {
        let lane = *self.sent_order.front()?;
        self.lane(lane).peek_unacknowledged()
    }

    /// Retire the oldest transmitted command and report its lane
    pub fn mark_acknowledged(&mut self) -> Option<(Lane, Command)> {
        let lane = self.sent_order.pop_front()?;
        self.lane_mut(lane).mark_acknowledged().map(|cmd| (lane, cmd))
    }

    /// Whether both lanes are empty
    pub fn is_empty(&self) -> bool {
        self.normal.is_empty() && self.priority.as_ref().is_none_or(CommandQueue::is_empty)
    }

    /// Free slots in the normal lane
    pub fn get_free_slots(&self) -> usize {
        self.normal.get_free_slots()
    }

    /// Free slots in the lane priority commands land in
    pub fn priority_free_slots(&self) -> usize {
        self.lane(self.priority_target()).get_free_slots()
    }

    /// Commands held per lane `(priority, normal)`
    pub fn lens(&self) -> (usize, usize) {
        (
            self.priority.as_ref().map_or(0, CommandQueue::len),
            self.normal.len(),
        )
    }

    /// Commands transmitted and not acknowledged
    pub fn in_flight(&self) -> usize {
        self.sent_order.len()
    }

    /// Drop everything, returning `(priority, normal)` dropped counts
    pub fn clear(&mut self) -> (usize, usize) {
        self.sent_order.clear();
        let priority = self.priority.as_mut().map_or(0, CommandQueue::clear);
        (priority, self.normal.clear())
    }
}
