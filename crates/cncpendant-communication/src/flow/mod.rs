//! Flow control for the downstream firmware buffer
//!
//! - [`Command`]: one immutable outbound line
//! - [`SentCounter`]: bytes/lines outstanding inside the firmware, with a
//!   payload-retaining and a length-only flavour
//! - [`CommandQueue`]: bounded three-cursor ring of pending commands
//! - [`DualCommandQueue`]: priority lane drained before the normal lane
//! - [`SlotBudget`]: lock-free admission budget shared with producers

pub mod admission;
pub mod command;
pub mod counter;
pub mod dual;
pub mod queue;

pub use admission::SlotBudget;
pub use command::{Command, LINE_OVERHEAD, MAX_COMMAND_LEN};
pub use counter::{LengthCounter, PayloadCounter, SentCounter};
pub use dual::{DualCommandQueue, Lane};
pub use queue::CommandQueue;
