//! Receive watchdog

use std::time::{Duration, Instant};

/// Soft deadline for the next response line
#[derive(Debug, Clone)]
pub struct Watchdog {
    timeout: Duration,
    deadline: Option<Instant>,
}

impl Watchdog {
    /// Create a disarmed watchdog
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            deadline: None,
        }
    }

    /// Timeout applied on arming
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Expect a response within the timeout from `now`
    pub fn arm(&mut self, now: Instant) {
        self.deadline = Some(now + self.timeout);
    }

    /// Set the deadline directly
    pub fn arm_at(&mut self, deadline: Instant) {
        self.deadline = Some(deadline);
    }

    /// Stop expecting a response
    pub fn disarm(&mut self) {
        self.deadline = None;
    }

    /// Whether a deadline is set
    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Whether the deadline has passed at `now`
    pub fn expired(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|deadline| now >= deadline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arm_and_expire() {
        let start = Instant::now();
        let mut watchdog = Watchdog::new(Duration::from_millis(100));
        assert!(!watchdog.expired(start + Duration::from_secs(10)));

        watchdog.arm(start);
        assert!(watchdog.is_armed());
        assert!(!watchdog.expired(start + Duration::from_millis(99)));
        assert!(watchdog.expired(start + Duration::from_millis(100)));

        watchdog.disarm();
        assert!(!watchdog.expired(start + Duration::from_secs(10)));
    }
}
