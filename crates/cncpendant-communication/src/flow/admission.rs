//! Lock-free admission budget
//!
//! Producers reserve queue slots before handing a command to the engine;
//! the engine releases them on acknowledgment or flush. Reservation is a
//! single compare-exchange, so "check capacity, then enqueue" cannot race
//! with the consumer.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Free-slot budget of one queue lane
#[derive(Debug)]
pub struct SlotBudget {
    free: AtomicUsize,
    capacity: usize,
}

impl SlotBudget {
    /// Create a budget with all slots free
    pub fn new(capacity: usize) -> Self {
        Self {
            free: AtomicUsize::new(capacity),
            capacity,
        }
    }

    /// Total slots
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots currently free
    pub fn free(&self) -> usize {
        self.free.load(Ordering::Acquire)
    }

    /// Slots currently reserved
    pub fn used(&self) -> usize {
        self.capacity - self.free()
    }

    /// Reserve `n` slots at once; all or nothing
    pub fn try_reserve(&self, n: usize) -> bool {
        if n == 0 {
            return true;
        }
        self.free
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |free| {
                free.checked_sub(n)
            })
            .is_ok()
    }

    /// Return `n` slots, never exceeding capacity
    pub fn release(&self, n: usize) {
        if n == 0 {
            return;
        }
        let capacity = self.capacity;
        let _ = self
            .free
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |free| {
                Some((free + n).min(capacity))
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_reserve_all_or_nothing() {
        let budget = SlotBudget::new(4);
        assert!(budget.try_reserve(3));
        assert!(!budget.try_reserve(2));
        assert_eq!(budget.free(), 1);
        assert!(budget.try_reserve(1));
        assert!(!budget.try_reserve(1));
        assert_eq!(budget.used(), 4);
    }

    #[test]
    fn test_release_saturates() {
        let budget = SlotBudget::new(2);
        assert!(budget.try_reserve(1));
        budget.release(5);
        assert_eq!(budget.free(), 2);
    }

    #[test]
    fn test_concurrent_reservations_never_oversubscribe() {
        let budget = Arc::new(SlotBudget::new(100));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let budget = budget.clone();
                std::thread::spawn(move || (0..50).filter(|_| budget.try_reserve(1)).count())
            })
            .collect();

        let granted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(granted, 100);
        assert_eq!(budget.free(), 0);
    }
}
