//! Allocator for small fixed-size hardware resource pools

use parking_lot::Mutex;

/// Hands out indices from a hardware-capped set, reusable once released.
///
/// A single lock guards the whole in-use vector. Pools are small and fixed
/// (fixed-function light slots commonly number 8), so a linear scan under
/// the lock is acceptable and bounded.
pub struct SlotPool {
    slots: Mutex<Vec<bool>>,
}

impl SlotPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: Mutex::new(vec![false; capacity]),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn in_use(&self) -> usize {
        self.slots.lock().iter().filter(|used| **used).count()
    }

    /// First free index, or `None` when the pool is exhausted.
    ///
    /// Exhaustion is an expected, recoverable outcome; callers degrade to a
    /// disabled no-op resource rather than treat it as an error.
    pub fn acquire(&self) -> Option<usize> {
        let mut slots = self.slots.lock();
        let index = slots.iter().position(|used| !*used)?;
        slots[index] = true;
        Some(index)
    }

    /// Release an index.
    ///
    /// Idempotent: releasing a free or out-of-range index is a no-op, so
    /// destructor paths running after moves stay safe.
    pub fn release(&self, index: usize) {
        let mut slots = self.slots.lock();
        if let Some(slot) = slots.get_mut(index) {
            *slot = false;
        }
    }
}
