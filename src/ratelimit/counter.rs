//! Admission counter implementation.

use parking_lot::RwLock;

use super::limit::Limit;

/// A guarded admission count with a fixed ceiling.
///
/// Every mutation of the count happens under the write lock, so the
/// check against the ceiling and the increment are a single critical
/// section. Reads take the shared lock.
#[derive(Debug)]
pub struct AdmissionCounter {
    /// Admissions since the last reset or decrement
    current: RwLock<u64>,
    /// The ceiling for this counter
    limit: Limit,
}

impl AdmissionCounter {
    /// Create a new counter starting at zero.
    pub fn new(limit: Limit) -> Self {
        Self {
            current: RwLock::new(0),
            limit,
        }
    }

    /// Claim one unit of capacity.
    ///
    /// Returns `true` if the admission fits under the ceiling, `false` if the
    /// ceiling has been reached. A rejection leaves the count untouched.
    pub fn try_increment(&self) -> bool {
        let mut current = self.current.write();
        if !self.limit.admits(*current) {
            return false;
        }
        *current = current.saturating_add(1);
        true
    }

    /// Get the current count.
    pub fn current(&self) -> u64 {
        *self.current.read()
    }

    /// Get the remaining capacity, or `None` for an infinite ceiling.
    pub fn remaining(&self) -> Option<u64> {
        self.limit.remaining(self.current())
    }

    /// Whether an admission would currently succeed.
    pub fn has_capacity(&self) -> bool {
        self.limit.admits(self.current())
    }

    /// Get the ceiling for this counter.
    pub fn limit(&self) -> Limit {
        self.limit
    }

    /// Reset the count to zero, returning how many units were freed.
    pub fn reset(&self) -> u64 {
        std::mem::take(&mut *self.current.write())
    }

    /// Decrement the count by `units`, floored at zero.
    ///
    /// Returns how many units were actually freed.
    pub fn release(&self, units: u64) -> u64 {
        let mut current = self.current.write();
        let freed = units.min(*current);
        *current -= freed;
        freed
    }
}
