use std::sync::atomic::{AtomicBool, Ordering};

/// First-fragment marker for one collection cycle.
#[derive(Debug)]
pub struct CycleTracker {
    virgin: AtomicBool,
}

impl Default for CycleTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl CycleTracker {
    pub fn new() -> Self {
        Self {
            virgin: AtomicBool::new(true),
        }
    }

    /// Returns true exactly once, for the first caller.
    pub fn consume_virgin(&self) -> bool {
        self.virgin.swap(false, Ordering::AcqRel)
    }

    pub fn is_virgin(&self) -> bool {
        self.virgin.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_consume_wins() {
        let tracker = CycleTracker::new();
        assert!(tracker.is_virgin());
        assert!(tracker.consume_virgin());
        assert!(!tracker.consume_virgin());
        assert!(!tracker.is_virgin());
    }
}
