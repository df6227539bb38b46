use std::collections::{HashSet, VecDeque};

/// Bounded memory of transaction ids whose request already terminated.
#[derive(Debug)]
pub(crate) struct RecentXids {
    capacity: usize,
    order: VecDeque<u32>,
    members: HashSet<u32>,
}

impl RecentXids {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            order: VecDeque::with_capacity(capacity),
            members: HashSet::with_capacity(capacity),
        }
    }

    pub fn remember(&mut self, xid: u32) {
        if self.capacity == 0 || !self.members.insert(xid) {
            return;
        }
        if self.order.len() == self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.members.remove(&oldest);
            }
        }
        self.order.push_back(xid);
    }

    pub fn contains(&self, xid: u32) -> bool {
        self.members.contains(&xid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forgets_oldest_beyond_capacity() {
        let mut recent = RecentXids::new(2);
        recent.remember(1);
        recent.remember(2);
        recent.remember(3);
        assert!(!recent.contains(1));
        assert!(recent.contains(2));
        assert!(recent.contains(3));
    }

    #[test]
    fn repeated_xid_does_not_evict() {
        let mut recent = RecentXids::new(2);
        recent.remember(1);
        recent.remember(2);
        recent.remember(2);
        assert!(recent.contains(1));
    }
}
