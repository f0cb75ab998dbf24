//! Flooding: forward every data message to every neighbor but the one it
//! came from, once.
//!
//! The only state is the set of message ids already seen. It is capped: once
//! it grows past its capacity, the oldest entries are dropped until only the
//! most recent half remains. That is an approximation of LRU, not the real
//! thing; an evicted id could be forwarded a second time, which TTL bounds.

use std::collections::{HashSet, VecDeque};

pub const DEFAULT_FLOOD_SEEN_CAPACITY: usize = 10_000;

/// Bounded set of message ids in arrival order.
#[derive(Debug, Clone)]
pub struct FloodSeenSet {
    capacity: usize,
    order: VecDeque<String>,
    members: HashSet<String>,
}

impl FloodSeenSet {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(2);
        Self {
            capacity,
            order: VecDeque::new(),
            members: HashSet::new(),
        }
    }

    /// Insert `id`. Returns true the first time it is seen.
    pub fn insert(&mut self, id: &str) -> bool {
        if self.members.contains(id) {
            return false;
        }
        self.members.insert(id.to_string());
        self.order.push_back(id.to_string());

        if self.members.len() > self.capacity {
            let keep = self.capacity / 2;
            while self.order.len() > keep {
                if let Some(old) = self.order.pop_front() {
                    self.members.remove(&old);
                }
            }
            tracing::debug!(kept = keep, "flood seen-set trimmed");
        }
        true
    }

    pub fn contains(&self, id: &str) -> bool {
        self.members.contains(id)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for FloodSeenSet {
    fn default() -> Self {
        Self::new(DEFAULT_FLOOD_SEEN_CAPACITY)
    }
}

/// Flooding strategy. Has no routing table; next hops are "everyone else".
#[derive(Debug, Clone, Default)]
pub struct FloodingAlgorithm {
    seen: FloodSeenSet,
}

impl FloodingAlgorithm {
    pub fn new(capacity: usize) -> Self {
        Self {
            seen: FloodSeenSet::new(capacity),
        }
    }

    /// True on first sight of `msg_id`; false on replay.
    pub fn should_forward(&mut self, msg_id: &str) -> bool {
        self.seen.insert(msg_id)
    }

    pub fn seen(&self) -> &FloodSeenSet {
        &self.seen
    }
}
