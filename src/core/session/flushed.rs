//! Ids of responses interrupted by barge-in.

use std::collections::{HashSet, VecDeque};

/// Interrupted responses remembered per session.
pub const FLUSHED_CAPACITY: usize = 64;

/// Bounded set with FIFO eviction.
#[derive(Debug)]
pub struct FlushedResponses {
    order: VecDeque<String>,
    ids: HashSet<String>,
    capacity: usize,
}

impl Default for FlushedResponses {
    fn default() -> Self {
        Self::with_capacity(FLUSHED_CAPACITY)
    }
}

impl FlushedResponses {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            order: VecDeque::with_capacity(capacity),
            ids: HashSet::with_capacity(capacity),
            capacity,
        }
    }

    /// Remember `id`, evicting the oldest entry when full.
    pub fn insert(&mut self, id: impl Into<String>) {
        let id = id.into();
        if self.ids.contains(&id) {
            return;
        }
        if self.order.len() == self.capacity
            && let Some(oldest) = self.order.pop_front()
        {
            self.ids.remove(&oldest);
        }
        self.ids.insert(id.clone());
        self.order.push_back(id);
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
