//! Bounded, arrival-ordered history of recent samples.

use std::collections::VecDeque;

use crate::models::SensorSample;

// ---

/// FIFO buffer holding at most `capacity` samples.
///
/// Callers that share a window across tasks wrap it in a lock; the window
/// itself does no synchronization.
#[derive(Debug, Clone)]
pub struct SlidingWindow {
    capacity: usize,
    samples: VecDeque<SensorSample>,
}

impl SlidingWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            samples: VecDeque::with_capacity(capacity),
        }
    }

    /// Append in arrival order, evicting the oldest entry once full.
    pub fn append(&mut self, sample: SensorSample) {
        // ---
        if self.capacity == 0 {
            return;
        }
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn latest(&self) -> Option<&SensorSample> {
        self.samples.back()
    }

    /// Independent copy, oldest first.
    pub fn snapshot(&self) -> Vec<SensorSample> {
        self.samples.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
