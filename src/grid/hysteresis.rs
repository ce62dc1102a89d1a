//! Per-level debounce for grid order submission

use std::collections::HashMap;

/// Counts favourable ticks per grid index
///
/// A favourable tick adds one (capped at `threshold`); an unfavourable tick
/// subtracts `decay`, floored at zero. A level may fire once its counter
/// reaches `threshold`.
#[derive(Debug, Clone)]
pub struct HysteresisTable {
    threshold: u32,
    decay: u32,
    counters: HashMap<usize, u32>,
}

impl HysteresisTable {
    pub fn new(threshold: u32, decay: u32) -> Self {
        Self {
            threshold,
            decay,
            counters: HashMap::new(),
        }
    }

    /// Record one tick for `index`; returns true when the level may be submitted
    pub fn observe(&mut self, index: usize, favorable: bool) -> bool {
        let counter = self.counters.entry(index).or_insert(0);
        if favorable {
            *counter = (*counter + 1).min(self.threshold);
        } else {
            *counter = counter.saturating_sub(self.decay);
        }
        *counter >= self.threshold
    }

    pub fn count(&self, index: usize) -> u32 {
        self.counters.get(&index).copied().unwrap_or(0)
    }

    pub fn reset(&mut self, index: usize) {
        self.counters.remove(&index);
    }

    pub fn reset_all(&mut self) {
        self.counters.clear();
    }
}
