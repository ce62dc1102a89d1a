//! Keyed FIFO with a hard capacity

use std::collections::{BTreeMap, HashMap};

/// In-flight samples keyed by string, oldest evicted first when full
///
/// Entries carry their insertion sequence so removal by key does not scan.
#[derive(Debug)]
pub struct BoundedStats<V> {
    capacity: usize,
    next_seq: u64,
    order: BTreeMap<u64, String>,
    entries: HashMap<String, (u64, V)>,
}

impl<V> BoundedStats<V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            next_seq: 0,
            order: BTreeMap::new(),
            entries: HashMap::new(),
        }
    }

    /// Insert or overwrite `key`; returns the evicted oldest entry when over capacity
    ///
    /// Overwriting keeps the key's original position in the eviction order.
    pub fn insert(&mut self, key: String, value: V) -> Option<(String, V)> {
        if let Some(slot) = self.entries.get_mut(&key) {
            slot.1 = value;
            return None;
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.order.insert(seq, key.clone());
        self.entries.insert(key, (seq, value));

        if self.entries.len() > self.capacity {
            let (_, oldest) = self.order.pop_first()?;
            let (_, v) = self.entries.remove(&oldest)?;
            return Some((oldest, v));
        }
        None
    }

    /// Remove and return the sample for `key`
    pub fn take(&mut self, key: &str) -> Option<V> {
        let (seq, value) = self.entries.remove(key)?;
        self.order.remove(&seq);
        Some(value)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
