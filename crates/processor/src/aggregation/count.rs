use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Per-key event counts for one window
///
/// Owned by exactly one window at a time; it is moved out wholesale when the
/// window advances, never merged into the next one.
///
/// # Examples
///
/// ```
/// use window_counter_processor::aggregation::CountTable;
///
/// let mut table = CountTable::new();
/// table.increment("A");
/// table.increment("A");
/// table.increment("B");
///
/// assert_eq!(table.get("A"), 2);
/// assert_eq!(table.total(), 3);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountTable {
    counts: HashMap<String, u64>,
}

impl CountTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one occurrence of `key`, returning the new count
    pub fn increment(&mut self, key: &str) -> u64 {
        // Avoid allocating the key for the common already-present case
        if let Some(count) = self.counts.get_mut(key) {
            *count += 1;
            return *count;
        }
        self.counts.insert(key.to_string(), 1);
        1
    }

    /// Count for `key`, zero if never seen
    pub fn get(&self, key: &str) -> u64 {
        self.counts.get(key).copied().unwrap_or(0)
    }

    /// Number of distinct keys
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Whether no event has been counted
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Sum of all counts
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Entries ordered by key
    pub fn sorted_entries(&self) -> Vec<(&str, u64)> {
        let mut entries: Vec<(&str, u64)> = self
            .counts
            .iter()
            .map(|(k, v)| (k.as_str(), *v))
            .collect();
        entries.sort_unstable_by(|a, b| a.0.cmp(b.0));
        entries
    }
}
