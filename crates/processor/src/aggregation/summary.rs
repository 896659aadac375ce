//! Finalized window output

use super::count::CountTable;
use crate::error::Result;
use crate::sink::SinkRecord;
use crate::window::WindowBounds;
use serde::{Deserialize, Serialize};

/// One emitted record per (window, key)
///
/// Serialized as `{"windowStart":..,"windowEnd":..,"key":..,"count":..}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowSummary {
    /// Window start, epoch milliseconds (inclusive)
    pub window_start: i64,
    /// Window end, epoch milliseconds (exclusive)
    pub window_end: i64,
    /// Aggregation key
    pub key: String,
    /// Events attributed to this key in this window
    pub count: u64,
}

impl WindowSummary {
    /// Encode as a sink record keyed by the aggregation key
    pub fn to_record(&self) -> Result<SinkRecord> {
        Ok(SinkRecord {
            key: self.key.clone(),
            value: serde_json::to_vec(self)?,
        })
    }
}

/// A window that has been swapped out of the aggregator and awaits emission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosedWindow {
    /// Bounds of the closed window
    pub bounds: WindowBounds,
    /// Final counts, never empty
    pub counts: CountTable,
}

impl ClosedWindow {
    /// Summaries ordered by key
    pub fn summaries(&self) -> Vec<WindowSummary> {
        self.counts
            .sorted_entries()
            .into_iter()
            .map(|(key, count)| WindowSummary {
                window_start: self.bounds.start,
                window_end: self.bounds.end,
                key: key.to_string(),
                count,
            })
            .collect()
    }

    /// Number of events counted in the window
    pub fn event_count(&self) -> u64 {
        self.counts.total()
    }

    /// Number of distinct keys, i.e. summaries that will be emitted
    pub fn key_count(&self) -> usize {
        self.counts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_json_field_names() {
        let summary = WindowSummary {
            window_start: 0,
            window_end: 1000,
            key: "A".to_string(),
            count: 2,
        };

        let json = serde_json::to_string(&summary).unwrap();
        assert_eq!(
            json,
            r#"{"windowStart":0,"windowEnd":1000,"key":"A","count":2}"#
        );
    }

    #[test]
    fn test_to_record_uses_aggregation_key() {
        let summary = WindowSummary {
            window_start: 60_000,
            window_end: 120_000,
            key: "NO_KEY".to_string(),
            count: 7,
        };

        let record = summary.to_record().unwrap();
        assert_eq!(record.key, "NO_KEY");

        let decoded: WindowSummary = serde_json::from_slice(&record.value).unwrap();
        assert_eq!(decoded, summary);
    }

    #[test]
    fn test_closed_window_summaries() {
        let mut counts = CountTable::new();
        counts.increment("B");
        counts.increment("A");
        counts.increment("A");

        let closed = ClosedWindow {
            bounds: WindowBounds::new(0, 1000),
            counts,
        };

        assert_eq!(closed.event_count(), 3);
        assert_eq!(closed.key_count(), 2);

        let summaries = closed.summaries();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].key, "A");
        assert_eq!(summaries[0].count, 2);
        assert_eq!(summaries[1].key, "B");
        assert_eq!(summaries[1].count, 1);
        assert!(summaries.iter().all(|s| s.window_start == 0 && s.window_end == 1000));
    }
}
