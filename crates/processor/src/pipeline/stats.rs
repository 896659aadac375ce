//! Pipeline statistics

use crate::aggregation::AggregatorStats;
use crate::emitter::EmitterStats;
use serde::{Deserialize, Serialize};

/// Live statistics published by a running pipeline
///
/// Refreshed on every flush tick and once more when the pipeline stops.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineStats {
    /// Events pulled from the inbound channel
    pub events_received: u64,

    /// Flush ticks handled
    pub ticks: u64,

    /// Start of the open window
    pub current_window_start: i64,

    /// Distinct keys in the open window
    pub open_window_keys: u64,

    /// Events counted in the open window
    pub open_window_events: u64,

    /// Aggregator counters
    pub aggregator: AggregatorStats,

    /// Emitter counters
    pub emitter: EmitterStats,
}

impl PipelineStats {
    /// Events per second over `elapsed_seconds`
    pub fn events_per_second(&self, elapsed_seconds: f64) -> f64 {
        if elapsed_seconds > 0.0 {
            self.events_received as f64 / elapsed_seconds
        } else {
            0.0
        }
    }
}

/// Final outcome of [`super::WindowedCountPipeline::run`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineReport {
    /// Events pulled from the inbound channel
    pub events_received: u64,

    /// Aggregator counters at shutdown
    pub aggregator: AggregatorStats,

    /// Emitter counters after the emitter drained
    pub emitter: EmitterStats,

    /// Start of the window that was open at shutdown
    pub final_window_start: i64,

    /// Events in the open window that were never emitted
    pub discarded_open_events: u64,

    /// Keys in the open window that were never emitted
    pub discarded_open_keys: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_per_second() {
        let stats = PipelineStats {
            events_received: 500,
            ..Default::default()
        };
        assert_eq!(stats.events_per_second(10.0), 50.0);
        assert_eq!(stats.events_per_second(0.0), 0.0);
    }
}
