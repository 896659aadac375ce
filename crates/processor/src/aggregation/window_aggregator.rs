//! Tumbling-window aggregator
//!
//! Holds the single open window and its count table. Both triggers, event
//! arrival ([`WindowAggregator::observe`]) and the periodic timer
//! ([`WindowAggregator::tick`]), go through the same advance routine, which
//! swaps the table out synchronously and hands the closed window back to the
//! caller for emission. No I/O happens here.

use super::count::CountTable;
use super::summary::ClosedWindow;
use crate::core::{InboundEvent, KeyPolicy};
use crate::window::{TumblingWindowAssigner, WindowBounds};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

/// What happened to an observed event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObserveOutcome {
    /// Counted in the window starting at `window_start`
    Counted { window_start: i64 },
    /// Belonged to an already superseded window and was dropped
    DroppedLate { window_start: i64 },
    /// Timestamp so close to the ends of the `i64` range that its window
    /// cannot be represented; dropped
    DroppedOutOfRange { timestamp: i64 },
}

/// Result of [`WindowAggregator::observe`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    /// Fate of the event itself
    pub outcome: ObserveOutcome,
    /// Window closed as a side effect of the event, if it had any counts
    pub closed: Option<ClosedWindow>,
}

/// Aggregator counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatorStats {
    /// Events counted into a window
    pub events_counted: u64,
    /// Events dropped because their window was already closed
    pub late_events_dropped: u64,
    /// Events dropped because their window lies outside the `i64` range
    pub out_of_range_dropped: u64,
    /// Window advances, including silent ones over empty windows
    pub windows_advanced: u64,
    /// Advances that produced a closed window for emission
    pub windows_closed: u64,
    /// Advances whose window had no events
    pub empty_windows_skipped: u64,
}

/// Single-window keyed counter
///
/// `current_window_start` never decreases, and at most one count table is
/// live at any time.
#[derive(Debug)]
pub struct WindowAggregator {
    assigner: TumblingWindowAssigner,
    key_policy: KeyPolicy,
    current_window_start: i64,
    counts: CountTable,
    stats: AggregatorStats,
}

impl WindowAggregator {
    /// Create an aggregator whose first window contains `start_millis`
    pub fn new(assigner: TumblingWindowAssigner, key_policy: KeyPolicy, start_millis: i64) -> Self {
        let current_window_start = assigner.window_start(start_millis);
        debug!(
            window_start = current_window_start,
            window_ms = assigner.size_ms(),
            "Opened initial window"
        );

        Self {
            assigner,
            key_policy,
            current_window_start,
            counts: CountTable::new(),
            stats: AggregatorStats::default(),
        }
    }

    /// Count one event
    ///
    /// An event without a timestamp is stamped with `now_millis`. If the event
    /// belongs to a later window the current one is closed first; if it
    /// belongs to an earlier one it is dropped.
    pub fn observe(&mut self, event: &InboundEvent, now_millis: i64) -> Observation {
        let timestamp = event.timestamp.unwrap_or(now_millis);
        let Some(window_start) = self.assigner.checked_window_start(timestamp) else {
            self.stats.out_of_range_dropped += 1;
            warn!(timestamp, "Dropped event with out-of-range timestamp");
            return Observation {
                outcome: ObserveOutcome::DroppedOutOfRange { timestamp },
                closed: None,
            };
        };

        if window_start < self.current_window_start {
            self.stats.late_events_dropped += 1;
            debug!(
                timestamp,
                window_start,
                current_window_start = self.current_window_start,
                "Dropped late event"
            );
            return Observation {
                outcome: ObserveOutcome::DroppedLate { window_start },
                closed: None,
            };
        }

        let closed = if window_start > self.current_window_start {
            self.advance_to(window_start)
        } else {
            None
        };

        let key = self.key_policy.resolve(event.key.as_deref());
        self.counts.increment(key);
        self.stats.events_counted += 1;

        Observation {
            outcome: ObserveOutcome::Counted { window_start },
            closed,
        }
    }

    /// Close the current window if wall-clock time has moved past it
    pub fn tick(&mut self, now_millis: i64) -> Option<ClosedWindow> {
        let window_start = self.assigner.checked_window_start(now_millis)?;
        if window_start > self.current_window_start {
            self.advance_to(window_start)
        } else {
            None
        }
    }

    /// Swap out the current table and open the window at `window_start`
    ///
    /// Returns the closed window only when it had counts; skipping any number
    /// of empty windows in one step is silent.
    fn advance_to(&mut self, window_start: i64) -> Option<ClosedWindow> {
        debug_assert!(window_start > self.current_window_start);

        let bounds = self.assigner.bounds_at(self.current_window_start);
        let counts = std::mem::take(&mut self.counts);
        self.current_window_start = window_start;
        self.stats.windows_advanced += 1;

        if counts.is_empty() {
            self.stats.empty_windows_skipped += 1;
            trace!(closed = %bounds, next_window_start = window_start, "Advanced past empty window");
            return None;
        }

        self.stats.windows_closed += 1;
        debug!(
            window_start = bounds.start,
            keys = counts.len(),
            events = counts.total(),
            next_window_start = window_start,
            "Closed window"
        );
        Some(ClosedWindow { bounds, counts })
    }

    /// Start of the open window
    pub fn current_window_start(&self) -> i64 {
        self.current_window_start
    }

    /// Bounds of the open window
    pub fn current_bounds(&self) -> WindowBounds {
        self.assigner.bounds_at(self.current_window_start)
    }

    /// Counts accumulated so far in the open window
    pub fn open_counts(&self) -> &CountTable {
        &self.counts
    }

    /// Key policy in use
    pub fn key_policy(&self) -> &KeyPolicy {
        &self.key_policy
    }

    /// Counter snapshot
    pub fn stats(&self) -> AggregatorStats {
        self.stats
    }
}
