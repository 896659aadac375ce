//! Window bounds
//!
//! Windows are identified by their start in epoch milliseconds; the end is
//! always `start + size` and is exclusive.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Represents the time bounds of a window, in epoch milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WindowBounds {
    /// Start time of the window (inclusive)
    pub start: i64,
    /// End time of the window (exclusive)
    pub end: i64,
}

impl WindowBounds {
    /// Create a new window bounds
    pub fn new(start: i64, end: i64) -> Self {
        debug_assert!(start < end, "Window start must be before end");
        Self { start, end }
    }

    /// Width of the window in milliseconds
    pub fn size_ms(&self) -> i64 {
        self.end - self.start
    }

    /// Check if a timestamp falls within this window
    pub fn contains(&self, timestamp: i64) -> bool {
        timestamp >= self.start && timestamp < self.end
    }

    /// Window start as a UTC datetime, if representable
    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.start)
    }

    /// Window end as a UTC datetime, if representable
    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.end)
    }
}

impl fmt::Display for WindowBounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.start_time(), self.end_time()) {
            (Some(start), Some(end)) => write!(
                f,
                "[{} - {})",
                start.format("%Y-%m-%d %H:%M:%S%.3f"),
                end.format("%Y-%m-%d %H:%M:%S%.3f")
            ),
            _ => write!(f, "[{} - {})", self.start, self.end),
        }
    }
}

impl PartialOrd for WindowBounds {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for WindowBounds {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.start
            .cmp(&other.start)
            .then_with(|| self.end.cmp(&other.end))
    }
}
