//! Tumbling window assignment
//!
//! Maps an event timestamp to the start of the fixed-size, non-overlapping
//! window that contains it.

use super::types::WindowBounds;
use crate::error::{WindowError, WindowResult};

/// Tumbling window assigner
///
/// Creates fixed-size, non-overlapping windows. Each timestamp belongs to
/// exactly one window.
///
/// # Example
/// ```text
/// Window size: 1000ms
/// Event at 700   -> Window [0, 1000)
/// Event at 1200  -> Window [1000, 2000)
/// Event at -1    -> Window [-1000, 0)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TumblingWindowAssigner {
    /// Size of each window in milliseconds, always positive
    size_ms: i64,
}

impl TumblingWindowAssigner {
    /// Largest accepted window size
    pub const MAX_SIZE_MS: u64 = i64::MAX as u64;

    /// Create a new tumbling window assigner
    ///
    /// A zero size is a configuration error and is rejected here so that the
    /// assignment itself stays total.
    pub fn new(size_ms: u64) -> WindowResult<Self> {
        if size_ms == 0 || size_ms > Self::MAX_SIZE_MS {
            return Err(WindowError::InvalidWindowSize {
                size: size_ms,
                max: Self::MAX_SIZE_MS,
            });
        }

        Ok(Self {
            size_ms: size_ms as i64,
        })
    }

    /// Window size in milliseconds
    pub fn size_ms(&self) -> i64 {
        self.size_ms
    }

    /// Start of the window containing `timestamp`: `floor(timestamp / W) * W`
    ///
    /// Clamped to `i64::MIN` for timestamps in the partial window at the
    /// bottom of the range. Use [`Self::checked_window_start`] where such
    /// timestamps must be rejected.
    pub fn window_start(&self, timestamp: i64) -> i64 {
        // rem_euclid is always in [0, W), so this floors negative timestamps too
        timestamp.saturating_sub(timestamp.rem_euclid(self.size_ms))
    }

    /// Start of the window containing `timestamp`, or `None` when that
    /// window's start or end does not fit in an `i64`
    pub fn checked_window_start(&self, timestamp: i64) -> Option<i64> {
        let start = timestamp.checked_sub(timestamp.rem_euclid(self.size_ms))?;
        start.checked_add(self.size_ms)?;
        Some(start)
    }

    /// Bounds of the window containing `timestamp`
    pub fn bounds_for(&self, timestamp: i64) -> WindowBounds {
        self.bounds_at(self.window_start(timestamp))
    }

    /// Bounds of the window starting at an already aligned `window_start`
    ///
    /// The end is clamped to `i64::MAX`; starts from
    /// [`Self::checked_window_start`] never need the clamp.
    pub fn bounds_at(&self, window_start: i64) -> WindowBounds {
        WindowBounds::new(window_start, window_start.saturating_add(self.size_ms))
    }
}
