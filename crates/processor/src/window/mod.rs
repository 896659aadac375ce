//! Window clock
//!
//! Fixed-size, non-overlapping (tumbling) windows. Every timestamp belongs to
//! exactly one window:
//!
//! ```text
//! Time:     0----5----10---15---20---25---30
//! Windows:  [----][----][----][----][----]
//! ```
//!
//! The clock is a pure function of the timestamp and the window size; all
//! window state lives in [`crate::aggregation::WindowAggregator`].
//!
//! ```rust
//! use window_counter_processor::window::TumblingWindowAssigner;
//!
//! let clock = TumblingWindowAssigner::new(1000).unwrap();
//! assert_eq!(clock.window_start(1500), 1000);
//! assert_eq!(clock.bounds_for(1500).end, 2000);
//! ```

pub mod assigner;
pub mod types;

pub use assigner::TumblingWindowAssigner;
pub use types::WindowBounds;
