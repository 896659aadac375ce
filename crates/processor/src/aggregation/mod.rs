//! Windowed keyed counting
//!
//! - [`CountTable`]: key → count for the open window
//! - [`WindowAggregator`]: owns the open window and decides when it closes
//! - [`ClosedWindow`] / [`WindowSummary`]: what a closed window emits
//!
//! # Example
//!
//! ```rust
//! use window_counter_processor::aggregation::WindowAggregator;
//! use window_counter_processor::core::{InboundEvent, KeyPolicy};
//! use window_counter_processor::window::TumblingWindowAssigner;
//!
//! let assigner = TumblingWindowAssigner::new(1000).unwrap();
//! let mut agg = WindowAggregator::new(assigner, KeyPolicy::default(), 0);
//!
//! agg.observe(&InboundEvent::new(vec![]).with_key("A").with_timestamp(100), 0);
//! agg.observe(&InboundEvent::new(vec![]).with_key("A").with_timestamp(500), 0);
//! agg.observe(&InboundEvent::new(vec![]).with_key("B").with_timestamp(900), 0);
//!
//! let closed = agg.tick(1000).unwrap();
//! let summaries = closed.summaries();
//! assert_eq!(summaries.len(), 2);
//! assert_eq!((summaries[0].key.as_str(), summaries[0].count), ("A", 2));
//! ```

pub mod count;
pub mod summary;
pub mod window_aggregator;

pub use count::CountTable;
pub use summary::{ClosedWindow, WindowSummary};
pub use window_aggregator::{AggregatorStats, ObserveOutcome, Observation, WindowAggregator};
