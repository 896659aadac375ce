//! Windowed counting pipeline
//!
//! Wires an inbound event channel, the window aggregator, a periodic flush
//! timer and the emitter together into one long-running task.

pub mod executor;
pub mod stats;

pub use executor::WindowedCountPipeline;
pub use stats::{PipelineReport, PipelineStats};
