//! Tumbling-window keyed event counter
//!
//! Events arrive from a source (Kafka in production), are counted per key in
//! fixed, non-overlapping windows, and each closed window is emitted as one
//! batch of [`WindowSummary`] records to an [`EmissionSink`].
//!
//! - [`window`]: window clock (alignment and bounds)
//! - [`aggregation`]: the open window's count table and closure rules
//! - [`emitter`]: ordered delivery of closed windows to a sink
//! - [`pipeline`]: the long-running task tying events, timer and emitter together
//! - [`kafka`]: consumer and producer adapters

pub mod aggregation;
pub mod config;
pub mod core;
pub mod emitter;
pub mod error;
pub mod kafka;
pub mod pipeline;
pub mod sink;
pub mod window;

// Re-export commonly used types
pub use aggregation::{
    AggregatorStats, ClosedWindow, CountTable, ObserveOutcome, Observation, WindowAggregator,
    WindowSummary,
};

pub use config::WindowConfig;

pub use core::{
    Clock, EventOrigin, InboundEvent, KeyPolicy, ManualClock, SystemClock,
    DEFAULT_NO_KEY_SENTINEL,
};

pub use emitter::{EmitterHandle, EmitterStats, WindowEmitter};

pub use error::{ProcessorError, Result as ProcessorResult, WindowError};

pub use kafka::{
    CommitStrategy, KafkaEmissionSink, KafkaEventSource, KafkaSinkConfig, KafkaSourceConfig,
    SinkMetrics, SourceMetrics,
};

pub use pipeline::{PipelineReport, PipelineStats, WindowedCountPipeline};

pub use sink::{EmissionSink, LogSink, MemorySink, SinkRecord};

pub use window::{TumblingWindowAssigner, WindowBounds};
