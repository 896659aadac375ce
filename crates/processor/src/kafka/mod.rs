//! Kafka transport for the window counter
//!
//! ## KafkaEventSource (consumer)
//! - Subscribes to the input topic and forwards messages as [`InboundEvent`]s
//! - Auto or periodic offset commits
//! - Receive errors are logged and retried, never fatal
//!
//! ## KafkaEmissionSink (producer)
//! - Implements [`EmissionSink`] for window summary batches
//! - Idempotent producer by default
//! - Per-record retry with exponential backoff on transient errors
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tokio::sync::{mpsc, watch};
//! use window_counter_processor::config::WindowConfig;
//! use window_counter_processor::core::SystemClock;
//! use window_counter_processor::kafka::{
//!     KafkaEmissionSink, KafkaEventSource, KafkaSinkConfig, KafkaSourceConfig,
//! };
//! use window_counter_processor::pipeline::WindowedCountPipeline;
//!
//! # async fn example() -> window_counter_processor::error::Result<()> {
//! let source = KafkaEventSource::new(KafkaSourceConfig::default())?;
//! let sink = Arc::new(KafkaEmissionSink::new(KafkaSinkConfig::default())?);
//!
//! let pipeline = WindowedCountPipeline::new(
//!     WindowConfig::default(),
//!     sink.clone(),
//!     "event-counts",
//!     Arc::new(SystemClock),
//! )?;
//!
//! let (tx, rx) = mpsc::channel(1024);
//! let (shutdown_tx, shutdown_rx) = watch::channel(false);
//! let pipeline_task = tokio::spawn(pipeline.run(rx, shutdown_rx.clone()));
//!
//! source.start(tx, shutdown_rx).await?;
//! shutdown_tx.send(true).ok();
//! pipeline_task.await.ok();
//! sink.close()?;
//! # Ok(())
//! # }
//! ```
//!
//! [`InboundEvent`]: crate::core::InboundEvent
//! [`EmissionSink`]: crate::sink::EmissionSink

pub mod config;
pub mod sink;
pub mod source;

#[cfg(test)]
mod tests;

pub use config::{CommitStrategy, KafkaSinkConfig, KafkaSourceConfig};
pub use sink::{KafkaEmissionSink, SinkMetrics};
pub use source::{KafkaEventSource, SourceMetrics};
