//! Emission sinks
//!
//! A sink accepts one batch of finalized window summaries per closed window.
//! The aggregator never retries a failed batch; any durability guarantees
//! belong to the sink's own transport.
//!
//! ## Implementations
//!
//! - [`crate::kafka::KafkaEmissionSink`]: produces records to a Kafka topic
//! - [`MemorySink`]: keeps batches in memory, with failure injection
//! - [`LogSink`]: writes records to the log, for dry runs without a broker

pub mod log;
pub mod memory;

pub use self::log::LogSink;
pub use self::memory::MemorySink;

use crate::error::Result;
use async_trait::async_trait;

/// One outbound record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkRecord {
    /// Record key (string form of the aggregation key)
    pub key: String,
    /// Encoded record value
    pub value: Vec<u8>,
}

/// Destination for closed-window batches
///
/// ```rust,no_run
/// use async_trait::async_trait;
/// use window_counter_processor::error::Result;
/// use window_counter_processor::sink::{EmissionSink, SinkRecord};
///
/// struct StdoutSink;
///
/// #[async_trait]
/// impl EmissionSink for StdoutSink {
///     async fn send(&self, topic: &str, records: Vec<SinkRecord>) -> Result<()> {
///         for record in records {
///             println!("{} {} {}", topic, record.key, String::from_utf8_lossy(&record.value));
///         }
///         Ok(())
///     }
///
///     fn name(&self) -> &str {
///         "stdout"
///     }
/// }
/// ```
#[async_trait]
pub trait EmissionSink: Send + Sync {
    /// Deliver one batch to `topic`
    async fn send(&self, topic: &str, records: Vec<SinkRecord>) -> Result<()>;

    /// Short identifier used in logs
    fn name(&self) -> &str;
}
