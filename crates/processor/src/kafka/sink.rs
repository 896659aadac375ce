//! Kafka emission sink
//!
//! Publishes one window's summaries as a batch of keyed records. Records are
//! produced concurrently; each one is retried with exponential backoff when
//! the broker reports a transient error. The batch fails if any record is
//! still undelivered after its retries.

use crate::error::{ProcessorError, Result};
use crate::kafka::config::KafkaSinkConfig;
use crate::sink::{EmissionSink, SinkRecord};
use async_trait::async_trait;
use futures::future::join_all;
use rdkafka::error::KafkaError;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::types::RDKafkaErrorCode;
use rdkafka::util::Timeout;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// Upper bound for a single backoff delay
const MAX_BACKOFF_MS: u64 = 60_000;

/// Production metrics
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SinkMetrics {
    /// Records delivered
    pub records_sent: u64,
    /// Records that failed after all retries
    pub records_failed: u64,
    /// Payload bytes delivered
    pub bytes_sent: u64,
    /// Produce attempts, including retries
    pub send_attempts: u64,
    /// Retries after transient errors
    pub retries: u64,
    /// Average delivery latency (microseconds)
    pub avg_latency_us: u64,
    /// Maximum delivery latency (microseconds)
    pub max_latency_us: u64,
}

#[derive(Debug, Default)]
struct MetricsTracker {
    records_sent: AtomicU64,
    records_failed: AtomicU64,
    bytes_sent: AtomicU64,
    send_attempts: AtomicU64,
    retries: AtomicU64,
    total_latency_us: AtomicU64,
    max_latency_us: AtomicU64,
}

impl MetricsTracker {
    fn record_success(&self, latency_us: u64, bytes: u64) {
        self.records_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes, Ordering::Relaxed);
        self.total_latency_us.fetch_add(latency_us, Ordering::Relaxed);
        self.max_latency_us.fetch_max(latency_us, Ordering::Relaxed);
    }

    fn record_failure(&self) {
        self.records_failed.fetch_add(1, Ordering::Relaxed);
    }

    fn record_attempt(&self) {
        self.send_attempts.fetch_add(1, Ordering::Relaxed);
    }

    fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> SinkMetrics {
        let records_sent = self.records_sent.load(Ordering::Relaxed);
        let total_latency = self.total_latency_us.load(Ordering::Relaxed);
        let avg_latency_us = if records_sent > 0 {
            total_latency / records_sent
        } else {
            0
        };

        SinkMetrics {
            records_sent,
            records_failed: self.records_failed.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            send_attempts: self.send_attempts.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            avg_latency_us,
            max_latency_us: self.max_latency_us.load(Ordering::Relaxed),
        }
    }
}

/// Kafka producer implementing [`EmissionSink`]
pub struct KafkaEmissionSink {
    producer: FutureProducer,
    config: KafkaSinkConfig,
    metrics: MetricsTracker,
}

impl KafkaEmissionSink {
    /// Create a producer; does not contact the brokers yet
    pub fn new(config: KafkaSinkConfig) -> Result<Self> {
        config.validate()?;

        let producer: FutureProducer = config
            .client_config()
            .create()
            .map_err(|e| ProcessorError::Configuration {
                source: Box::new(e),
            })?;

        Ok(Self {
            producer,
            config,
            metrics: MetricsTracker::default(),
        })
    }

    /// Metrics snapshot
    pub fn metrics(&self) -> SinkMetrics {
        self.metrics.snapshot()
    }

    /// Wait for queued records to be delivered
    pub fn flush(&self) -> Result<()> {
        self.producer
            .flush(Timeout::After(self.config.send_timeout()))
            .map_err(ProcessorError::from)
    }

    /// Flush and log final metrics
    pub fn close(&self) -> Result<()> {
        info!("Shutting down Kafka sink");

        if let Err(e) = self.flush() {
            error!(error = %e, "Failed to flush during shutdown");
        }

        let metrics = self.metrics();
        info!(
            records_sent = metrics.records_sent,
            records_failed = metrics.records_failed,
            avg_latency_us = metrics.avg_latency_us,
            "Kafka sink shut down"
        );
        Ok(())
    }

    async fn send_with_retry(&self, topic: &str, record: &SinkRecord) -> Result<()> {
        let mut retries = 0;
        let max_retries = self.config.max_retries;

        loop {
            self.metrics.record_attempt();
            let start = Instant::now();

            let kafka_record = FutureRecord::to(topic)
                .key(record.key.as_bytes())
                .payload(&record.value);

            let result = self
                .producer
                .send(kafka_record, Timeout::After(self.config.send_timeout()))
                .await;

            match result {
                Ok(_) => {
                    self.metrics.record_success(
                        start.elapsed().as_micros() as u64,
                        record.value.len() as u64,
                    );
                    if retries > 0 {
                        debug!(key = %record.key, retries, "Record sent after retries");
                    }
                    return Ok(());
                }
                Err((err, _)) => {
                    if !should_retry(&err, retries, max_retries) {
                        self.metrics.record_failure();
                        return Err(ProcessorError::from(err));
                    }

                    retries += 1;
                    self.metrics.record_retry();

                    let backoff = self.calculate_backoff(retries);
                    warn!(
                        key = %record.key,
                        attempt = retries,
                        max_attempts = max_retries + 1,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %err,
                        "Send failed, retrying"
                    );
                    sleep(backoff).await;
                }
            }
        }
    }

    /// Exponential backoff delay for the given retry
    fn calculate_backoff(&self, retry_count: u32) -> Duration {
        backoff_delay(self.config.base_backoff_ms, retry_count)
    }
}

#[async_trait]
impl EmissionSink for KafkaEmissionSink {
    async fn send(&self, topic: &str, records: Vec<SinkRecord>) -> Result<()> {
        let total = records.len();
        let results = join_all(records.iter().map(|r| self.send_with_retry(topic, r))).await;

        let mut failed = 0;
        let mut last_error = None;
        for result in results {
            if let Err(e) = result {
                failed += 1;
                last_error = Some(e);
            }
        }

        match last_error {
            None => Ok(()),
            Some(e) => Err(ProcessorError::Sink {
                sink: self.name().to_string(),
                reason: format!("{} of {} records undelivered: {}", failed, total, e),
            }),
        }
    }

    fn name(&self) -> &str {
        "kafka"
    }
}

/// Whether a produce error is transient and worth retrying
fn should_retry(error: &KafkaError, retries: u32, max_retries: u32) -> bool {
    if retries >= max_retries {
        return false;
    }

    matches!(
        error,
        KafkaError::MessageProduction(
            RDKafkaErrorCode::QueueFull
                | RDKafkaErrorCode::NetworkException
                | RDKafkaErrorCode::RequestTimedOut
                | RDKafkaErrorCode::NotLeaderForPartition
                | RDKafkaErrorCode::MessageTimedOut
                | RDKafkaErrorCode::AllBrokersDown
        )
    )
}

fn backoff_delay(base_ms: u64, retry_count: u32) -> Duration {
    let backoff_ms = base_ms.saturating_mul(2u64.pow(retry_count.min(10)));
    Duration::from_millis(backoff_ms.min(MAX_BACKOFF_MS))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_retry_transient_errors() {
        let err = KafkaError::MessageProduction(RDKafkaErrorCode::QueueFull);
        assert!(should_retry(&err, 0, 3));
        assert!(should_retry(&err, 2, 3));
        assert!(!should_retry(&err, 3, 3));
    }

    #[test]
    fn test_should_not_retry_permanent_errors() {
        let err = KafkaError::MessageProduction(RDKafkaErrorCode::MessageSizeTooLarge);
        assert!(!should_retry(&err, 0, 3));

        let err = KafkaError::MessageProduction(RDKafkaErrorCode::UnknownTopicOrPartition);
        assert!(!should_retry(&err, 0, 3));
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        assert_eq!(backoff_delay(100, 1), Duration::from_millis(200));
        assert_eq!(backoff_delay(100, 2), Duration::from_millis(400));
        assert_eq!(backoff_delay(100, 20), Duration::from_millis(MAX_BACKOFF_MS));
        assert_eq!(backoff_delay(u64::MAX, 3), Duration::from_millis(MAX_BACKOFF_MS));
    }

    #[test]
    fn test_metrics_tracker() {
        let tracker = MetricsTracker::default();
        tracker.record_attempt();
        tracker.record_success(100, 10);
        tracker.record_attempt();
        tracker.record_retry();
        tracker.record_attempt();
        tracker.record_success(300, 20);
        tracker.record_failure();

        let metrics = tracker.snapshot();
        assert_eq!(metrics.records_sent, 2);
        assert_eq!(metrics.records_failed, 1);
        assert_eq!(metrics.bytes_sent, 30);
        assert_eq!(metrics.send_attempts, 3);
        assert_eq!(metrics.retries, 1);
        assert_eq!(metrics.avg_latency_us, 200);
        assert_eq!(metrics.max_latency_us, 300);
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = KafkaSinkConfig {
            brokers: " ".to_string(),
            ..Default::default()
        };
        assert!(KafkaEmissionSink::new(config).is_err());
    }
}
