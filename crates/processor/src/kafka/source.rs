//! Kafka event source
//!
//! Consumes the input topic and forwards each message to the pipeline as an
//! [`InboundEvent`]. Keys are decoded as UTF-8 (lossy), the payload is carried
//! untouched and the broker timestamp becomes the event time when present.

use crate::core::{EventOrigin, InboundEvent};
use crate::error::{ProcessorError, Result};
use crate::kafka::config::{CommitStrategy, KafkaSourceConfig};
use rdkafka::consumer::{CommitMode, Consumer, ConsumerContext, StreamConsumer};
use rdkafka::error::{KafkaError, KafkaResult};
use rdkafka::message::{BorrowedMessage, Timestamp};
use rdkafka::types::RDKafkaErrorCode;
use rdkafka::{ClientContext, Message, TopicPartitionList};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info, trace, warn};

/// Consumption metrics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMetrics {
    /// Messages forwarded to the pipeline
    pub messages_consumed: u64,
    /// Payload bytes forwarded
    pub bytes_consumed: u64,
    /// Keys that were not valid UTF-8
    pub lossy_keys: u64,
    /// Messages without a broker timestamp
    pub missing_timestamps: u64,
    /// Receive errors
    pub receive_errors: u64,
    /// Successful offset commits
    pub commits: u64,
    /// Failed offset commits
    pub commit_failures: u64,
}

#[derive(Debug, Default)]
struct MetricsTracker {
    messages_consumed: AtomicU64,
    bytes_consumed: AtomicU64,
    lossy_keys: AtomicU64,
    missing_timestamps: AtomicU64,
    receive_errors: AtomicU64,
    commits: AtomicU64,
    commit_failures: AtomicU64,
}

impl MetricsTracker {
    fn snapshot(&self) -> SourceMetrics {
        SourceMetrics {
            messages_consumed: self.messages_consumed.load(Ordering::Relaxed),
            bytes_consumed: self.bytes_consumed.load(Ordering::Relaxed),
            lossy_keys: self.lossy_keys.load(Ordering::Relaxed),
            missing_timestamps: self.missing_timestamps.load(Ordering::Relaxed),
            receive_errors: self.receive_errors.load(Ordering::Relaxed),
            commits: self.commits.load(Ordering::Relaxed),
            commit_failures: self.commit_failures.load(Ordering::Relaxed),
        }
    }
}

/// Consumer context that records commit outcomes
struct SourceConsumerContext {
    metrics: Arc<MetricsTracker>,
}

impl ClientContext for SourceConsumerContext {}

impl ConsumerContext for SourceConsumerContext {
    fn commit_callback(&self, result: KafkaResult<()>, _offsets: &TopicPartitionList) {
        match result {
            Ok(()) => {
                self.metrics.commits.fetch_add(1, Ordering::Relaxed);
                trace!("Offsets committed");
            }
            Err(KafkaError::ConsumerCommit(RDKafkaErrorCode::NoOffset)) => {}
            Err(e) => {
                self.metrics.commit_failures.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, "Offset commit failed");
            }
        }
    }
}

/// Kafka consumer feeding the windowed count pipeline
pub struct KafkaEventSource {
    consumer: StreamConsumer<SourceConsumerContext>,
    config: KafkaSourceConfig,
    metrics: Arc<MetricsTracker>,
}

impl KafkaEventSource {
    /// Create a consumer; does not contact the brokers yet
    pub fn new(config: KafkaSourceConfig) -> Result<Self> {
        config.validate()?;

        let metrics = Arc::new(MetricsTracker::default());
        let context = SourceConsumerContext {
            metrics: Arc::clone(&metrics),
        };

        let consumer: StreamConsumer<SourceConsumerContext> = config
            .client_config()
            .create_with_context(context)
            .map_err(|e| ProcessorError::Configuration {
                source: Box::new(e),
            })?;

        Ok(Self {
            consumer,
            config,
            metrics,
        })
    }

    /// Metrics snapshot
    pub fn metrics(&self) -> SourceMetrics {
        self.metrics.snapshot()
    }

    /// Consume until `shutdown` flips to `true` or the pipeline drops `tx`
    ///
    /// Receive errors are logged and retried after `retry_backoff_ms`; they
    /// never end the loop.
    pub async fn start(
        &self,
        tx: mpsc::Sender<InboundEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        self.consumer
            .subscribe(&[self.config.topic.as_str()])
            .map_err(|e| ProcessorError::Configuration {
                source: Box::new(e),
            })?;

        info!(
            topic = %self.config.topic,
            group_id = %self.config.group_id,
            brokers = %self.config.brokers,
            "Kafka source subscribed"
        );

        let periodic = self.config.commit_strategy == CommitStrategy::Periodic;
        let mut commit_interval = time::interval(self.config.commit_interval());
        commit_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let retry_backoff = Duration::from_millis(self.config.retry_backoff_ms);

        if !*shutdown.borrow() {
            loop {
                tokio::select! {
                    biased;

                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            info!("Shutdown signal received");
                            break;
                        }
                    }

                    _ = commit_interval.tick(), if periodic => {
                        self.commit(CommitMode::Async);
                    }

                    received = self.consumer.recv() => match received {
                        Ok(msg) => {
                            let event = self.to_event(&msg);
                            if tx.send(event).await.is_err() {
                                warn!("Event channel closed, stopping consumer");
                                break;
                            }
                        }
                        Err(e) => {
                            self.metrics.receive_errors.fetch_add(1, Ordering::Relaxed);
                            error!(error = %e, "Error receiving message");
                            time::sleep(retry_backoff).await;
                        }
                    },
                }
            }
        }

        if periodic {
            self.commit(CommitMode::Sync);
        }
        self.consumer.unsubscribe();

        let metrics = self.metrics();
        info!(
            messages_consumed = metrics.messages_consumed,
            receive_errors = metrics.receive_errors,
            "Kafka source stopped"
        );
        Ok(())
    }

    fn to_event(&self, msg: &BorrowedMessage<'_>) -> InboundEvent {
        let (event, lossy_key) = event_from_parts(
            msg.key(),
            msg.payload(),
            msg.timestamp(),
            EventOrigin {
                topic: msg.topic().to_string(),
                partition: msg.partition(),
                offset: msg.offset(),
            },
        );

        self.metrics.messages_consumed.fetch_add(1, Ordering::Relaxed);
        self.metrics
            .bytes_consumed
            .fetch_add(event.value.len() as u64, Ordering::Relaxed);
        if lossy_key {
            self.metrics.lossy_keys.fetch_add(1, Ordering::Relaxed);
            warn!(origin = ?event.origin, "Message key is not valid UTF-8");
        }
        if event.timestamp.is_none() {
            self.metrics.missing_timestamps.fetch_add(1, Ordering::Relaxed);
        }
        event
    }

    fn commit(&self, mode: CommitMode) {
        match self.consumer.commit_consumer_state(mode) {
            Ok(()) => debug!("Committed consumer offsets"),
            Err(KafkaError::ConsumerCommit(RDKafkaErrorCode::NoOffset)) => {}
            Err(e) => {
                self.metrics.commit_failures.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, "Failed to commit offsets");
            }
        }
    }
}

/// Build an event from raw message parts, reporting whether the key was lossy
fn event_from_parts(
    key: Option<&[u8]>,
    payload: Option<&[u8]>,
    timestamp: Timestamp,
    origin: EventOrigin,
) -> (InboundEvent, bool) {
    let (key, lossy) = match key {
        Some(bytes) => {
            let (key, lossy) = InboundEvent::decode_key(bytes);
            (Some(key), lossy)
        }
        None => (None, false),
    };

    let event = InboundEvent {
        key,
        value: payload.map(<[u8]>::to_vec).unwrap_or_default(),
        timestamp: timestamp.to_millis(),
        origin: Some(origin),
    };
    (event, lossy)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin() -> EventOrigin {
        EventOrigin {
            topic: "events".to_string(),
            partition: 0,
            offset: 7,
        }
    }

    #[test]
    fn test_event_from_parts() {
        let (event, lossy) = event_from_parts(
            Some(b"user-1"),
            Some(br#"{"v":1}"#),
            Timestamp::CreateTime(1_699_564_800_000),
            origin(),
        );

        assert!(!lossy);
        assert_eq!(event.key.as_deref(), Some("user-1"));
        assert_eq!(event.value, br#"{"v":1}"#);
        assert_eq!(event.timestamp, Some(1_699_564_800_000));
        assert_eq!(event.origin.unwrap().offset, 7);
    }

    #[test]
    fn test_missing_key_and_timestamp() {
        let (event, lossy) = event_from_parts(None, None, Timestamp::NotAvailable, origin());

        assert!(!lossy);
        assert!(event.key.is_none());
        assert!(event.value.is_empty());
        assert!(event.timestamp.is_none());
    }

    #[test]
    fn test_invalid_utf8_key_is_lossy() {
        let (event, lossy) = event_from_parts(
            Some(&[0x66, 0xff, 0x6f]),
            Some(b"x"),
            Timestamp::LogAppendTime(5),
            origin(),
        );

        assert!(lossy);
        assert_eq!(event.key.as_deref(), Some("f\u{fffd}o"));
        assert_eq!(event.timestamp, Some(5));
    }

    #[test]
    fn test_metrics_default() {
        let metrics = MetricsTracker::default().snapshot();
        assert_eq!(metrics, SourceMetrics::default());
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = KafkaSourceConfig {
            topic: String::new(),
            ..Default::default()
        };
        assert!(KafkaEventSource::new(config).is_err());
    }
}
