//! Kafka client configuration
//!
//! Both configs render into an rdkafka [`ClientConfig`]; `extra_config` is
//! applied last so any librdkafka property can be overridden.

use crate::error::{ProcessorError, Result};
use rdkafka::config::ClientConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Default timeout for a single produce call
const DEFAULT_SEND_TIMEOUT_MS: u64 = 30_000;

/// Default number of retries for a failed record
const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default base delay for exponential backoff (milliseconds)
const DEFAULT_BASE_BACKOFF_MS: u64 = 100;

/// Offset commit strategy for the consumer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitStrategy {
    /// librdkafka commits in the background
    Auto,
    /// The source commits consumer state every `commit_interval_ms`
    Periodic,
}

/// Configuration for the inbound event consumer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KafkaSourceConfig {
    /// Kafka brokers (comma-separated list)
    pub brokers: String,

    /// Consumer group ID
    pub group_id: String,

    /// Topic to subscribe to
    pub topic: String,

    /// Client ID reported to the brokers
    #[serde(default = "default_source_client_id")]
    pub client_id: String,

    /// Where to start when the group has no committed offset
    #[serde(default = "default_auto_offset_reset")]
    pub auto_offset_reset: String,

    /// Commit strategy
    #[serde(default = "default_commit_strategy")]
    pub commit_strategy: CommitStrategy,

    /// Commit interval (milliseconds)
    #[serde(default = "default_commit_interval_ms")]
    pub commit_interval_ms: u64,

    /// Pause after a receive error before polling again (milliseconds)
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Additional librdkafka consumer properties
    #[serde(default)]
    pub extra_config: HashMap<String, String>,
}

fn default_source_client_id() -> String { "window-counter-consumer".to_string() }
fn default_auto_offset_reset() -> String { "latest".to_string() }
fn default_commit_strategy() -> CommitStrategy { CommitStrategy::Auto }
fn default_commit_interval_ms() -> u64 { 5_000 }
fn default_retry_backoff_ms() -> u64 { 1_000 }

impl Default for KafkaSourceConfig {
    fn default() -> Self {
        Self {
            brokers: "localhost:9092".to_string(),
            group_id: "window-counter".to_string(),
            topic: "events".to_string(),
            client_id: default_source_client_id(),
            auto_offset_reset: default_auto_offset_reset(),
            commit_strategy: default_commit_strategy(),
            commit_interval_ms: default_commit_interval_ms(),
            retry_backoff_ms: default_retry_backoff_ms(),
            extra_config: HashMap::new(),
        }
    }
}

impl KafkaSourceConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.brokers.trim().is_empty() {
            return Err(ProcessorError::config("kafka brokers must not be empty"));
        }
        if self.group_id.is_empty() {
            return Err(ProcessorError::config("kafka group_id must not be empty"));
        }
        if self.topic.is_empty() {
            return Err(ProcessorError::config("kafka input topic must not be empty"));
        }
        if !matches!(self.auto_offset_reset.as_str(), "earliest" | "latest") {
            return Err(ProcessorError::config(format!(
                "auto_offset_reset must be 'earliest' or 'latest', got '{}'",
                self.auto_offset_reset
            )));
        }
        if self.commit_strategy == CommitStrategy::Periodic && self.commit_interval_ms == 0 {
            return Err(ProcessorError::config(
                "commit_interval_ms must be greater than 0 for periodic commits",
            ));
        }
        Ok(())
    }

    /// Commit interval as a Duration
    pub fn commit_interval(&self) -> Duration {
        Duration::from_millis(self.commit_interval_ms)
    }

    /// Render the rdkafka client configuration
    pub fn client_config(&self) -> ClientConfig {
        let mut client_config = ClientConfig::new();
        client_config
            .set("bootstrap.servers", &self.brokers)
            .set("group.id", &self.group_id)
            .set("client.id", &self.client_id)
            .set("auto.offset.reset", &self.auto_offset_reset)
            .set(
                "enable.auto.commit",
                if self.commit_strategy == CommitStrategy::Auto { "true" } else { "false" },
            );

        for (key, value) in &self.extra_config {
            client_config.set(key, value);
        }
        client_config
    }
}

/// Configuration for the summary producer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KafkaSinkConfig {
    /// Kafka bootstrap servers
    pub brokers: String,

    /// Client ID for this producer
    #[serde(default = "default_sink_client_id")]
    pub client_id: String,

    /// Acknowledgment level (0, 1, all)
    #[serde(default = "default_acks")]
    pub acks: String,

    /// Compression type (none, gzip, snappy, lz4, zstd)
    #[serde(default = "default_compression")]
    pub compression_type: String,

    /// Timeout for sending one record (milliseconds)
    #[serde(default = "default_send_timeout")]
    pub send_timeout_ms: u64,

    /// Maximum retries for a record that failed with a transient error
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay for exponential backoff (milliseconds)
    #[serde(default = "default_base_backoff")]
    pub base_backoff_ms: u64,

    /// Linger time for batching (milliseconds)
    #[serde(default = "default_linger_ms")]
    pub linger_ms: u64,

    /// Enable idempotent producer
    #[serde(default = "default_true")]
    pub enable_idempotence: bool,

    /// Additional librdkafka producer properties
    #[serde(default)]
    pub extra_config: HashMap<String, String>,
}

fn default_sink_client_id() -> String { "window-counter-producer".to_string() }
fn default_acks() -> String { "all".to_string() }
fn default_compression() -> String { "none".to_string() }
fn default_send_timeout() -> u64 { DEFAULT_SEND_TIMEOUT_MS }
fn default_max_retries() -> u32 { DEFAULT_MAX_RETRIES }
fn default_base_backoff() -> u64 { DEFAULT_BASE_BACKOFF_MS }
fn default_linger_ms() -> u64 { 5 }
fn default_true() -> bool { true }

impl Default for KafkaSinkConfig {
    fn default() -> Self {
        Self {
            brokers: "localhost:9092".to_string(),
            client_id: default_sink_client_id(),
            acks: default_acks(),
            compression_type: default_compression(),
            send_timeout_ms: DEFAULT_SEND_TIMEOUT_MS,
            max_retries: DEFAULT_MAX_RETRIES,
            base_backoff_ms: DEFAULT_BASE_BACKOFF_MS,
            linger_ms: default_linger_ms(),
            enable_idempotence: true,
            extra_config: HashMap::new(),
        }
    }
}

impl KafkaSinkConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.brokers.trim().is_empty() {
            return Err(ProcessorError::config("kafka brokers must not be empty"));
        }
        if !matches!(self.acks.as_str(), "0" | "1" | "all" | "-1") {
            return Err(ProcessorError::config(format!(
                "acks must be one of 0, 1, all; got '{}'",
                self.acks
            )));
        }
        if self.enable_idempotence && self.acks != "all" && self.acks != "-1" {
            return Err(ProcessorError::config(
                "idempotent producer requires acks=all",
            ));
        }
        if self.send_timeout_ms == 0 {
            return Err(ProcessorError::config("send_timeout_ms must be greater than 0"));
        }
        Ok(())
    }

    /// Per-record send timeout
    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    /// Render the rdkafka client configuration
    pub fn client_config(&self) -> ClientConfig {
        let mut client_config = ClientConfig::new();
        client_config
            .set("bootstrap.servers", &self.brokers)
            .set("client.id", &self.client_id)
            .set("acks", &self.acks)
            .set("compression.type", &self.compression_type)
            .set("linger.ms", self.linger_ms.to_string())
            .set("message.timeout.ms", self.send_timeout_ms.to_string());

        if self.enable_idempotence {
            client_config.set("enable.idempotence", "true");
        }

        for (key, value) in &self.extra_config {
            client_config.set(key, value);
        }
        client_config
    }
}
