//! Configuration management for the window counter service
//!
//! Layers, lowest precedence first:
//! 1. built-in defaults
//! 2. an optional YAML file
//! 3. environment variables prefixed `WINDOW_COUNTER_`, with `__` separating
//!    nested keys (`WINDOW_COUNTER_WINDOW__WINDOW_MS=5000`)
//!
//! Command-line flags are applied on top by the binary.

use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;
use window_counter_processor::config::WindowConfig;
use window_counter_processor::kafka::{CommitStrategy, KafkaSinkConfig, KafkaSourceConfig};

/// Environment variable prefix
pub const ENV_PREFIX: &str = "WINDOW_COUNTER_";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Main service configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterConfig {
    /// Window clock and aggregator settings
    #[serde(default)]
    pub window: WindowConfig,

    /// Kafka transport
    #[serde(default)]
    pub kafka: KafkaConfig,

    /// Where window summaries go
    #[serde(default)]
    pub sink: SinkConfig,

    /// Observability settings
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl CounterConfig {
    /// Load configuration from defaults, an optional file and the environment
    pub fn load(config_path: Option<PathBuf>) -> Result<Self> {
        Self::figment(config_path)?
            .extract()
            .map_err(|e| ConfigError::LoadError(e.to_string()))
    }

    /// The layered provider stack used by [`CounterConfig::load`]
    pub fn figment(config_path: Option<PathBuf>) -> Result<Figment> {
        let mut figment = Figment::from(Serialized::defaults(CounterConfig::default()));

        if let Some(path) = config_path {
            if !path.is_file() {
                return Err(ConfigError::LoadError(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            figment = figment.merge(Yaml::file(path));
        }

        Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.window
            .validate()
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;

        if self.kafka.output_topic.is_empty() {
            return Err(ConfigError::ValidationError(
                "kafka.output_topic must not be empty".to_string(),
            ));
        }

        self.kafka
            .source_config()
            .validate()
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;

        if self.sink.kind == SinkKind::Kafka {
            self.kafka
                .sink_config()
                .validate()
                .map_err(|e| ConfigError::ValidationError(e.to_string()))?;
        }

        if self.observability.log_level.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "observability.log_level must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Render the effective configuration as YAML
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| ConfigError::LoadError(e.to_string()))
    }
}

/// Kafka transport configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KafkaConfig {
    /// Bootstrap brokers (comma-separated)
    pub brokers: String,

    /// Consumer group ID
    pub group_id: String,

    /// Topic events are consumed from
    pub input_topic: String,

    /// Topic window summaries are produced to
    pub output_topic: String,

    /// Client ID prefix; `-consumer` / `-producer` is appended
    pub client_id: String,

    /// Where a new consumer group starts (earliest, latest)
    pub auto_offset_reset: String,

    /// Offset commit strategy
    pub commit_strategy: CommitStrategy,

    /// Commit interval for periodic commits (milliseconds)
    pub commit_interval_ms: u64,

    /// Producer acknowledgment level
    pub acks: String,

    /// Producer compression type
    pub compression_type: String,

    /// Per-record produce timeout (milliseconds)
    pub send_timeout_ms: u64,

    /// Retries for a record that failed with a transient error
    pub max_retries: u32,

    /// Extra librdkafka consumer properties
    pub consumer: HashMap<String, String>,

    /// Extra librdkafka producer properties
    pub producer: HashMap<String, String>,
}

impl Default for KafkaConfig {
    fn default() -> Self {
        let source = KafkaSourceConfig::default();
        let sink = KafkaSinkConfig::default();
        Self {
            brokers: source.brokers,
            group_id: source.group_id,
            input_topic: source.topic,
            output_topic: "event-counts".to_string(),
            client_id: "window-counter".to_string(),
            auto_offset_reset: source.auto_offset_reset,
            commit_strategy: source.commit_strategy,
            commit_interval_ms: source.commit_interval_ms,
            acks: sink.acks,
            compression_type: sink.compression_type,
            send_timeout_ms: sink.send_timeout_ms,
            max_retries: sink.max_retries,
            consumer: HashMap::new(),
            producer: HashMap::new(),
        }
    }
}

impl KafkaConfig {
    /// Consumer settings for the event source
    pub fn source_config(&self) -> KafkaSourceConfig {
        KafkaSourceConfig {
            brokers: self.brokers.clone(),
            group_id: self.group_id.clone(),
            topic: self.input_topic.clone(),
            client_id: format!("{}-consumer", self.client_id),
            auto_offset_reset: self.auto_offset_reset.clone(),
            commit_strategy: self.commit_strategy,
            commit_interval_ms: self.commit_interval_ms,
            extra_config: self.consumer.clone(),
            ..Default::default()
        }
    }

    /// Producer settings for the emission sink
    pub fn sink_config(&self) -> KafkaSinkConfig {
        KafkaSinkConfig {
            brokers: self.brokers.clone(),
            client_id: format!("{}-producer", self.client_id),
            acks: self.acks.clone(),
            compression_type: self.compression_type.clone(),
            send_timeout_ms: self.send_timeout_ms,
            max_retries: self.max_retries,
            extra_config: self.producer.clone(),
            ..Default::default()
        }
    }
}

/// Emission sink selection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Sink implementation
    #[serde(default)]
    pub kind: SinkKind,
}

/// Available sinks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkKind {
    /// Produce summaries to `kafka.output_topic`
    #[default]
    Kafka,
    /// Log summaries only
    Log,
}

/// Observability configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level, used when `RUST_LOG` is unset
    pub log_level: String,

    /// Enable structured JSON logging
    pub json_logging: bool,

    /// Period of the statistics log line in seconds (0 disables it)
    pub stats_interval_secs: u64,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logging: false,
            stats_interval_secs: 60,
        }
    }
}
