//! Error types for the window counter processor
//!
//! Configuration and window-size problems are fatal at startup. Everything
//! raised while the pipeline is running (transport failures, sink rejections)
//! is reported and recovered locally by the caller.

use thiserror::Error;

/// Main processor error type
#[derive(Error, Debug)]
pub enum ProcessorError {
    /// Window-related errors
    #[error("window error: {0}")]
    Window(#[from] WindowError),

    /// Configuration errors
    #[error("configuration error: {source}")]
    Configuration {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Kafka-related errors
    #[error("kafka error: {source}")]
    Kafka {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Serialization/deserialization errors
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The emission sink rejected or failed a batch
    #[error("sink '{sink}' failed: {reason}")]
    Sink { sink: String, reason: String },

    /// A pipeline channel was closed while still in use
    #[error("channel closed: {0}")]
    ChannelClosed(String),
}

impl ProcessorError {
    /// Build a configuration error from a message
    pub fn config(msg: impl Into<String>) -> Self {
        let msg: String = msg.into();
        ProcessorError::Configuration { source: msg.into() }
    }
}

/// Window clock configuration errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WindowError {
    /// Window size is invalid
    #[error("invalid window size: {size}ms, must be greater than 0 and at most {max}ms")]
    InvalidWindowSize { size: u64, max: u64 },

    /// Flush interval is invalid
    #[error("invalid flush interval: {interval}ms, must be greater than 0")]
    InvalidFlushInterval { interval: u64 },
}

/// Result type alias for processor operations
pub type Result<T> = std::result::Result<T, ProcessorError>;

/// Result type alias for window operations
pub type WindowResult<T> = std::result::Result<T, WindowError>;

impl From<serde_json::Error> for ProcessorError {
    fn from(err: serde_json::Error) -> Self {
        ProcessorError::Serialization(err.to_string())
    }
}

impl From<rdkafka::error::KafkaError> for ProcessorError {
    fn from(err: rdkafka::error::KafkaError) -> Self {
        ProcessorError::Kafka {
            source: Box::new(err),
        }
    }
}
