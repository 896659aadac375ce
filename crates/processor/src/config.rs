//! Configuration types for the window counter
//!
//! Transport settings live with the Kafka adapters in [`crate::kafka`]; this
//! module only covers the window clock and aggregator.

use crate::core::{KeyPolicy, DEFAULT_NO_KEY_SENTINEL};
use crate::error::{ProcessorError, Result, WindowError};
use crate::window::TumblingWindowAssigner;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

/// Window configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowConfig {
    /// Window length in milliseconds
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,

    /// Period of the wall-clock check that closes idle windows (milliseconds)
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,

    /// Aggregation key used for events without a key
    #[serde(default = "default_no_key_sentinel")]
    pub no_key_sentinel: String,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            window_ms: default_window_ms(),
            flush_interval_ms: default_flush_interval_ms(),
            no_key_sentinel: default_no_key_sentinel(),
        }
    }
}

impl WindowConfig {
    /// Create a config with the given window and flush interval
    pub fn new(window_ms: u64, flush_interval_ms: u64) -> Self {
        Self {
            window_ms,
            flush_interval_ms,
            ..Default::default()
        }
    }

    /// Set the keyless-event sentinel
    pub fn with_no_key_sentinel(mut self, sentinel: impl Into<String>) -> Self {
        self.no_key_sentinel = sentinel.into();
        self
    }

    /// Validate the configuration
    ///
    /// A flush interval longer than the window is accepted, but windows on an
    /// idle stream will then close up to one interval late.
    pub fn validate(&self) -> Result<()> {
        self.assigner()?;

        if self.flush_interval_ms == 0 {
            return Err(WindowError::InvalidFlushInterval {
                interval: self.flush_interval_ms,
            }
            .into());
        }

        if self.no_key_sentinel.is_empty() {
            return Err(ProcessorError::config(
                "no_key_sentinel must not be empty",
            ));
        }

        if self.flush_interval_ms > self.window_ms {
            warn!(
                window_ms = self.window_ms,
                flush_interval_ms = self.flush_interval_ms,
                "Flush interval exceeds window length; idle windows will close late"
            );
        }

        Ok(())
    }

    /// Window assigner for this config
    pub fn assigner(&self) -> Result<TumblingWindowAssigner> {
        Ok(TumblingWindowAssigner::new(self.window_ms)?)
    }

    /// Key policy for this config
    pub fn key_policy(&self) -> KeyPolicy {
        KeyPolicy::new(self.no_key_sentinel.clone())
    }

    /// Flush interval as a Duration
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }
}

fn default_window_ms() -> u64 {
    60_000
}

fn default_flush_interval_ms() -> u64 {
    1_000
}

fn default_no_key_sentinel() -> String {
    DEFAULT_NO_KEY_SENTINEL.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = WindowConfig::default();
        assert_eq!(config.window_ms, 60_000);
        assert_eq!(config.flush_interval_ms, 1_000);
        assert_eq!(config.no_key_sentinel, "NO_KEY");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_window_rejected() {
        let err = WindowConfig::new(0, 100).validate().unwrap_err();
        assert!(matches!(
            err,
            ProcessorError::Window(WindowError::InvalidWindowSize { size: 0, .. })
        ));
    }

    #[test]
    fn test_zero_flush_interval_rejected() {
        let err = WindowConfig::new(1000, 0).validate().unwrap_err();
        assert!(matches!(
            err,
            ProcessorError::Window(WindowError::InvalidFlushInterval { interval: 0 })
        ));
    }

    #[test]
    fn test_flush_longer_than_window_is_allowed() {
        assert!(WindowConfig::new(1000, 5000).validate().is_ok());
    }

    #[test]
    fn test_empty_sentinel_rejected() {
        let config = WindowConfig::default().with_no_key_sentinel("");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_deserialize_partial() {
        let config: WindowConfig = serde_json::from_str(r#"{"window_ms": 5000}"#).unwrap();
        assert_eq!(config.window_ms, 5000);
        assert_eq!(config.flush_interval_ms, 1_000);
        assert_eq!(config.key_policy().sentinel(), "NO_KEY");
        assert_eq!(config.flush_interval(), Duration::from_millis(1000));
    }
}
