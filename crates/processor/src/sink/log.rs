//! Log-only sink

use super::{EmissionSink, SinkRecord};
use crate::error::Result;
use async_trait::async_trait;
use tracing::info;

/// Writes every record through `tracing` instead of a broker
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

#[async_trait]
impl EmissionSink for LogSink {
    async fn send(&self, topic: &str, records: Vec<SinkRecord>) -> Result<()> {
        for record in &records {
            info!(
                topic,
                key = %record.key,
                value = %String::from_utf8_lossy(&record.value),
                "Window summary"
            );
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_sink_accepts_batches() {
        let sink = LogSink;
        let records = vec![SinkRecord {
            key: "A".to_string(),
            value: br#"{"count":1}"#.to_vec(),
        }];

        assert!(sink.send("event-counts", records).await.is_ok());
        assert_eq!(sink.name(), "log");
    }
}
