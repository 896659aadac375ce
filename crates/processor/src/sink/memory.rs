//! In-memory sink
//!
//! Keeps every delivered batch in order. Failures can be injected to exercise
//! the data-loss path without a broker.

use super::{EmissionSink, SinkRecord};
use crate::aggregation::WindowSummary;
use crate::error::{ProcessorError, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// A batch as received by the sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveredBatch {
    /// Target topic
    pub topic: String,
    /// Records in send order
    pub records: Vec<SinkRecord>,
}

impl DeliveredBatch {
    /// Decode records back into summaries
    pub fn summaries(&self) -> Result<Vec<WindowSummary>> {
        self.records
            .iter()
            .map(|r| serde_json::from_slice(&r.value).map_err(ProcessorError::from))
            .collect()
    }
}

#[derive(Debug, Default)]
struct Inner {
    batches: Mutex<Vec<DeliveredBatch>>,
    fail_next: AtomicU64,
    fail_always: AtomicBool,
    attempts: AtomicU64,
}

/// Sink that stores batches in memory
///
/// Clones share the same storage.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    inner: Arc<Inner>,
    delay: Option<Duration>,
}

impl MemorySink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep for `delay` inside every send, to simulate a slow broker
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Fail the next `n` sends
    pub fn fail_next(&self, n: u64) {
        self.inner.fail_next.store(n, Ordering::SeqCst);
    }

    /// Fail every send until switched off
    pub fn set_failing(&self, failing: bool) {
        self.inner.fail_always.store(failing, Ordering::SeqCst);
    }

    /// Successfully delivered batches, in delivery order
    pub fn batches(&self) -> Vec<DeliveredBatch> {
        self.inner.batches.lock().clone()
    }

    /// All delivered summaries, flattened in delivery order
    pub fn summaries(&self) -> Result<Vec<WindowSummary>> {
        let batches = self.inner.batches.lock();
        let mut out = Vec::new();
        for batch in batches.iter() {
            out.extend(batch.summaries()?);
        }
        Ok(out)
    }

    /// Number of send calls, including failed ones
    pub fn attempts(&self) -> u64 {
        self.inner.attempts.load(Ordering::SeqCst)
    }

    fn should_fail(&self) -> bool {
        if self.inner.fail_always.load(Ordering::SeqCst) {
            return true;
        }
        self.inner
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl EmissionSink for MemorySink {
    async fn send(&self, topic: &str, records: Vec<SinkRecord>) -> Result<()> {
        self.inner.attempts.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if self.should_fail() {
            return Err(ProcessorError::Sink {
                sink: self.name().to_string(),
                reason: "injected failure".to_string(),
            });
        }

        self.inner.batches.lock().push(DeliveredBatch {
            topic: topic.to_string(),
            records,
        });
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
