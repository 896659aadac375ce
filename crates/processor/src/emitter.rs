//! Closed-window emission
//!
//! The aggregator swaps a window out synchronously and hands it to the
//! emitter; the emitter task turns it into summaries and performs the sink
//! call. Batches are sent one at a time in submission order, so summaries for
//! window N always reach the sink before those for window N+1.
//!
//! A failed send is logged as data loss and counted. It is not retried.

use crate::aggregation::{ClosedWindow, WindowSummary};
use crate::error::{ProcessorError, Result};
use crate::sink::{EmissionSink, SinkRecord};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Emission counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmitterStats {
    /// Closed windows handed to the emitter
    pub windows_submitted: u64,
    /// Batches the sink accepted
    pub batches_sent: u64,
    /// Batches the sink rejected (their summaries are lost)
    pub batches_failed: u64,
    /// Summaries delivered
    pub summaries_sent: u64,
    /// Summaries dropped because of a failed batch or encoding error
    pub summaries_lost: u64,
}

impl EmitterStats {
    /// Windows submitted but not yet sent or failed
    pub fn pending(&self) -> u64 {
        self.windows_submitted
            .saturating_sub(self.batches_sent + self.batches_failed)
    }
}

#[derive(Debug, Default)]
struct StatsTracker {
    windows_submitted: AtomicU64,
    batches_sent: AtomicU64,
    batches_failed: AtomicU64,
    summaries_sent: AtomicU64,
    summaries_lost: AtomicU64,
}

impl StatsTracker {
    fn record_submitted(&self) {
        self.windows_submitted.fetch_add(1, Ordering::Relaxed);
    }

    fn record_sent(&self, summaries: u64) {
        self.summaries_sent.fetch_add(summaries, Ordering::Relaxed);
        self.batches_sent.fetch_add(1, Ordering::Relaxed);
    }

    fn record_failed(&self, summaries: u64) {
        self.summaries_lost.fetch_add(summaries, Ordering::Relaxed);
        self.batches_failed.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> EmitterStats {
        EmitterStats {
            windows_submitted: self.windows_submitted.load(Ordering::Relaxed),
            batches_sent: self.batches_sent.load(Ordering::Relaxed),
            batches_failed: self.batches_failed.load(Ordering::Relaxed),
            summaries_sent: self.summaries_sent.load(Ordering::Relaxed),
            summaries_lost: self.summaries_lost.load(Ordering::Relaxed),
        }
    }
}

/// Task that delivers closed windows to a sink
pub struct WindowEmitter {
    sink: Arc<dyn EmissionSink>,
    topic: String,
    stats: Arc<StatsTracker>,
}

impl WindowEmitter {
    /// Spawn the emitter task on the current runtime
    pub fn spawn(sink: Arc<dyn EmissionSink>, topic: impl Into<String>) -> EmitterHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let stats = Arc::new(StatsTracker::default());

        let emitter = Self {
            sink,
            topic: topic.into(),
            stats: Arc::clone(&stats),
        };
        let task = tokio::spawn(emitter.run(rx));

        EmitterHandle { tx, task, stats }
    }

    async fn run(self, mut rx: mpsc::UnboundedReceiver<ClosedWindow>) {
        debug!(sink = self.sink.name(), topic = %self.topic, "Window emitter started");

        while let Some(closed) = rx.recv().await {
            self.emit(closed).await;
        }

        debug!(sink = self.sink.name(), "Window emitter stopped");
    }

    async fn emit(&self, closed: ClosedWindow) {
        let window_start = closed.bounds.start;
        let summaries = closed.summaries();
        let count = summaries.len() as u64;

        let records = match encode(&summaries) {
            Ok(records) => records,
            Err(e) => {
                self.stats.record_failed(count);
                error!(
                    window_start,
                    records_lost = count,
                    error = %e,
                    "Failed to encode window summaries"
                );
                return;
            }
        };

        let started = Instant::now();
        match self.sink.send(&self.topic, records).await {
            Ok(()) => {
                self.stats.record_sent(count);
                info!(
                    window_start,
                    records_count = count,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Flushed window"
                );
            }
            Err(e) => {
                self.stats.record_failed(count);
                error!(
                    window_start,
                    records_lost = count,
                    sink = self.sink.name(),
                    error = %e,
                    "Failed to flush window"
                );
            }
        }
    }
}

fn encode(summaries: &[WindowSummary]) -> Result<Vec<SinkRecord>> {
    summaries.iter().map(WindowSummary::to_record).collect()
}

/// Handle for submitting closed windows to a running emitter
pub struct EmitterHandle {
    tx: mpsc::UnboundedSender<ClosedWindow>,
    task: JoinHandle<()>,
    stats: Arc<StatsTracker>,
}

impl EmitterHandle {
    /// Queue a closed window for emission; never blocks
    pub fn submit(&self, closed: ClosedWindow) -> Result<()> {
        let window_start = closed.bounds.start;
        self.tx.send(closed).map_err(|_| {
            ProcessorError::ChannelClosed(format!(
                "emitter stopped, window {} not emitted",
                window_start
            ))
        })?;
        self.stats.record_submitted();
        Ok(())
    }

    /// Counter snapshot
    pub fn stats(&self) -> EmitterStats {
        self.stats.snapshot()
    }

    /// Stop accepting windows and wait for queued ones to finish
    pub async fn shutdown(self) -> Result<EmitterStats> {
        let EmitterHandle { tx, task, stats } = self;
        drop(tx);

        task.await.map_err(|e| ProcessorError::ChannelClosed(e.to_string()))?;
        Ok(stats.snapshot())
    }
}
