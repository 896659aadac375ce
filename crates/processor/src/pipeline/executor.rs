//! Windowed count executor
//!
//! One task owns the [`WindowAggregator`]. It multiplexes three inputs:
//! - inbound events, which may advance the window before being counted
//! - a periodic flush tick, which closes the window once wall-clock time has
//!   passed its end
//! - a shutdown signal
//!
//! Closed windows are handed to the [`WindowEmitter`] without waiting for the
//! sink, so a slow sink never delays counting.

use super::stats::{PipelineReport, PipelineStats};
use crate::aggregation::{ClosedWindow, WindowAggregator};
use crate::config::WindowConfig;
use crate::core::{Clock, InboundEvent};
use crate::emitter::{EmitterHandle, WindowEmitter};
use crate::error::Result;
use crate::sink::EmissionSink;
use std::sync::Arc;
use tokio::sync::{mpsc, watch, RwLock};
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info, trace, warn};

/// Tumbling-window keyed event counter
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use tokio::sync::{mpsc, watch};
/// use window_counter_processor::config::WindowConfig;
/// use window_counter_processor::core::{InboundEvent, SystemClock};
/// use window_counter_processor::pipeline::WindowedCountPipeline;
/// use window_counter_processor::sink::LogSink;
///
/// # async fn example() -> window_counter_processor::error::Result<()> {
/// let pipeline = WindowedCountPipeline::new(
///     WindowConfig::new(60_000, 1_000),
///     Arc::new(LogSink),
///     "event-counts",
///     Arc::new(SystemClock),
/// )?;
///
/// let (tx, rx) = mpsc::channel(1024);
/// let (_shutdown_tx, shutdown_rx) = watch::channel(false);
/// let handle = tokio::spawn(pipeline.run(rx, shutdown_rx));
///
/// tx.send(InboundEvent::new(b"{}".to_vec()).with_key("A")).await.ok();
/// drop(tx);
/// let report = handle.await.expect("pipeline task panicked")?;
/// println!("{} events", report.events_received);
/// # Ok(())
/// # }
/// ```
pub struct WindowedCountPipeline {
    config: WindowConfig,
    sink: Arc<dyn EmissionSink>,
    output_topic: String,
    clock: Arc<dyn Clock>,
    stats: Arc<RwLock<PipelineStats>>,
}

impl WindowedCountPipeline {
    /// Create a pipeline, validating the window configuration
    pub fn new(
        config: WindowConfig,
        sink: Arc<dyn EmissionSink>,
        output_topic: impl Into<String>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            config,
            sink,
            output_topic: output_topic.into(),
            clock,
            stats: Arc::new(RwLock::new(PipelineStats::default())),
        })
    }

    /// Shared statistics, readable while the pipeline runs
    pub fn stats_handle(&self) -> Arc<RwLock<PipelineStats>> {
        Arc::clone(&self.stats)
    }

    /// Current statistics snapshot
    pub async fn stats(&self) -> PipelineStats {
        self.stats.read().await.clone()
    }

    /// Window configuration in use
    pub fn config(&self) -> &WindowConfig {
        &self.config
    }

    /// Run until `events` is closed or `shutdown` flips to `true`
    ///
    /// Dropping the shutdown sender also stops the pipeline. Windows already
    /// closed are emitted before this returns; the window still open is
    /// discarded and reported.
    pub async fn run(
        self,
        mut events: mpsc::Receiver<InboundEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<PipelineReport> {
        let mut aggregator = WindowAggregator::new(
            self.config.assigner()?,
            self.config.key_policy(),
            self.clock.now_millis(),
        );
        let emitter = WindowEmitter::spawn(Arc::clone(&self.sink), self.output_topic.clone());

        let mut ticker = time::interval(self.config.flush_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;

        info!(
            window_ms = self.config.window_ms,
            flush_interval_ms = self.config.flush_interval_ms,
            output_topic = %self.output_topic,
            sink = self.sink.name(),
            window_start = aggregator.current_window_start(),
            "Starting windowed count pipeline"
        );

        let mut events_received: u64 = 0;
        let mut ticks: u64 = 0;

        if !*shutdown.borrow() {
            loop {
                tokio::select! {
                    biased;

                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            info!("Shutdown requested");
                            break;
                        }
                    }

                    _ = ticker.tick() => {
                        ticks += 1;
                        let closed = aggregator.tick(self.clock.now_millis());
                        self.submit(&emitter, closed);
                        self.publish(&aggregator, &emitter, events_received, ticks).await;
                    }

                    maybe_event = events.recv() => match maybe_event {
                        Some(event) => {
                            events_received += 1;
                            trace!(key = ?event.key, timestamp = ?event.timestamp, "Received event");
                            let observation = aggregator.observe(&event, self.clock.now_millis());
                            self.submit(&emitter, observation.closed);
                        }
                        None => {
                            info!("Event channel closed");
                            break;
                        }
                    },
                }
            }
        }

        let open = aggregator.open_counts();
        let discarded_open_events = open.total();
        let discarded_open_keys = open.len() as u64;
        if discarded_open_events > 0 {
            warn!(
                window_start = aggregator.current_window_start(),
                keys = discarded_open_keys,
                events = discarded_open_events,
                "Discarding open window at shutdown"
            );
        }

        let last_emitter_stats = emitter.stats();
        let emitter_stats = match emitter.shutdown().await {
            Ok(stats) => stats,
            Err(e) => {
                error!(error = %e, "Window emitter task failed");
                last_emitter_stats
            }
        };
        let aggregator_stats = aggregator.stats();

        {
            let mut stats = self.stats.write().await;
            stats.events_received = events_received;
            stats.ticks = ticks;
            stats.current_window_start = aggregator.current_window_start();
            stats.open_window_keys = discarded_open_keys;
            stats.open_window_events = discarded_open_events;
            stats.aggregator = aggregator_stats;
            stats.emitter = emitter_stats;
        }

        info!(
            events_received,
            windows_closed = aggregator_stats.windows_closed,
            late_events_dropped = aggregator_stats.late_events_dropped,
            batches_sent = emitter_stats.batches_sent,
            batches_failed = emitter_stats.batches_failed,
            "Windowed count pipeline stopped"
        );

        Ok(PipelineReport {
            events_received,
            aggregator: aggregator_stats,
            emitter: emitter_stats,
            final_window_start: aggregator.current_window_start(),
            discarded_open_events,
            discarded_open_keys,
        })
    }

    fn submit(&self, emitter: &EmitterHandle, closed: Option<ClosedWindow>) {
        let Some(closed) = closed else {
            return;
        };

        debug!(
            window = %closed.bounds,
            keys = closed.key_count(),
            events = closed.event_count(),
            "Submitting closed window"
        );
        let records_lost = closed.key_count();
        if let Err(e) = emitter.submit(closed) {
            error!(records_lost, error = %e, "Failed to hand off closed window");
        }
    }

    async fn publish(
        &self,
        aggregator: &WindowAggregator,
        emitter: &EmitterHandle,
        events_received: u64,
        ticks: u64,
    ) {
        let open = aggregator.open_counts();
        let mut stats = self.stats.write().await;
        stats.events_received = events_received;
        stats.ticks = ticks;
        stats.current_window_start = aggregator.current_window_start();
        stats.open_window_keys = open.len() as u64;
        stats.open_window_events = open.total();
        stats.aggregator = aggregator.stats();
        stats.emitter = emitter.stats();
    }
}
