//! Wires the Kafka source, the windowed count pipeline and the sink together

use anyhow::Context;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::signal;
use tokio::sync::{mpsc, watch, RwLock};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use window_counter_config::{CounterConfig, SinkKind};
use window_counter_processor::{
    EmissionSink, KafkaEmissionSink, KafkaEventSource, LogSink, PipelineReport, PipelineStats,
    ProcessorResult, SystemClock, WindowedCountPipeline,
};

/// Capacity of the channel between the consumer and the pipeline
const EVENT_CHANNEL_CAPACITY: usize = 1024;

pub async fn run(config: CounterConfig) -> anyhow::Result<()> {
    info!(
        brokers = %config.kafka.brokers,
        input_topic = %config.kafka.input_topic,
        output_topic = %config.kafka.output_topic,
        window_ms = config.window.window_ms,
        sink = ?config.sink.kind,
        "Starting window counter"
    );

    let source = Arc::new(
        KafkaEventSource::new(config.kafka.source_config())
            .context("failed to create Kafka consumer")?,
    );

    let kafka_sink = match config.sink.kind {
        SinkKind::Kafka => Some(Arc::new(
            KafkaEmissionSink::new(config.kafka.sink_config())
                .context("failed to create Kafka producer")?,
        )),
        SinkKind::Log => None,
    };
    let sink: Arc<dyn EmissionSink> = match &kafka_sink {
        Some(kafka) => Arc::clone(kafka) as Arc<dyn EmissionSink>,
        None => Arc::new(LogSink),
    };

    let pipeline = WindowedCountPipeline::new(
        config.window.clone(),
        sink,
        config.kafka.output_topic.clone(),
        Arc::new(SystemClock),
    )?;
    let stats = pipeline.stats_handle();

    let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let source_handle = {
        let source = Arc::clone(&source);
        let shutdown = shutdown_rx.clone();
        tokio::spawn(async move { source.start(event_tx, shutdown).await })
    };

    let pipeline_handle = tokio::spawn(pipeline.run(event_rx, shutdown_rx));

    let stats_handle = spawn_stats_reporter(stats, config.observability.stats_interval_secs);

    info!("Window counter running. Press Ctrl+C to stop.");

    let outcome = supervise(source_handle, pipeline_handle, shutdown_tx, signal::ctrl_c()).await;

    if let Some(handle) = stats_handle {
        handle.abort();
    }

    if let Some(kafka) = kafka_sink {
        if let Err(e) = kafka.close() {
            warn!(error = %e, "Failed to flush Kafka producer");
        }
    }

    let metrics = source.metrics();
    info!(
        messages_consumed = metrics.messages_consumed,
        receive_errors = metrics.receive_errors,
        "Window counter stopped"
    );

    outcome.map(|_| ())
}

/// Wait for a shutdown signal or for either task to end, then stop both
///
/// Either task ending before the signal is a failure, as is any task error.
/// Both tasks are always awaited before returning.
async fn supervise<F>(
    mut source: JoinHandle<ProcessorResult<()>>,
    mut pipeline: JoinHandle<ProcessorResult<PipelineReport>>,
    shutdown_tx: watch::Sender<bool>,
    signal: F,
) -> anyhow::Result<PipelineReport>
where
    F: Future<Output = std::io::Result<()>>,
{
    let mut failures: Vec<anyhow::Error> = Vec::new();
    let mut source_result = None;
    let mut pipeline_result = None;

    tokio::select! {
        received = signal => match received {
            Ok(()) => info!("Received shutdown signal, stopping window counter"),
            Err(e) => failures.push(
                anyhow::Error::new(e).context("failed to listen for shutdown signal"),
            ),
        },
        result = &mut source => {
            warn!("Kafka source stopped before shutdown was requested");
            source_result = Some(result);
        }
        result = &mut pipeline => {
            warn!("Pipeline stopped before shutdown was requested");
            pipeline_result = Some(result);
        }
    }
    let stopped_early = source_result.is_some() || pipeline_result.is_some();

    // Receivers only fail once every task has already stopped
    let _ = shutdown_tx.send(true);

    let source_result = match source_result {
        Some(result) => result,
        None => source.await,
    };
    match source_result {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            error!(error = %e, "Kafka source failed");
            failures.push(anyhow::Error::new(e).context("Kafka source failed"));
        }
        Err(e) => {
            error!(error = %e, "Kafka source task panicked");
            failures.push(anyhow::Error::new(e).context("Kafka source task panicked"));
        }
    }

    let pipeline_result = match pipeline_result {
        Some(result) => result,
        None => pipeline.await,
    };
    let report = match pipeline_result {
        Ok(Ok(report)) => {
            info!(
                events_received = report.events_received,
                windows_closed = report.aggregator.windows_closed,
                summaries_sent = report.emitter.summaries_sent,
                summaries_lost = report.emitter.summaries_lost,
                discarded_open_events = report.discarded_open_events,
                "Pipeline finished"
            );
            Some(report)
        }
        Ok(Err(e)) => {
            error!(error = %e, "Pipeline failed");
            failures.push(anyhow::Error::new(e).context("pipeline failed"));
            None
        }
        Err(e) => {
            error!(error = %e, "Pipeline task panicked");
            failures.push(anyhow::Error::new(e).context("pipeline task panicked"));
            None
        }
    };

    if stopped_early {
        failures.push(anyhow::anyhow!("window counter stopped before shutdown was requested"));
    }

    match (failures.into_iter().next(), report) {
        (Some(e), _) => Err(e),
        (None, Some(report)) => Ok(report),
        (None, None) => Err(anyhow::anyhow!("pipeline produced no report")),
    }
}

fn spawn_stats_reporter(
    stats: Arc<RwLock<PipelineStats>>,
    interval_secs: u64,
) -> Option<JoinHandle<()>> {
    if interval_secs == 0 {
        return None;
    }

    Some(tokio::spawn(async move {
        let started = Instant::now();
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;

            let stats = stats.read().await.clone();
            info!(
                events_received = stats.events_received,
                events_per_second = stats.events_per_second(started.elapsed().as_secs_f64()),
                window_start = stats.current_window_start,
                open_keys = stats.open_window_keys,
                windows_closed = stats.aggregator.windows_closed,
                late_events_dropped = stats.aggregator.late_events_dropped,
                batches_sent = stats.emitter.batches_sent,
                batches_failed = stats.emitter.batches_failed,
                summaries_lost = stats.emitter.summaries_lost,
                "Pipeline statistics"
            );

            if stats.emitter.batches_failed > 0 {
                warn!("Window summaries have been lost");
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use window_counter_processor::{
        InboundEvent, ManualClock, MemorySink, ProcessorError, WindowConfig,
    };

    fn spawn_pipeline(
        events: mpsc::Receiver<InboundEvent>,
        shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<ProcessorResult<PipelineReport>> {
        let pipeline = WindowedCountPipeline::new(
            WindowConfig::new(1000, 10),
            Arc::new(MemorySink::new()),
            "window-counts",
            Arc::new(ManualClock::new(0)),
        )
        .unwrap();
        tokio::spawn(pipeline.run(events, shutdown))
    }

    #[tokio::test]
    async fn test_failed_source_stops_service() {
        let (event_tx, event_rx) = mpsc::channel(16);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let source = tokio::spawn(async move {
            drop(event_tx);
            Err(ProcessorError::config("subscribe failed"))
        });
        let pipeline = spawn_pipeline(event_rx, shutdown_rx);

        let outcome = tokio::time::timeout(
            Duration::from_secs(5),
            supervise(
                source,
                pipeline,
                shutdown_tx,
                std::future::pending::<std::io::Result<()>>(),
            ),
        )
        .await
        .expect("service did not stop after the source failed");

        let err = outcome.unwrap_err();
        assert!(format!("{:#}", err).contains("subscribe failed"));
    }

    #[tokio::test]
    async fn test_source_ending_early_is_an_error() {
        let (event_tx, event_rx) = mpsc::channel(16);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let source = tokio::spawn(async move {
            event_tx
                .send(InboundEvent::new(Vec::new()).with_key("A").with_timestamp(10))
                .await
                .unwrap();
            Ok(())
        });
        let pipeline = spawn_pipeline(event_rx, shutdown_rx);

        let outcome = tokio::time::timeout(
            Duration::from_secs(5),
            supervise(
                source,
                pipeline,
                shutdown_tx,
                std::future::pending::<std::io::Result<()>>(),
            ),
        )
        .await
        .expect("service did not stop after the source ended");

        let err = outcome.unwrap_err();
        assert!(err.to_string().contains("stopped before shutdown was requested"));
    }

    #[tokio::test]
    async fn test_signal_stops_both_tasks() {
        let (event_tx, event_rx) = mpsc::channel(16);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let mut source_shutdown = shutdown_rx.clone();
        let source = tokio::spawn(async move {
            event_tx
                .send(InboundEvent::new(Vec::new()).with_key("A").with_timestamp(10))
                .await
                .unwrap();
            while !*source_shutdown.borrow() {
                if source_shutdown.changed().await.is_err() {
                    break;
                }
            }
            Ok(())
        });
        let pipeline = spawn_pipeline(event_rx, shutdown_rx);

        let report = tokio::time::timeout(
            Duration::from_secs(5),
            supervise(source, pipeline, shutdown_tx, async { Ok(()) }),
        )
        .await
        .expect("service did not stop after the signal")
        .unwrap();

        assert_eq!(report.final_window_start, 0);
    }
}
