//! Benchmarks for the window clock, aggregator and pipeline throughput

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;
use tokio::runtime::Runtime;
use tokio::sync::{mpsc, watch};
use window_counter_processor::{
    InboundEvent, KeyPolicy, ManualClock, MemorySink, TumblingWindowAssigner, WindowAggregator,
    WindowConfig, WindowedCountPipeline,
};

fn keyed_events(count: usize, distinct_keys: usize, span_ms: i64) -> Vec<InboundEvent> {
    (0..count)
        .map(|i| {
            InboundEvent::new(Vec::new())
                .with_key(format!("key-{}", i % distinct_keys))
                .with_timestamp(i as i64 * span_ms / count as i64)
        })
        .collect()
}

fn bench_window_start(c: &mut Criterion) {
    let clock = TumblingWindowAssigner::new(60_000).unwrap();

    c.bench_function("window_start", |b| {
        b.iter(|| black_box(clock.window_start(black_box(1_699_564_812_345))));
    });
}

fn bench_observe(c: &mut Criterion) {
    let mut group = c.benchmark_group("observe");

    for distinct_keys in [1, 100, 10_000] {
        let events = keyed_events(10_000, distinct_keys, 60_000);
        group.throughput(Throughput::Elements(events.len() as u64));

        group.bench_with_input(
            BenchmarkId::new("single_window", distinct_keys),
            &events,
            |b, events| {
                b.iter(|| {
                    let assigner = TumblingWindowAssigner::new(60_000).unwrap();
                    let mut agg = WindowAggregator::new(assigner, KeyPolicy::default(), 0);
                    for event in events {
                        black_box(agg.observe(event, 0));
                    }
                    black_box(agg.tick(60_000))
                });
            },
        );
    }

    let events = keyed_events(10_000, 100, 600_000);
    group.throughput(Throughput::Elements(events.len() as u64));
    group.bench_with_input(BenchmarkId::new("ten_windows", 100), &events, |b, events| {
        b.iter(|| {
            let assigner = TumblingWindowAssigner::new(60_000).unwrap();
            let mut agg = WindowAggregator::new(assigner, KeyPolicy::default(), 0);
            let mut closed = 0;
            for event in events {
                closed += agg.observe(event, 0).closed.is_some() as usize;
            }
            black_box(closed)
        });
    });

    group.finish();
}

fn bench_pipeline_throughput(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("pipeline_throughput");

    for count in [1_000usize, 10_000] {
        let events = keyed_events(count, 100, 600_000);
        group.throughput(Throughput::Elements(count as u64));

        group.bench_with_input(BenchmarkId::from_parameter(count), &events, |b, events| {
            b.to_async(&rt).iter(|| async move {
                let pipeline = WindowedCountPipeline::new(
                    WindowConfig::new(60_000, 1_000),
                    Arc::new(MemorySink::new()),
                    "bench",
                    Arc::new(ManualClock::new(0)),
                )
                .unwrap();

                let (tx, rx) = mpsc::channel(1024);
                let (_shutdown_tx, shutdown_rx) = watch::channel(false);
                let handle = tokio::spawn(pipeline.run(rx, shutdown_rx));

                for event in events {
                    tx.send(event.clone()).await.unwrap();
                }
                drop(tx);
                black_box(handle.await.unwrap().unwrap())
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_window_start,
    bench_observe,
    bench_pipeline_throughput
);
criterion_main!(benches);
