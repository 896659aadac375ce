//! Property tests for the window clock and aggregator

use proptest::prelude::*;
use std::collections::BTreeMap;
use window_counter_processor::{
    ClosedWindow, InboundEvent, KeyPolicy, TumblingWindowAssigner, WindowAggregator,
};

const KEYS: [&str; 4] = ["A", "B", "C", "D"];

/// Non-decreasing timestamps built from small gaps
fn ordered_events() -> impl Strategy<Value = Vec<(usize, i64)>> {
    prop::collection::vec((0..KEYS.len(), 0i64..700), 0..200).prop_map(|steps| {
        let mut ts = 0;
        steps
            .into_iter()
            .map(|(key, gap)| {
                ts += gap;
                (key, ts)
            })
            .collect()
    })
}

fn run(window_ms: u64, events: &[(usize, i64)]) -> Vec<ClosedWindow> {
    let assigner = TumblingWindowAssigner::new(window_ms).unwrap();
    let mut agg = WindowAggregator::new(assigner, KeyPolicy::default(), 0);
    let mut closed = Vec::new();

    for &(key, ts) in events {
        let event = InboundEvent::new(Vec::new())
            .with_key(KEYS[key])
            .with_timestamp(ts);
        if let Some(window) = agg.observe(&event, ts).closed {
            closed.push(window);
        }
    }
    closed.extend(agg.tick(i64::MAX / 2));
    closed
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn window_start_contains_timestamp(
        ts in -1_000_000_000_000i64..1_000_000_000_000,
        window_ms in 1u64..10_000_000,
    ) {
        let clock = TumblingWindowAssigner::new(window_ms).unwrap();
        let start = clock.window_start(ts);
        let size = window_ms as i64;

        prop_assert!(start <= ts);
        prop_assert!(ts < start + size);
        prop_assert_eq!(start.rem_euclid(size), 0);
        prop_assert_eq!(start, ts.div_euclid(size) * size);
    }

    #[test]
    fn same_window_timestamps_share_start(
        a in 0i64..1_000_000,
        offset in 0i64..1_000,
        window_ms in 1_000u64..100_000,
    ) {
        let clock = TumblingWindowAssigner::new(window_ms).unwrap();
        let start = clock.window_start(a);
        let b = (start + offset).max(a);
        prop_assume!(b < start + window_ms as i64);

        prop_assert_eq!(clock.window_start(b), start);
    }

    #[test]
    fn counts_are_conserved(events in ordered_events(), window_ms in 1u64..5_000) {
        let closed = run(window_ms, &events);

        let emitted: u64 = closed.iter().map(|w| w.event_count()).sum();
        prop_assert_eq!(emitted, events.len() as u64);

        let mut expected: BTreeMap<(i64, &str), u64> = BTreeMap::new();
        let size = window_ms as i64;
        for &(key, ts) in &events {
            *expected.entry((ts.div_euclid(size) * size, KEYS[key])).or_default() += 1;
        }

        let mut actual: BTreeMap<(i64, &str), u64> = BTreeMap::new();
        for window in &closed {
            for summary in window.summaries() {
                let key = KEYS.iter().find(|k| **k == summary.key).copied().unwrap();
                actual.insert((summary.window_start, key), summary.count);
            }
        }
        prop_assert_eq!(actual, expected);
    }

    #[test]
    fn windows_close_in_order_and_never_empty(events in ordered_events(), window_ms in 1u64..5_000) {
        let closed = run(window_ms, &events);

        for window in &closed {
            prop_assert!(window.key_count() > 0);
            prop_assert_eq!(window.bounds.size_ms(), window_ms as i64);
        }
        for pair in closed.windows(2) {
            prop_assert!(pair[0].bounds.start < pair[1].bounds.start);
        }
    }

    #[test]
    fn current_window_never_moves_backwards(
        timestamps in prop::collection::vec(-50_000i64..50_000, 1..100),
        window_ms in 1u64..2_000,
    ) {
        let assigner = TumblingWindowAssigner::new(window_ms).unwrap();
        let mut agg = WindowAggregator::new(assigner, KeyPolicy::default(), -50_000);
        let mut last = agg.current_window_start();

        for ts in timestamps {
            agg.observe(&InboundEvent::new(Vec::new()).with_timestamp(ts), ts);
            agg.tick(ts);
            prop_assert!(agg.current_window_start() >= last);
            last = agg.current_window_start();
        }
    }
}
