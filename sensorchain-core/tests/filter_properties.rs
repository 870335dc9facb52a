//! Property tests for window bounds, emission cadence and gating

use proptest::prelude::*;

use sensorchain_core::filter::{
    DeltaFilter, MaxFilter, MedianFilter, MinFilter, QuantileFilter, ThrottleFilter,
};
use sensorchain_core::{Filter, FilterContext, TimerQueue};

fn feed_at(filter: &mut dyn Filter, readings: &[(u64, f32)]) -> Vec<Option<f32>> {
    let mut timers = TimerQueue::new();
    readings
        .iter()
        .map(|&(now, value)| {
            let mut ctx = FilterContext::new(now, &mut timers, 2);
            filter.new_value(value, &mut ctx)
        })
        .collect()
}

fn feed(filter: &mut dyn Filter, values: &[f32]) -> Vec<Option<f32>> {
    let timed: Vec<(u64, f32)> = values.iter().map(|&v| (0, v)).collect();
    feed_at(filter, &timed)
}

fn reading() -> impl Strategy<Value = f32> {
    prop_oneof![
        9 => -1000.0f32..1000.0,
        1 => Just(f32::NAN),
    ]
}

proptest! {
    #[test]
    fn window_holds_at_most_window_size(
        window in 1usize..20,
        values in prop::collection::vec(reading(), 0..60),
    ) {
        let mut median = MedianFilter::new(window, 1, 1);
        feed(&mut median, &values);
        prop_assert_eq!(median.window_len(), values.len().min(window));
    }

    #[test]
    fn emissions_follow_cadence(
        send_every in 1usize..10,
        first in 0usize..10,
        count in 0usize..50,
    ) {
        let send_first_at = first.min(send_every);
        let mut max = MaxFilter::new(3, send_every, send_first_at);
        let values: Vec<f32> = (0..count).map(|i| i as f32).collect();
        let out = feed(&mut max, &values);

        let first_emission = send_first_at.max(1);
        for (i, result) in out.iter().enumerate() {
            let input = i + 1;
            let expected = input >= first_emission && (input - first_emission) % send_every == 0;
            prop_assert_eq!(result.is_some(), expected, "input {}", input);
        }
    }

    #[test]
    fn aggregates_stay_within_valid_range(values in prop::collection::vec(reading(), 1..30)) {
        let n = values.len();
        let valid: Vec<f32> = values.iter().copied().filter(|v| !v.is_nan()).collect();

        let mut median = MedianFilter::new(n, n, n);
        let mut quantile = QuantileFilter::new(n, n, n, 0.75);
        let mut min = MinFilter::new(n, n, n);
        let median = feed(&mut median, &values)[n - 1].unwrap();
        let quantile = feed(&mut quantile, &values)[n - 1].unwrap();
        let min = feed(&mut min, &values)[n - 1].unwrap();

        if valid.is_empty() {
            prop_assert!(median.is_nan() && quantile.is_nan() && min.is_nan());
        } else {
            let lo = valid.iter().copied().fold(f32::INFINITY, f32::min);
            let hi = valid.iter().copied().fold(f32::NEG_INFINITY, f32::max);
            prop_assert_eq!(min, lo);
            prop_assert!(median >= lo && median <= hi);
            prop_assert!(valid.contains(&quantile));
        }
    }

    #[test]
    fn throttle_outputs_are_spaced(
        gaps in prop::collection::vec(0u64..500, 1..40),
        interval in 1u32..1000,
    ) {
        let mut now = 0;
        let readings: Vec<(u64, f32)> = gaps
            .iter()
            .map(|gap| {
                now += gap;
                (now, now as f32)
            })
            .collect();

        let mut throttle = ThrottleFilter::new(interval);
        let passed: Vec<u64> = feed_at(&mut throttle, &readings)
            .into_iter()
            .zip(&readings)
            .filter_map(|(out, &(at, _))| out.map(|_| at))
            .collect();

        prop_assert_eq!(passed[0], readings[0].0);
        for pair in passed.windows(2) {
            prop_assert!(pair[1] - pair[0] >= interval as u64);
        }
    }

    #[test]
    fn delta_outputs_differ_by_threshold(
        values in prop::collection::vec(-100.0f32..100.0, 1..50),
        threshold in 0.0f32..10.0,
    ) {
        let mut delta = DeltaFilter::new(threshold);
        let passed: Vec<f32> = feed(&mut delta, &values).into_iter().flatten().collect();

        prop_assert_eq!(passed[0], values[0]);
        for pair in passed.windows(2) {
            prop_assert!((pair[1] - pair[0]).abs() >= threshold);
        }
    }
}
