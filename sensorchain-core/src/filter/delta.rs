//! Change-based suppression
//!
//! A reading passes only if it moved far enough from the last one that
//! passed. In percentage mode the threshold scales with the last accepted
//! reading.

use super::{Filter, FilterContext};

/// Pass values that differ from the last passed value by at least a threshold
///
/// `NaN` always passes. It also clears the reference value, so the next real
/// reading passes as if it were the first, and puts a percentage threshold
/// back to its configured base.
#[derive(Debug, Clone)]
pub struct DeltaFilter {
    delta: f32,
    percentage: bool,
    current_delta: f32,
    last_value: f32,
}

impl DeltaFilter {
    /// Absolute threshold
    ///
    /// Panics if `delta` is negative or not finite.
    pub fn new(delta: f32) -> Self {
        Self::build(delta, false)
    }

    /// Threshold as a fraction of the last passed value (`0.1` is 10 %)
    pub fn percentage(fraction: f32) -> Self {
        Self::build(fraction, true)
    }

    fn build(delta: f32, percentage: bool) -> Self {
        assert!(delta.is_finite() && delta >= 0.0, "delta must be a finite, non-negative number");
        Self {
            delta,
            percentage,
            current_delta: delta,
            last_value: f32::NAN,
        }
    }

    /// Threshold the next reading is compared against
    pub fn current_delta(&self) -> f32 {
        self.current_delta
    }

    /// Whether the threshold is relative to the last passed value
    pub fn is_percentage(&self) -> bool {
        self.percentage
    }
}

impl Filter for DeltaFilter {
    fn new_value(&mut self, value: f32, _ctx: &mut FilterContext<'_>) -> Option<f32> {
        if value.is_nan() {
            self.last_value = f32::NAN;
            self.current_delta = self.delta;
            return Some(value);
        }

        let accept = self.last_value.is_nan() || libm::fabsf(value - self.last_value) >= self.current_delta;
        if !accept {
            return None;
        }

        if self.percentage {
            self.current_delta = libm::fabsf(value * self.delta);
        }
        self.last_value = value;
        Some(value)
    }

    fn name(&self) -> &'static str {
        "DeltaFilter"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::TimerQueue;
    use alloc::vec::Vec;

    fn run(filter: &mut DeltaFilter, values: &[f32]) -> Vec<f32> {
        let mut timers = TimerQueue::new();
        let mut ctx = FilterContext::new(0, &mut timers, 2);
        values.iter().filter_map(|&v| filter.new_value(v, &mut ctx)).collect()
    }

    #[test]
    fn absolute_threshold() {
        let mut delta = DeltaFilter::new(2.0);
        assert_eq!(run(&mut delta, &[10.0, 11.0, 13.0, 13.9, 16.0]), [10.0, 13.0, 16.0]);
    }

    #[test]
    fn percentage_threshold_follows_last_value() {
        let mut delta = DeltaFilter::percentage(0.1);
        assert_eq!(run(&mut delta, &[100.0, 105.0, 111.0, 120.0, 123.0]), [100.0, 111.0, 123.0]);
        assert!(libm::fabsf(delta.current_delta() - 12.3) < 1e-4);
    }

    #[test]
    fn nan_passes_and_resets_reference() {
        let mut delta = DeltaFilter::percentage(0.5);
        let out = run(&mut delta, &[10.0, f32::NAN, 10.5]);
        assert_eq!(out.len(), 3);
        assert!(out[1].is_nan());
        assert_eq!(out[2], 10.5);
        assert_eq!(delta.current_delta(), 5.25);
    }

    #[test]
    fn zero_threshold_passes_repeats() {
        let mut delta = DeltaFilter::new(0.0);
        assert_eq!(run(&mut delta, &[1.0, 1.0]), [1.0, 1.0]);
    }
}
