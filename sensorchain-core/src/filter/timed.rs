//! Time-gated stages
//!
//! ## Overview
//!
//! | Stage | Gate | `new_value` | Timer |
//! |-------|------|-------------|-------|
//! | [`ThrottleFilter`] | timestamp | passes if interval elapsed | none |
//! | [`ThrottleAverageFilter`] | interval | accumulates, never emits | emits mean |
//! | [`TimeoutFilter`] | one-shot | passes, re-arms | emits fallback |
//! | [`DebounceFilter`] | one-shot | stores, re-arms | emits last |
//! | [`HeartbeatFilter`] | interval | stores, never emits | emits last |
//!
//! Periodic timers are registered in `initialize`, only when not already
//! pending, so re-assembling a chain keeps both the accumulated state and the
//! running period.

use crate::constants::{TIMER_DEBOUNCE, TIMER_HEARTBEAT, TIMER_THROTTLE_AVERAGE, TIMER_TIMEOUT};
use crate::time::Timestamp;

use super::{Filter, FilterContext};

fn assert_period(period_ms: u32, filter: &str) {
    assert!(period_ms > 0, "{} period must be greater than zero", filter);
}

/// Pass at most one value per `min_interval_ms`
#[derive(Debug, Clone)]
pub struct ThrottleFilter {
    min_interval_ms: u32,
    last_input: Option<Timestamp>,
}

impl ThrottleFilter {
    /// Create a throttle stage
    pub fn new(min_interval_ms: u32) -> Self {
        Self { min_interval_ms, last_input: None }
    }

    /// Minimum spacing between passed values
    pub fn min_interval_ms(&self) -> u32 {
        self.min_interval_ms
    }
}

impl Filter for ThrottleFilter {
    fn new_value(&mut self, value: f32, ctx: &mut FilterContext<'_>) -> Option<f32> {
        let now = ctx.now();
        let due = match self.last_input {
            None => true,
            Some(last) => now.saturating_sub(last) >= self.min_interval_ms as u64,
        };
        if due {
            self.last_input = Some(now);
            Some(value)
        } else {
            None
        }
    }

    fn name(&self) -> &'static str {
        "ThrottleFilter"
    }
}

/// Emit the mean of the valid readings once per period
///
/// A period with only `NaN` readings emits `NaN`; a period with no readings
/// emits nothing.
#[derive(Debug, Clone)]
pub struct ThrottleAverageFilter {
    period_ms: u32,
    sum: f32,
    count: u32,
    have_nan: bool,
}

impl ThrottleAverageFilter {
    /// Create a throttle average stage
    ///
    /// Panics if `period_ms` is zero.
    pub fn new(period_ms: u32) -> Self {
        assert_period(period_ms, "throttle_average");
        Self { period_ms, sum: 0.0, count: 0, have_nan: false }
    }

    /// Averaging period
    pub fn period_ms(&self) -> u32 {
        self.period_ms
    }
}

impl Filter for ThrottleAverageFilter {
    fn new_value(&mut self, value: f32, _ctx: &mut FilterContext<'_>) -> Option<f32> {
        if value.is_nan() {
            self.have_nan = true;
        } else {
            self.sum += value;
            self.count += 1;
        }
        None
    }

    fn initialize(&mut self, ctx: &mut FilterContext<'_>) {
        if !ctx.is_pending(TIMER_THROTTLE_AVERAGE) {
            ctx.set_interval(TIMER_THROTTLE_AVERAGE, self.period_ms);
        }
    }

    fn on_timer(&mut self, timer: &'static str, _ctx: &mut FilterContext<'_>) -> Option<f32> {
        if timer != TIMER_THROTTLE_AVERAGE {
            return None;
        }
        let output = if self.count > 0 {
            let mean = self.sum / self.count as f32;
            self.sum = 0.0;
            self.count = 0;
            Some(mean)
        } else if self.have_nan {
            Some(f32::NAN)
        } else {
            None
        };
        self.have_nan = false;
        output
    }

    fn name(&self) -> &'static str {
        "ThrottleAverageFilter"
    }
}

/// Pass values through; emit a fallback when none arrive for a while
#[derive(Debug, Clone)]
pub struct TimeoutFilter {
    timeout_ms: u32,
    fallback: f32,
}

impl TimeoutFilter {
    /// Create a timeout stage whose fallback is `NaN`
    ///
    /// Panics if `timeout_ms` is zero.
    pub fn new(timeout_ms: u32) -> Self {
        Self::with_fallback(timeout_ms, f32::NAN)
    }

    /// Create a timeout stage emitting `fallback` on expiry
    pub fn with_fallback(timeout_ms: u32, fallback: f32) -> Self {
        assert_period(timeout_ms, "timeout");
        Self { timeout_ms, fallback }
    }

    /// Value emitted when the timeout expires
    pub fn fallback(&self) -> f32 {
        self.fallback
    }
}

impl Filter for TimeoutFilter {
    fn new_value(&mut self, value: f32, ctx: &mut FilterContext<'_>) -> Option<f32> {
        ctx.set_timeout(TIMER_TIMEOUT, self.timeout_ms);
        Some(value)
    }

    fn on_timer(&mut self, timer: &'static str, _ctx: &mut FilterContext<'_>) -> Option<f32> {
        (timer == TIMER_TIMEOUT).then_some(self.fallback)
    }

    fn name(&self) -> &'static str {
        "TimeoutFilter"
    }
}

/// Emit the last value once inputs have been quiet for `period_ms`
#[derive(Debug, Clone)]
pub struct DebounceFilter {
    period_ms: u32,
    pending: Option<f32>,
}

impl DebounceFilter {
    /// Create a debounce stage
    ///
    /// Panics if `period_ms` is zero.
    pub fn new(period_ms: u32) -> Self {
        assert_period(period_ms, "debounce");
        Self { period_ms, pending: None }
    }
}

impl Filter for DebounceFilter {
    fn new_value(&mut self, value: f32, ctx: &mut FilterContext<'_>) -> Option<f32> {
        self.pending = Some(value);
        ctx.set_timeout(TIMER_DEBOUNCE, self.period_ms);
        None
    }

    fn on_timer(&mut self, timer: &'static str, _ctx: &mut FilterContext<'_>) -> Option<f32> {
        if timer == TIMER_DEBOUNCE {
            self.pending.take()
        } else {
            None
        }
    }

    fn name(&self) -> &'static str {
        "DebounceFilter"
    }
}

/// Re-emit the last value every period
#[derive(Debug, Clone)]
pub struct HeartbeatFilter {
    period_ms: u32,
    last: Option<f32>,
}

impl HeartbeatFilter {
    /// Create a heartbeat stage
    ///
    /// Panics if `period_ms` is zero.
    pub fn new(period_ms: u32) -> Self {
        assert_period(period_ms, "heartbeat");
        Self { period_ms, last: None }
    }

    /// Heartbeat period
    pub fn period_ms(&self) -> u32 {
        self.period_ms
    }
}

impl Filter for HeartbeatFilter {
    fn new_value(&mut self, value: f32, _ctx: &mut FilterContext<'_>) -> Option<f32> {
        self.last = Some(value);
        None
    }

    fn initialize(&mut self, ctx: &mut FilterContext<'_>) {
        if !ctx.is_pending(TIMER_HEARTBEAT) {
            ctx.set_interval(TIMER_HEARTBEAT, self.period_ms);
        }
    }

    fn on_timer(&mut self, timer: &'static str, _ctx: &mut FilterContext<'_>) -> Option<f32> {
        if timer == TIMER_HEARTBEAT {
            self.last
        } else {
            None
        }
    }

    fn name(&self) -> &'static str {
        "HeartbeatFilter"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::{StageId, TimerQueue};

    /// Drive a single stage with manual time
    struct Bench<F: Filter> {
        filter: F,
        timers: TimerQueue,
        stage: StageId,
        now: Timestamp,
    }

    impl<F: Filter> Bench<F> {
        fn new(filter: F) -> Self {
            let mut bench = Self {
                filter,
                timers: TimerQueue::new(),
                stage: StageId::next(),
                now: 0,
            };
            let mut ctx = FilterContext::new(0, &mut bench.timers, 2);
            ctx.enter(bench.stage);
            bench.filter.initialize(&mut ctx);
            bench
        }

        fn input(&mut self, value: f32) -> Option<f32> {
            let mut ctx = FilterContext::new(self.now, &mut self.timers, 2);
            ctx.enter(self.stage);
            self.filter.new_value(value, &mut ctx)
        }

        /// Advance to `now`, collecting every timer output on the way
        fn advance_to(&mut self, now: Timestamp) -> alloc::vec::Vec<Option<f32>> {
            let mut fired = alloc::vec::Vec::new();
            while let Some(deadline) = self.timers.next_deadline().filter(|d| *d <= now) {
                self.now = deadline;
                let key = self.timers.pop_due(deadline).unwrap();
                let mut ctx = FilterContext::new(deadline, &mut self.timers, 2);
                ctx.enter(self.stage);
                fired.push(self.filter.on_timer(key.name, &mut ctx));
            }
            self.now = now;
            fired
        }
    }

    #[test]
    fn throttle_passes_first_of_burst() {
        let mut bench = Bench::new(ThrottleFilter::new(1000));
        assert_eq!(bench.input(1.0), Some(1.0));
        bench.advance_to(500);
        assert_eq!(bench.input(2.0), None);
        bench.advance_to(999);
        assert_eq!(bench.input(3.0), None);
        bench.advance_to(1000);
        assert_eq!(bench.input(4.0), Some(4.0));
    }

    #[test]
    fn throttle_passes_spaced_values() {
        let mut bench = Bench::new(ThrottleFilter::new(100));
        for i in 0..5 {
            bench.advance_to(i * 150);
            assert_eq!(bench.input(i as f32), Some(i as f32));
        }
    }

    #[test]
    fn throttle_average_emits_mean_per_period() {
        let mut bench = Bench::new(ThrottleAverageFilter::new(1000));
        assert_eq!(bench.input(1.0), None);
        assert_eq!(bench.input(f32::NAN), None);
        assert_eq!(bench.input(3.0), None);

        assert_eq!(bench.advance_to(1000), [Some(2.0)]);
        // Nothing seen in the next period
        assert_eq!(bench.advance_to(2000), [None]);

        bench.input(f32::NAN);
        let fired = bench.advance_to(3000);
        assert!(fired[0].unwrap().is_nan());
        // NaN flag resets with every firing
        assert_eq!(bench.advance_to(4000), [None]);
    }

    #[test]
    fn timeout_emits_fallback_after_silence() {
        let mut bench = Bench::new(TimeoutFilter::with_fallback(500, -1.0));
        assert_eq!(bench.input(7.0), Some(7.0));
        assert!(bench.advance_to(400).is_empty());
        assert_eq!(bench.input(8.0), Some(8.0));
        assert!(bench.advance_to(800).is_empty());
        assert_eq!(bench.advance_to(900), [Some(-1.0)]);
        assert!(bench.advance_to(5000).is_empty());
    }

    #[test]
    fn timeout_default_fallback_is_nan() {
        assert!(TimeoutFilter::new(10).fallback().is_nan());
    }

    #[test]
    fn debounce_emits_last_value_once_quiet() {
        let mut bench = Bench::new(DebounceFilter::new(100));
        assert_eq!(bench.input(1.0), None);
        bench.advance_to(50);
        assert_eq!(bench.input(2.0), None);
        assert!(bench.advance_to(149).is_empty());
        assert_eq!(bench.advance_to(150), [Some(2.0)]);
        assert!(bench.advance_to(1000).is_empty());
    }

    #[test]
    fn heartbeat_repeats_last_value() {
        let mut bench = Bench::new(HeartbeatFilter::new(1000));
        // Nothing to repeat yet
        assert_eq!(bench.advance_to(1000), [None]);

        assert_eq!(bench.input(4.0), None);
        assert_eq!(bench.input(5.0), None);
        assert_eq!(bench.advance_to(3000), [Some(5.0), Some(5.0)]);
    }

    #[test]
    fn reinitialize_keeps_running_interval() {
        let mut bench = Bench::new(HeartbeatFilter::new(1000));
        bench.advance_to(600);
        let mut ctx = FilterContext::new(600, &mut bench.timers, 2);
        ctx.enter(bench.stage);
        bench.filter.initialize(&mut ctx);
        assert_eq!(bench.timers.next_deadline(), Some(1000));
    }

    #[test]
    fn reinitialize_keeps_accumulated_values() {
        let mut heartbeat = Bench::new(HeartbeatFilter::new(1000));
        heartbeat.input(4.0);
        let mut average = Bench::new(ThrottleAverageFilter::new(1000));
        average.input(1.0);
        average.input(2.0);

        let mut ctx = FilterContext::new(500, &mut heartbeat.timers, 2);
        ctx.enter(heartbeat.stage);
        heartbeat.filter.initialize(&mut ctx);
        let mut ctx = FilterContext::new(500, &mut average.timers, 2);
        ctx.enter(average.stage);
        average.filter.initialize(&mut ctx);

        assert_eq!(heartbeat.advance_to(1000), [Some(4.0)]);
        assert_eq!(average.advance_to(1000), [Some(1.5)]);
    }

    #[test]
    #[should_panic]
    fn zero_debounce_panics() {
        let _ = DebounceFilter::new(0);
    }
}
