//! Sensor: owner of a filter chain
//!
//! ## Overview
//!
//! A [`Sensor`] is where raw readings enter and filtered states leave:
//!
//! ```text
//! driver ─→ publish_state(raw) ─→ raw callbacks
//!                  │
//!                  ▼
//!            FilterChain ─→ state, has_state ─→ state callbacks
//!                  ▲
//! main loop ─→ poll() (due timers)
//! ```
//!
//! The sensor owns the clock and the timer queue its stages use. Nothing runs
//! in the background: time-gated stages only emit from [`Sensor::poll`], so
//! the driver's main loop must call it regularly. [`Sensor::next_timer_in`]
//! says how long the loop may sleep.
//!
//! ## Example
//!
//! ```rust
//! use sensorchain_core::Sensor;
//! use sensorchain_core::filter::{DebounceFilter, OffsetFilter};
//! use sensorchain_core::time::ManualTime;
//!
//! let mut sensor = Sensor::new("Water Level", ManualTime::new(0));
//! sensor.add_filter(OffsetFilter::new(2.0)).unwrap();
//! sensor.add_filter(DebounceFilter::new(500)).unwrap();
//!
//! sensor.publish_state(40.0);
//! assert!(!sensor.has_state());
//!
//! sensor.clock_mut().advance(500);
//! sensor.poll();
//! assert_eq!(sensor.state(), 42.0);
//! ```

use alloc::{boxed::Box, string::String, vec::Vec};

use crate::{
    errors::FilterResult,
    filter::{Filter, FilterChain, FilterContext, TimerDispatch},
    scheduler::TimerQueue,
    time::TimeSource,
};

type StateCallback = Box<dyn FnMut(f32) + Send>;

fn within(value: f32, above: Option<f32>, below: Option<f32>) -> bool {
    !value.is_nan()
        && above.map_or(true, |min| value >= min)
        && below.map_or(true, |max| value <= max)
}

/// Callback fired when the state enters `[above, below]`
struct RangeTrigger {
    above: Option<f32>,
    below: Option<f32>,
    in_range: bool,
    callback: StateCallback,
}

impl RangeTrigger {
    fn check(&mut self, state: f32) {
        if state.is_nan() {
            return;
        }
        let in_range = within(state, self.above, self.below);
        if in_range && !self.in_range {
            (self.callback)(state);
        }
        self.in_range = in_range;
    }
}

/// A named value source with a filter chain
pub struct Sensor<T: TimeSource> {
    name: String,
    unit_of_measurement: Option<String>,
    accuracy_decimals: i8,
    clock: T,
    timers: TimerQueue,
    filters: FilterChain,
    raw_state: f32,
    state: f32,
    has_state: bool,
    raw_callbacks: Vec<StateCallback>,
    state_callbacks: Vec<StateCallback>,
    range_triggers: Vec<RangeTrigger>,
}

impl<T: TimeSource> Sensor<T> {
    /// Create a sensor without filters
    pub fn new(name: impl Into<String>, clock: T) -> Self {
        Self {
            name: name.into(),
            unit_of_measurement: None,
            accuracy_decimals: 0,
            clock,
            timers: TimerQueue::new(),
            filters: FilterChain::new(),
            raw_state: f32::NAN,
            state: f32::NAN,
            has_state: false,
            raw_callbacks: Vec::new(),
            state_callbacks: Vec::new(),
            range_triggers: Vec::new(),
        }
    }

    /// Sensor name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Unit of the published state
    pub fn unit_of_measurement(&self) -> Option<&str> {
        self.unit_of_measurement.as_deref()
    }

    /// Set the unit of the published state
    pub fn set_unit_of_measurement(&mut self, unit: impl Into<String>) {
        self.unit_of_measurement = Some(unit.into());
    }

    /// Decimals the state is meaningful to
    pub fn accuracy_decimals(&self) -> i8 {
        self.accuracy_decimals
    }

    /// Set the decimals the state is meaningful to
    pub fn set_accuracy_decimals(&mut self, decimals: i8) {
        self.accuracy_decimals = decimals;
    }

    /// Clock driving the time-gated stages
    pub fn clock(&self) -> &T {
        &self.clock
    }

    /// Mutable clock access, for simulated time
    pub fn clock_mut(&mut self) -> &mut T {
        &mut self.clock
    }

    /// Append a stage to the end of the chain
    pub fn add_filter<F: Filter + 'static>(&mut self, filter: F) -> FilterResult<()> {
        self.filters.add(filter)?;
        self.initialize_filters();
        Ok(())
    }

    /// Append several stages in order
    ///
    /// Stages added before an overflow stay in the chain.
    pub fn add_filters<I>(&mut self, filters: I) -> FilterResult<()>
    where
        I: IntoIterator<Item = Box<dyn Filter>>,
    {
        let mut result = Ok(());
        for filter in filters {
            result = self.filters.add_boxed(filter);
            if result.is_err() {
                break;
            }
        }
        self.initialize_filters();
        result
    }

    /// Replace the whole chain
    pub fn set_filters<I>(&mut self, filters: I) -> FilterResult<()>
    where
        I: IntoIterator<Item = Box<dyn Filter>>,
    {
        self.clear_filters();
        self.add_filters(filters)
    }

    /// Replace the whole chain with an assembled one
    pub fn set_filter_chain(&mut self, chain: FilterChain) {
        self.clear_filters();
        self.filters = chain;
        self.initialize_filters();
    }

    /// Remove every stage and its pending timers
    pub fn clear_filters(&mut self) {
        let now = self.clock.now();
        let mut ctx = FilterContext::new(now, &mut self.timers, self.accuracy_decimals);
        self.filters.clear(&mut ctx);
    }

    /// Number of top-level stages
    pub fn filter_count(&self) -> usize {
        self.filters.len()
    }

    /// Names of the top-level stages in order
    pub fn filter_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.filters.stage_names()
    }

    /// Feed a raw reading
    ///
    /// Raw callbacks see it first; whatever leaves the chain becomes the new
    /// state.
    pub fn publish_state(&mut self, value: f32) {
        self.raw_state = value;
        for callback in self.raw_callbacks.iter_mut() {
            callback(value);
        }

        let now = self.clock.now();
        let mut ctx = FilterContext::new(now, &mut self.timers, self.accuracy_decimals);
        let output = self.filters.input(value, &mut ctx);
        if let Some(state) = output {
            self.send_state(state);
        }
    }

    /// Fire every due timer, returning how many fired
    pub fn poll(&mut self) -> usize {
        let now = self.clock.now();
        let mut fired = 0;
        while let Some(key) = self.timers.pop_due(now) {
            fired += 1;
            let mut ctx = FilterContext::new(now, &mut self.timers, self.accuracy_decimals);
            match self.filters.fire(&key, &mut ctx) {
                TimerDispatch::Handled(Some(state)) => self.send_state(state),
                TimerDispatch::Handled(None) => {}
                TimerDispatch::Unknown => {
                    log_warn!("'{}': no stage owns timer '{}'", self.name.as_str(), key.name);
                }
            }
        }
        fired
    }

    /// Milliseconds until the next timer is due, `None` with no timer pending
    pub fn next_timer_in(&self) -> Option<u64> {
        let now = self.clock.now();
        self.timers.next_deadline().map(|deadline| deadline.saturating_sub(now))
    }

    /// Last filtered state, `NaN` before the first one
    pub fn state(&self) -> f32 {
        self.state
    }

    /// Last raw reading, `NaN` before the first one
    pub fn raw_state(&self) -> f32 {
        self.raw_state
    }

    /// Whether a filtered state was ever published
    pub fn has_state(&self) -> bool {
        self.has_state
    }

    /// Register a callback for every published state
    pub fn add_on_state_callback<F>(&mut self, callback: F)
    where
        F: FnMut(f32) + Send + 'static,
    {
        self.state_callbacks.push(Box::new(callback));
    }

    /// Check the filtered state against optional bounds
    ///
    /// `above` and `below` are inclusive; a missing bound is open. A `NaN`
    /// state, including the one before the first publication, is never in
    /// range.
    pub fn in_range(&self, above: Option<f32>, below: Option<f32>) -> bool {
        within(self.state, above, below)
    }

    /// Register a callback for states entering `[above, below]`
    ///
    /// Fires with the state on the transition from out of range into range,
    /// not again while the state stays inside. The trigger starts out of
    /// range, so a first state already inside fires it. `NaN` states are
    /// ignored.
    pub fn add_on_value_range_callback<F>(
        &mut self,
        above: Option<f32>,
        below: Option<f32>,
        callback: F,
    ) where
        F: FnMut(f32) + Send + 'static,
    {
        self.range_triggers.push(RangeTrigger {
            above,
            below,
            in_range: false,
            callback: Box::new(callback),
        });
    }

    /// Register a callback for every raw reading
    pub fn add_on_raw_state_callback<F>(&mut self, callback: F)
    where
        F: FnMut(f32) + Send + 'static,
    {
        self.raw_callbacks.push(Box::new(callback));
    }

    fn initialize_filters(&mut self) {
        let now = self.clock.now();
        let mut ctx = FilterContext::new(now, &mut self.timers, self.accuracy_decimals);
        self.filters.initialize(&mut ctx);
    }

    fn send_state(&mut self, state: f32) {
        self.state = state;
        self.has_state = true;
        log_debug!(
            "'{}': Sending state {} with {} decimals of accuracy",
            self.name.as_str(),
            state,
            self.accuracy_decimals
        );
        for callback in self.state_callbacks.iter_mut() {
            callback(state);
        }
        for trigger in self.range_triggers.iter_mut() {
            trigger.check(state);
        }
    }
}
