//! Filter stages and the chain protocol
//!
//! ## Overview
//!
//! A sensor owns an ordered [`FilterChain`]. A raw reading enters the first
//! stage; whatever a stage returns from [`Filter::new_value`] is handed to the
//! next stage, and whatever leaves the last stage is published by the sensor.
//!
//! ```text
//! raw ─→ [Offset] ─→ [Median] ─→ [Delta] ─→ publish
//!                        │
//!                      None (window not due) ─→ nothing published
//! ```
//!
//! ## Contract
//!
//! - `Some(v)` forwards `v`; `None` swallows the input. `NaN` is a value and
//!   is forwarded like any other.
//! - Time-gated stages arm timers through the [`FilterContext`]. When a timer
//!   fires, the chain calls [`Filter::on_timer`] on the stage that armed it
//!   and forwards its result to the *following* stage, exactly as if
//!   `new_value` had returned it.
//! - [`Filter::initialize`] runs whenever the owning chain is (re)assembled.
//!   It must be idempotent and must not reset accumulated state.
//!
//! ## Module Organization
//!
//! - `chain` - the chain container and dispatch
//! - `window` - median, quantile, min, max, sliding window moving average
//! - `average` - exponential moving average
//! - `timed` - throttle, throttle average, timeout, debounce, heartbeat
//! - `delta` - delta filter
//! - `or` - first-result-wins combinator
//! - `transform` - lambda, offset, multiply, filter out, clamp, round, skip
//! - `calibrate` - linear and polynomial calibration

use crate::scheduler::{StageId, TimerKey, TimerQueue};
use crate::time::Timestamp;

pub mod average;
pub mod calibrate;
pub mod chain;
pub mod delta;
pub mod or;
pub mod timed;
pub mod transform;
pub mod window;

pub use average::ExponentialMovingAverageFilter;
pub use calibrate::{CalibrateLinearFilter, CalibratePolynomialFilter, LinearSegment};
pub use chain::{ChainBuilder, FilterChain};
pub use delta::DeltaFilter;
pub use or::OrFilter;
pub use timed::{DebounceFilter, HeartbeatFilter, ThrottleAverageFilter, ThrottleFilter, TimeoutFilter};
pub use transform::{
    ClampFilter, FilterOutValueFilter, LambdaFilter, MultiplyFilter, OffsetFilter,
    RoundFilter, RoundMultipleFilter, SkipInitialFilter,
};
pub use window::{MaxFilter, MedianFilter, MinFilter, QuantileFilter, SlidingWindowMovingAverageFilter};

/// One stage of a filter chain
///
/// ## Example: scaling stage
///
/// ```rust
/// use sensorchain_core::filter::{Filter, FilterContext};
///
/// struct MillivoltsToVolts;
///
/// impl Filter for MillivoltsToVolts {
///     fn new_value(&mut self, value: f32, _ctx: &mut FilterContext<'_>) -> Option<f32> {
///         Some(value / 1000.0)
///     }
///
///     fn name(&self) -> &'static str {
///         "MillivoltsToVolts"
///     }
/// }
/// ```
pub trait Filter: Send {
    /// Transform one input; `None` means nothing is forwarded for it
    fn new_value(&mut self, value: f32, ctx: &mut FilterContext<'_>) -> Option<f32>;

    /// Stage name for logs
    fn name(&self) -> &'static str;

    /// Bind to the chain: register periodic timers, initialize sub-chains
    ///
    /// Called every time the owning chain is assembled or extended. Must be
    /// idempotent and keep accumulated state.
    fn initialize(&mut self, _ctx: &mut FilterContext<'_>) {}

    /// A timer armed by this stage fired; the result continues down the chain
    fn on_timer(&mut self, _timer: &'static str, _ctx: &mut FilterContext<'_>) -> Option<f32> {
        None
    }

    /// Deliver a timer that belongs to a stage nested inside this one
    ///
    /// Only combinators owning sub-chains override this.
    fn route_timer(&mut self, _key: &TimerKey, _ctx: &mut FilterContext<'_>) -> TimerDispatch {
        TimerDispatch::Unknown
    }

    /// Cancel timers armed by stages nested inside this one
    ///
    /// Called when the owning chain drops this stage. The stage's own timers
    /// are cancelled by the chain.
    fn cancel_timers(&self, _ctx: &mut FilterContext<'_>) {}
}

/// Outcome of routing a timer through a chain
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimerDispatch {
    /// No stage in this chain owns the timer
    Unknown,
    /// A stage handled the timer; the chain produced this output
    Handled(Option<f32>),
}

/// Per-call capabilities a stage may use
///
/// Built by the owning sensor for every input and every timer firing. It
/// carries the current time, the sensor's timer queue scoped to the stage
/// being called, and the sensor-level settings a stage may read.
pub struct FilterContext<'a> {
    now: Timestamp,
    timers: &'a mut TimerQueue,
    stage: StageId,
    accuracy_decimals: i8,
}

impl<'a> FilterContext<'a> {
    /// Create a context at time `now`
    pub fn new(now: Timestamp, timers: &'a mut TimerQueue, accuracy_decimals: i8) -> Self {
        Self {
            now,
            timers,
            stage: StageId::UNBOUND,
            accuracy_decimals,
        }
    }

    /// Current time in milliseconds
    pub fn now(&self) -> Timestamp {
        self.now
    }

    /// Accuracy decimals of the owning sensor
    pub fn accuracy_decimals(&self) -> i8 {
        self.accuracy_decimals
    }

    /// Stage currently being called
    pub fn stage(&self) -> StageId {
        self.stage
    }

    /// Arm (or re-arm) a one-shot timer for the current stage
    pub fn set_timeout(&mut self, name: &'static str, delay_ms: u32) {
        let key = TimerKey::new(self.stage, name);
        self.timers.set_timeout(key, delay_ms, self.now);
    }

    /// Arm (or re-arm) a periodic timer for the current stage
    pub fn set_interval(&mut self, name: &'static str, period_ms: u32) {
        let key = TimerKey::new(self.stage, name);
        self.timers.set_interval(key, period_ms, self.now);
    }

    /// Cancel a timer of the current stage
    pub fn cancel_timeout(&mut self, name: &'static str) -> bool {
        let key = TimerKey::new(self.stage, name);
        self.timers.cancel(&key)
    }

    /// Check whether the current stage has a timer pending under `name`
    pub fn is_pending(&self, name: &'static str) -> bool {
        self.timers.is_pending(&TimerKey::new(self.stage, name))
    }

    pub(crate) fn enter(&mut self, stage: StageId) {
        self.stage = stage;
    }

    pub(crate) fn timers_mut(&mut self) -> &mut TimerQueue {
        self.timers
    }
}
