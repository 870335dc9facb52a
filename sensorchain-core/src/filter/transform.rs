//! Stateless and near-stateless transforms
//!
//! Everything here maps one reading to at most one reading without looking at
//! time. `NaN` passes through every arithmetic transform unchanged.

use alloc::boxed::Box;
use core::fmt;
use heapless::Vec;

use crate::{
    constants::{MAX_FILTER_OUT_VALUES, MAX_ROUND_DECIMALS},
    errors::{FilterError, FilterResult},
};

use super::{Filter, FilterContext};

fn pow10(decimals: i32) -> f32 {
    libm::powf(10.0, decimals as f32)
}

/// User closure as a stage
///
/// ```rust
/// use sensorchain_core::filter::LambdaFilter;
///
/// // Drop readings the sensor reports while it is still warming up
/// let plausible = LambdaFilter::new(|v| (v > -40.0).then_some(v));
/// # let _ = plausible;
/// ```
pub struct LambdaFilter {
    f: Box<dyn FnMut(f32) -> Option<f32> + Send>,
}

impl LambdaFilter {
    /// Wrap a closure; `None` drops the reading
    pub fn new<F>(f: F) -> Self
    where
        F: FnMut(f32) -> Option<f32> + Send + 'static,
    {
        Self { f: Box::new(f) }
    }
}

impl fmt::Debug for LambdaFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LambdaFilter").finish_non_exhaustive()
    }
}

impl Filter for LambdaFilter {
    fn new_value(&mut self, value: f32, _ctx: &mut FilterContext<'_>) -> Option<f32> {
        let output = (self.f)(value);
        log_trace!("LambdaFilter({}) -> {:?}", value, output);
        output
    }

    fn name(&self) -> &'static str {
        "LambdaFilter"
    }
}

/// Add a constant
#[derive(Debug, Clone, Copy)]
pub struct OffsetFilter {
    offset: f32,
}

impl OffsetFilter {
    /// Create an offset stage
    pub fn new(offset: f32) -> Self {
        Self { offset }
    }

    /// Added constant
    pub fn offset(&self) -> f32 {
        self.offset
    }
}

impl Filter for OffsetFilter {
    fn new_value(&mut self, value: f32, _ctx: &mut FilterContext<'_>) -> Option<f32> {
        Some(value + self.offset)
    }

    fn name(&self) -> &'static str {
        "OffsetFilter"
    }
}

/// Multiply by a constant
#[derive(Debug, Clone, Copy)]
pub struct MultiplyFilter {
    multiplier: f32,
}

impl MultiplyFilter {
    /// Create a multiply stage
    pub fn new(multiplier: f32) -> Self {
        Self { multiplier }
    }

    /// Factor
    pub fn multiplier(&self) -> f32 {
        self.multiplier
    }
}

impl Filter for MultiplyFilter {
    fn new_value(&mut self, value: f32, _ctx: &mut FilterContext<'_>) -> Option<f32> {
        Some(value * self.multiplier)
    }

    fn name(&self) -> &'static str {
        "MultiplyFilter"
    }
}

/// Drop readings equal to one of a set of values
///
/// A `NaN` target drops `NaN` readings. Other targets match when reading and
/// target are equal after rounding to the stage's accuracy decimals, or the
/// sensor's if none were set.
#[derive(Debug, Clone)]
pub struct FilterOutValueFilter {
    values: Vec<f32, MAX_FILTER_OUT_VALUES>,
    accuracy_decimals: Option<i8>,
}

impl FilterOutValueFilter {
    /// Drop a single value
    pub fn new(value: f32) -> Self {
        let mut values = Vec::new();
        // Capacity is at least one
        let _ = values.push(value);
        Self { values, accuracy_decimals: None }
    }

    /// Drop every value in `values`
    pub fn from_values<I: IntoIterator<Item = f32>>(values: I) -> FilterResult<Self> {
        let mut collected = Vec::new();
        for value in values {
            collected.push(value).map_err(|_| FilterError::TooMany {
                what: "filter_out values",
                limit: MAX_FILTER_OUT_VALUES,
            })?;
        }
        Ok(Self { values: collected, accuracy_decimals: None })
    }

    /// Compare with this many decimals instead of the sensor's
    pub fn with_accuracy_decimals(mut self, decimals: i8) -> Self {
        self.accuracy_decimals = Some(decimals);
        self
    }

    /// Values being dropped
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    fn matches(&self, value: f32, decimals: i8) -> bool {
        let scale = pow10(decimals as i32);
        self.values.iter().any(|&target| {
            if target.is_nan() {
                value.is_nan()
            } else {
                libm::roundf(scale * target) == libm::roundf(scale * value)
            }
        })
    }
}

impl Filter for FilterOutValueFilter {
    fn new_value(&mut self, value: f32, ctx: &mut FilterContext<'_>) -> Option<f32> {
        let decimals = self.accuracy_decimals.unwrap_or_else(|| ctx.accuracy_decimals());
        if self.matches(value, decimals) {
            None
        } else {
            Some(value)
        }
    }

    fn name(&self) -> &'static str {
        "FilterOutValueFilter"
    }
}

/// Limit readings to a range
///
/// Infinite bounds are ignored, and so are non-finite readings. Out-of-range
/// readings are clipped to the bound, or dropped with
/// [`ClampFilter::ignore_out_of_range`].
#[derive(Debug, Clone, Copy)]
pub struct ClampFilter {
    min: f32,
    max: f32,
    ignore_out_of_range: bool,
}

impl ClampFilter {
    /// Clamp to `[min, max]`; pass an infinity for an open side
    ///
    /// Panics if a bound is `NaN` or `min > max`.
    pub fn new(min: f32, max: f32) -> Self {
        assert!(!min.is_nan() && !max.is_nan(), "clamp bounds must not be NaN");
        assert!(min <= max, "clamp min must not exceed max");
        Self { min, max, ignore_out_of_range: false }
    }

    /// Drop out-of-range readings instead of clipping them
    pub fn ignore_out_of_range(mut self, ignore: bool) -> Self {
        self.ignore_out_of_range = ignore;
        self
    }
}

impl Filter for ClampFilter {
    fn new_value(&mut self, value: f32, _ctx: &mut FilterContext<'_>) -> Option<f32> {
        if !value.is_finite() {
            return Some(value);
        }
        let bound = if self.min.is_finite() && value < self.min {
            self.min
        } else if self.max.is_finite() && value > self.max {
            self.max
        } else {
            return Some(value);
        };
        if self.ignore_out_of_range {
            None
        } else {
            Some(bound)
        }
    }

    fn name(&self) -> &'static str {
        "ClampFilter"
    }
}

/// Round to a number of decimals
///
/// Non-finite readings pass unchanged, and so do readings too large to be
/// scaled by `10^precision` without overflowing.
#[derive(Debug, Clone, Copy)]
pub struct RoundFilter {
    precision: u8,
}

impl RoundFilter {
    /// Create a round stage
    ///
    /// Panics if `precision` exceeds [`MAX_ROUND_DECIMALS`].
    pub fn new(precision: u8) -> Self {
        assert!(precision <= MAX_ROUND_DECIMALS, "round precision overflows f32");
        Self { precision }
    }
}

impl Filter for RoundFilter {
    fn new_value(&mut self, value: f32, _ctx: &mut FilterContext<'_>) -> Option<f32> {
        if !value.is_finite() {
            return Some(value);
        }
        let scale = pow10(self.precision as i32);
        let scaled = value * scale;
        if !scaled.is_finite() {
            return Some(value);
        }
        Some(libm::roundf(scaled) / scale)
    }

    fn name(&self) -> &'static str {
        "RoundFilter"
    }
}

/// Round to the nearest multiple of a step
///
/// Non-finite readings pass unchanged.
#[derive(Debug, Clone, Copy)]
pub struct RoundMultipleFilter {
    multiple: f32,
}

impl RoundMultipleFilter {
    /// Create a round-to-multiple stage
    ///
    /// Panics unless `multiple` is finite and positive.
    pub fn new(multiple: f32) -> Self {
        assert!(multiple.is_finite() && multiple > 0.0, "multiple must be a positive number");
        Self { multiple }
    }
}

impl Filter for RoundMultipleFilter {
    fn new_value(&mut self, value: f32, _ctx: &mut FilterContext<'_>) -> Option<f32> {
        if !value.is_finite() {
            return Some(value);
        }
        Some(value - libm::remainderf(value, self.multiple))
    }

    fn name(&self) -> &'static str {
        "RoundMultipleFilter"
    }
}

/// Drop the first N readings
#[derive(Debug, Clone, Copy)]
pub struct SkipInitialFilter {
    remaining: usize,
}

impl SkipInitialFilter {
    /// Create a skip stage
    pub fn new(count: usize) -> Self {
        Self { remaining: count }
    }

    /// Readings still to be dropped
    pub fn remaining(&self) -> usize {
        self.remaining
    }
}

impl Filter for SkipInitialFilter {
    fn new_value(&mut self, value: f32, _ctx: &mut FilterContext<'_>) -> Option<f32> {
        if self.remaining > 0 {
            self.remaining -= 1;
            log_trace!("SkipInitialFilter: skipping, {} left", self.remaining);
            None
        } else {
            Some(value)
        }
    }

    fn name(&self) -> &'static str {
        "SkipInitialFilter"
    }
}
