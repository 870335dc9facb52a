//! Declarative filter configuration
//!
//! ## Overview
//!
//! Filter chains are usually described in device configuration rather than
//! code. [`FilterConfig`] mirrors the familiar keys, one externally tagged
//! variant per stage:
//!
//! ```json
//! {
//!   "name": "Outside Temperature",
//!   "unit_of_measurement": "°C",
//!   "accuracy_decimals": 1,
//!   "filters": [
//!     { "offset": -0.4 },
//!     { "median": { "window_size": 7, "send_every": 3 } },
//!     { "or": [ { "delta": { "value": 0.5 } }, { "heartbeat": 60000 } ] }
//!   ]
//! }
//! ```
//!
//! Omitted window parameters take the defaults in [`crate::constants`].
//! Durations are milliseconds. JSON has no `NaN`, so `null` stands for it
//! where a value may be `NaN` (`filter_out` values, `timeout` fallback).
//!
//! ## Validation
//!
//! [`FilterConfig::build`] checks every parameter and returns a
//! [`FilterError`] for anything the stage constructors would reject, so data
//! loaded at runtime cannot panic the firmware.

use alloc::{boxed::Box, string::String, vec::Vec};
use serde::{Deserialize, Serialize};

use crate::{
    constants::*,
    errors::{FilterError, FilterResult},
    filter::*,
    sensor::Sensor,
    time::TimeSource,
};

/// Parameters shared by median, min, max and the moving average
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WindowConfig {
    /// Readings kept in the window
    pub window_size: Option<usize>,
    /// Emit every N readings
    pub send_every: Option<usize>,
    /// First emission on reading N
    pub send_first_at: Option<usize>,
}

/// Quantile parameters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QuantileConfig {
    /// Readings kept in the window
    pub window_size: Option<usize>,
    /// Emit every N readings
    pub send_every: Option<usize>,
    /// First emission on reading N
    pub send_first_at: Option<usize>,
    /// Quantile in (0, 1]
    pub quantile: Option<f32>,
}

/// Exponential moving average parameters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EmaConfig {
    /// Smoothing factor in (0, 1]
    pub alpha: Option<f32>,
    /// Emit every N readings
    pub send_every: Option<usize>,
    /// First emission on reading N
    pub send_first_at: Option<usize>,
}

/// Values dropped by `filter_out`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FilterOutConfig {
    /// Values to drop; `null` drops `NaN`
    pub values: Vec<Option<f32>>,
    /// Comparison precision, the sensor's when omitted
    #[serde(default)]
    pub accuracy_decimals: Option<i8>,
}

/// Timeout parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimeoutConfig {
    /// Silence before the fallback is emitted
    pub timeout_ms: u32,
    /// Fallback value, `NaN` when omitted
    #[serde(default)]
    pub value: Option<f32>,
}

/// Delta parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeltaConfig {
    /// Threshold, a fraction of the last value when `percentage` is set
    pub value: f32,
    /// Relative threshold
    #[serde(default)]
    pub percentage: bool,
}

/// Reference point for calibration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Datapoint {
    /// Value the sensor measured
    pub from: f32,
    /// Value it should have reported
    pub to: f32,
}

/// How a linear calibration is fitted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationMethod {
    /// One best-fit line
    #[default]
    LeastSquares,
    /// Piecewise line through every datapoint
    Exact,
}

/// Linear calibration parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CalibrateLinearConfig {
    /// Reference datapoints
    pub datapoints: Vec<Datapoint>,
    /// Fitting method
    #[serde(default)]
    pub method: CalibrationMethod,
}

/// Polynomial calibration parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CalibratePolynomialConfig {
    /// Polynomial degree
    pub degree: usize,
    /// Reference datapoints
    pub datapoints: Vec<Datapoint>,
}

/// Clamp parameters; a missing bound leaves that side open
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClampConfig {
    /// Lower bound
    pub min_value: Option<f32>,
    /// Upper bound
    pub max_value: Option<f32>,
    /// Drop instead of clip
    pub ignore_out_of_range: bool,
}

/// One stage of a configured chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterConfig {
    /// [`MedianFilter`]
    Median(WindowConfig),
    /// [`QuantileFilter`]
    Quantile(QuantileConfig),
    /// [`MinFilter`]
    Min(WindowConfig),
    /// [`MaxFilter`]
    Max(WindowConfig),
    /// [`SlidingWindowMovingAverageFilter`]
    SlidingWindowMovingAverage(WindowConfig),
    /// [`ExponentialMovingAverageFilter`]
    ExponentialMovingAverage(EmaConfig),
    /// [`ThrottleAverageFilter`], period in ms
    ThrottleAverage(u32),
    /// [`OffsetFilter`]
    Offset(f32),
    /// [`MultiplyFilter`]
    Multiply(f32),
    /// [`FilterOutValueFilter`]
    FilterOut(FilterOutConfig),
    /// [`ThrottleFilter`], minimum interval in ms
    Throttle(u32),
    /// [`TimeoutFilter`]
    Timeout(TimeoutConfig),
    /// [`DebounceFilter`], quiet period in ms
    Debounce(u32),
    /// [`HeartbeatFilter`], period in ms
    Heartbeat(u32),
    /// [`DeltaFilter`]
    Delta(DeltaConfig),
    /// [`OrFilter`], one single-stage branch per entry
    Or(Vec<FilterConfig>),
    /// [`CalibrateLinearFilter`]
    CalibrateLinear(CalibrateLinearConfig),
    /// [`CalibratePolynomialFilter`]
    CalibratePolynomial(CalibratePolynomialConfig),
    /// [`ClampFilter`]
    Clamp(ClampConfig),
    /// [`RoundFilter`], decimals
    Round(u8),
    /// [`RoundMultipleFilter`]
    RoundToMultipleOf(f32),
    /// [`SkipInitialFilter`]
    SkipInitial(usize),
}

fn window_params(
    window_size: Option<usize>,
    send_every: Option<usize>,
    send_first_at: Option<usize>,
    default_size: usize,
    default_every: usize,
) -> FilterResult<(usize, usize, usize)> {
    let window_size = window_size.unwrap_or(default_size);
    let send_every = send_every.unwrap_or(default_every);
    let send_first_at = send_first_at.unwrap_or(DEFAULT_SEND_FIRST_AT);

    if window_size == 0 {
        return Err(FilterError::InvalidWindowSize);
    }
    if send_every == 0 {
        return Err(FilterError::InvalidSendEvery);
    }
    if send_first_at > send_every {
        return Err(FilterError::InvalidSendFirstAt { send_first_at, send_every });
    }
    Ok((window_size, send_every, send_first_at))
}

fn nonzero_period(period_ms: u32, filter: &'static str) -> FilterResult<u32> {
    if period_ms == 0 {
        Err(FilterError::ZeroPeriod { filter })
    } else {
        Ok(period_ms)
    }
}

fn finite(value: f32, name: &'static str) -> FilterResult<f32> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(FilterError::InvalidParameter { name })
    }
}

fn points(datapoints: &[Datapoint]) -> Vec<(f32, f32)> {
    datapoints.iter().map(|p| (p.from, p.to)).collect()
}

impl FilterConfig {
    /// Configuration key of this stage
    pub fn key(&self) -> &'static str {
        match self {
            Self::Median(_) => "median",
            Self::Quantile(_) => "quantile",
            Self::Min(_) => "min",
            Self::Max(_) => "max",
            Self::SlidingWindowMovingAverage(_) => "sliding_window_moving_average",
            Self::ExponentialMovingAverage(_) => "exponential_moving_average",
            Self::ThrottleAverage(_) => "throttle_average",
            Self::Offset(_) => "offset",
            Self::Multiply(_) => "multiply",
            Self::FilterOut(_) => "filter_out",
            Self::Throttle(_) => "throttle",
            Self::Timeout(_) => "timeout",
            Self::Debounce(_) => "debounce",
            Self::Heartbeat(_) => "heartbeat",
            Self::Delta(_) => "delta",
            Self::Or(_) => "or",
            Self::CalibrateLinear(_) => "calibrate_linear",
            Self::CalibratePolynomial(_) => "calibrate_polynomial",
            Self::Clamp(_) => "clamp",
            Self::Round(_) => "round",
            Self::RoundToMultipleOf(_) => "round_to_multiple_of",
            Self::SkipInitial(_) => "skip_initial",
        }
    }

    /// Validate and construct the stage
    pub fn build(&self) -> FilterResult<Box<dyn Filter>> {
        self.build_unchecked().map_err(|e| {
            log_warn!("rejected '{}' filter config: {}", self.key(), e);
            e
        })
    }

    fn build_unchecked(&self) -> FilterResult<Box<dyn Filter>> {
        let filter: Box<dyn Filter> = match self {
            Self::Median(c) => {
                let (size, every, first) = window_params(
                    c.window_size, c.send_every, c.send_first_at,
                    DEFAULT_WINDOW_SIZE, DEFAULT_SEND_EVERY,
                )?;
                Box::new(MedianFilter::new(size, every, first))
            }
            Self::Quantile(c) => {
                let (size, every, first) = window_params(
                    c.window_size, c.send_every, c.send_first_at,
                    DEFAULT_WINDOW_SIZE, DEFAULT_SEND_EVERY,
                )?;
                let quantile = c.quantile.unwrap_or(DEFAULT_QUANTILE);
                if !(quantile > 0.0 && quantile <= 1.0) {
                    return Err(FilterError::InvalidQuantile { quantile });
                }
                Box::new(QuantileFilter::new(size, every, first, quantile))
            }
            Self::Min(c) => {
                let (size, every, first) = window_params(
                    c.window_size, c.send_every, c.send_first_at,
                    DEFAULT_WINDOW_SIZE, DEFAULT_SEND_EVERY,
                )?;
                Box::new(MinFilter::new(size, every, first))
            }
            Self::Max(c) => {
                let (size, every, first) = window_params(
                    c.window_size, c.send_every, c.send_first_at,
                    DEFAULT_WINDOW_SIZE, DEFAULT_SEND_EVERY,
                )?;
                Box::new(MaxFilter::new(size, every, first))
            }
            Self::SlidingWindowMovingAverage(c) => {
                let (size, every, first) = window_params(
                    c.window_size, c.send_every, c.send_first_at,
                    DEFAULT_MOVING_AVERAGE_WINDOW_SIZE, DEFAULT_MOVING_AVERAGE_SEND_EVERY,
                )?;
                Box::new(SlidingWindowMovingAverageFilter::new(size, every, first))
            }
            Self::ExponentialMovingAverage(c) => {
                let alpha = c.alpha.unwrap_or(DEFAULT_EMA_ALPHA);
                if !(alpha > 0.0 && alpha <= 1.0) {
                    return Err(FilterError::InvalidAlpha { alpha });
                }
                let send_every = c.send_every.unwrap_or(DEFAULT_EMA_SEND_EVERY);
                let send_first_at = c.send_first_at.unwrap_or(DEFAULT_SEND_FIRST_AT);
                if send_every == 0 {
                    return Err(FilterError::InvalidSendEvery);
                }
                if send_first_at > send_every {
                    return Err(FilterError::InvalidSendFirstAt { send_first_at, send_every });
                }
                Box::new(ExponentialMovingAverageFilter::new(alpha, send_every, send_first_at))
            }
            Self::ThrottleAverage(period) => {
                Box::new(ThrottleAverageFilter::new(nonzero_period(*period, "throttle_average")?))
            }
            Self::Offset(offset) => Box::new(OffsetFilter::new(finite(*offset, "offset")?)),
            Self::Multiply(factor) => Box::new(MultiplyFilter::new(finite(*factor, "multiply")?)),
            Self::FilterOut(c) => {
                let values = c.values.iter().map(|v| v.unwrap_or(f32::NAN));
                let filter = FilterOutValueFilter::from_values(values)?;
                match c.accuracy_decimals {
                    Some(decimals) => Box::new(filter.with_accuracy_decimals(decimals)),
                    None => Box::new(filter),
                }
            }
            Self::Throttle(interval) => Box::new(ThrottleFilter::new(*interval)),
            Self::Timeout(c) => {
                let timeout = nonzero_period(c.timeout_ms, "timeout")?;
                Box::new(TimeoutFilter::with_fallback(timeout, c.value.unwrap_or(f32::NAN)))
            }
            Self::Debounce(period) => Box::new(DebounceFilter::new(nonzero_period(*period, "debounce")?)),
            Self::Heartbeat(period) => Box::new(HeartbeatFilter::new(nonzero_period(*period, "heartbeat")?)),
            Self::Delta(c) => {
                let value = finite(c.value, "delta")?;
                if value < 0.0 {
                    return Err(FilterError::InvalidParameter { name: "delta" });
                }
                if c.percentage {
                    Box::new(DeltaFilter::percentage(value))
                } else {
                    Box::new(DeltaFilter::new(value))
                }
            }
            Self::Or(branches) => {
                if branches.is_empty() {
                    return Err(FilterError::InvalidParameter { name: "or" });
                }
                let mut or = OrFilter::new();
                for branch in branches {
                    let mut chain = FilterChain::new();
                    chain.add_boxed(branch.build()?)?;
                    or.add_branch(chain)?;
                }
                Box::new(or)
            }
            Self::CalibrateLinear(c) => {
                let points = points(&c.datapoints);
                Box::new(match c.method {
                    CalibrationMethod::LeastSquares => CalibrateLinearFilter::least_squares(&points)?,
                    CalibrationMethod::Exact => CalibrateLinearFilter::exact(&points)?,
                })
            }
            Self::CalibratePolynomial(c) => {
                Box::new(CalibratePolynomialFilter::fit(&points(&c.datapoints), c.degree)?)
            }
            Self::Clamp(c) => {
                let min = c.min_value.unwrap_or(f32::NEG_INFINITY);
                let max = c.max_value.unwrap_or(f32::INFINITY);
                if min.is_nan() || max.is_nan() || min > max {
                    return Err(FilterError::InvalidRange { min, max });
                }
                Box::new(ClampFilter::new(min, max).ignore_out_of_range(c.ignore_out_of_range))
            }
            Self::Round(decimals) => {
                if *decimals > MAX_ROUND_DECIMALS {
                    return Err(FilterError::InvalidParameter { name: "round" });
                }
                Box::new(RoundFilter::new(*decimals))
            }
            Self::RoundToMultipleOf(multiple) => {
                if !(multiple.is_finite() && *multiple > 0.0) {
                    return Err(FilterError::InvalidParameter { name: "round_to_multiple_of" });
                }
                Box::new(RoundMultipleFilter::new(*multiple))
            }
            Self::SkipInitial(count) => Box::new(SkipInitialFilter::new(*count)),
        };
        Ok(filter)
    }
}

fn default_accuracy_decimals() -> i8 {
    0
}

/// A sensor with its filter chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SensorConfig {
    /// Sensor name
    pub name: String,
    /// Unit of the published state
    #[serde(default)]
    pub unit_of_measurement: Option<String>,
    /// Decimals the state is meaningful to
    #[serde(default = "default_accuracy_decimals")]
    pub accuracy_decimals: i8,
    /// Stages in order
    #[serde(default)]
    pub filters: Vec<FilterConfig>,
}

impl SensorConfig {
    /// Validate and assemble the filter chain
    pub fn build_chain(&self) -> FilterResult<FilterChain> {
        let mut builder = FilterChain::builder();
        for filter in &self.filters {
            builder = builder.add_boxed(filter.build()?);
        }
        builder.build()
    }
}

impl<T: TimeSource> Sensor<T> {
    /// Build a ready sensor from configuration
    pub fn from_config(config: &SensorConfig, clock: T) -> FilterResult<Self> {
        let chain = config.build_chain()?;
        let mut sensor = Sensor::new(config.name.as_str(), clock);
        sensor.set_accuracy_decimals(config.accuracy_decimals);
        if let Some(unit) = &config.unit_of_measurement {
            sensor.set_unit_of_measurement(unit.as_str());
        }
        sensor.set_filter_chain(chain);
        Ok(sensor)
    }
}
