//! Sliding window aggregates
//!
//! All five stages keep the newest `window_size` readings in a
//! [`SampleWindow`] and emit an aggregate on the inputs selected by a
//! [`SendGate`]. Between emissions they return `None`.

use crate::buffer::{SampleWindow, SendGate};

use super::{Filter, FilterContext};

/// Window plus emission gate shared by every aggregate stage
#[derive(Debug, Clone)]
struct Windowed {
    window: SampleWindow,
    gate: SendGate,
}

impl Windowed {
    fn new(window_size: usize, send_every: usize, send_first_at: usize) -> Self {
        Self {
            window: SampleWindow::new(window_size),
            gate: SendGate::new(send_every, send_first_at),
        }
    }

    /// Store the reading and report whether this input emits
    fn push(&mut self, value: f32) -> bool {
        self.window.push(value);
        self.gate.tick()
    }
}

macro_rules! window_accessors {
    ($ty:ident) => {
        impl $ty {
            /// Readings currently held, NaN included
            pub fn window_len(&self) -> usize {
                self.inner.window.len()
            }

            /// Configured window size
            pub fn window_size(&self) -> usize {
                self.inner.window.capacity()
            }

            /// Configured emission period
            pub fn send_every(&self) -> usize {
                self.inner.gate.send_every()
            }
        }
    };
}

/// Median of the window
///
/// With an even number of valid readings the two middle ones are averaged.
#[derive(Debug, Clone)]
pub struct MedianFilter {
    inner: Windowed,
}

impl MedianFilter {
    /// Create a median stage
    ///
    /// Panics if `window_size` or `send_every` is zero, or if
    /// `send_first_at > send_every`.
    pub fn new(window_size: usize, send_every: usize, send_first_at: usize) -> Self {
        Self { inner: Windowed::new(window_size, send_every, send_first_at) }
    }

    fn median(&self) -> f32 {
        let sorted = self.inner.window.sorted_valid();
        let n = sorted.len();
        if n == 0 {
            f32::NAN
        } else if n % 2 == 1 {
            sorted[n / 2]
        } else {
            (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
        }
    }
}

window_accessors!(MedianFilter);

impl Filter for MedianFilter {
    fn new_value(&mut self, value: f32, _ctx: &mut FilterContext<'_>) -> Option<f32> {
        if self.inner.push(value) {
            let median = self.median();
            log_trace!("MedianFilter -> {}", median);
            Some(median)
        } else {
            None
        }
    }

    fn name(&self) -> &'static str {
        "MedianFilter"
    }
}

/// Quantile of the window
///
/// The reported element is the one at sorted position
/// `ceil(count * quantile) - 1` among the valid readings.
#[derive(Debug, Clone)]
pub struct QuantileFilter {
    inner: Windowed,
    quantile: f32,
}

impl QuantileFilter {
    /// Create a quantile stage
    ///
    /// Panics if `quantile` is outside (0, 1] or on the same misuse as
    /// [`MedianFilter::new`].
    pub fn new(window_size: usize, send_every: usize, send_first_at: usize, quantile: f32) -> Self {
        assert!(
            quantile > 0.0 && quantile <= 1.0,
            "quantile must be within (0, 1]"
        );
        Self {
            inner: Windowed::new(window_size, send_every, send_first_at),
            quantile,
        }
    }

    /// Configured quantile
    pub fn quantile(&self) -> f32 {
        self.quantile
    }

    fn compute(&self) -> f32 {
        let sorted = self.inner.window.sorted_valid();
        if sorted.is_empty() {
            return f32::NAN;
        }
        let rank = libm::ceilf(sorted.len() as f32 * self.quantile) as usize;
        let position = rank.saturating_sub(1).min(sorted.len() - 1);
        sorted[position]
    }
}

window_accessors!(QuantileFilter);

impl Filter for QuantileFilter {
    fn new_value(&mut self, value: f32, _ctx: &mut FilterContext<'_>) -> Option<f32> {
        if self.inner.push(value) {
            let result = self.compute();
            log_trace!("QuantileFilter -> {}", result);
            Some(result)
        } else {
            None
        }
    }

    fn name(&self) -> &'static str {
        "QuantileFilter"
    }
}

/// Smallest valid reading of the window
#[derive(Debug, Clone)]
pub struct MinFilter {
    inner: Windowed,
}

impl MinFilter {
    /// Create a min stage
    pub fn new(window_size: usize, send_every: usize, send_first_at: usize) -> Self {
        Self { inner: Windowed::new(window_size, send_every, send_first_at) }
    }
}

window_accessors!(MinFilter);

impl Filter for MinFilter {
    fn new_value(&mut self, value: f32, _ctx: &mut FilterContext<'_>) -> Option<f32> {
        self.inner.push(value).then(|| self.inner.window.min())
    }

    fn name(&self) -> &'static str {
        "MinFilter"
    }
}

/// Largest valid reading of the window
#[derive(Debug, Clone)]
pub struct MaxFilter {
    inner: Windowed,
}

impl MaxFilter {
    /// Create a max stage
    pub fn new(window_size: usize, send_every: usize, send_first_at: usize) -> Self {
        Self { inner: Windowed::new(window_size, send_every, send_first_at) }
    }
}

window_accessors!(MaxFilter);

impl Filter for MaxFilter {
    fn new_value(&mut self, value: f32, _ctx: &mut FilterContext<'_>) -> Option<f32> {
        self.inner.push(value).then(|| self.inner.window.max())
    }

    fn name(&self) -> &'static str {
        "MaxFilter"
    }
}

/// Arithmetic mean of the valid readings in the window
#[derive(Debug, Clone)]
pub struct SlidingWindowMovingAverageFilter {
    inner: Windowed,
}

impl SlidingWindowMovingAverageFilter {
    /// Create a moving average stage
    pub fn new(window_size: usize, send_every: usize, send_first_at: usize) -> Self {
        Self { inner: Windowed::new(window_size, send_every, send_first_at) }
    }
}

window_accessors!(SlidingWindowMovingAverageFilter);

impl Filter for SlidingWindowMovingAverageFilter {
    fn new_value(&mut self, value: f32, _ctx: &mut FilterContext<'_>) -> Option<f32> {
        if self.inner.push(value) {
            let average = self.inner.window.mean();
            log_trace!("SlidingWindowMovingAverageFilter -> {}", average);
            Some(average)
        } else {
            None
        }
    }

    fn name(&self) -> &'static str {
        "SlidingWindowMovingAverageFilter"
    }
}
