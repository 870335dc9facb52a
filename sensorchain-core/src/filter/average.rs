//! Exponential moving average

use crate::buffer::SendGate;

use super::{Filter, FilterContext};

/// Exponentially weighted average of the valid readings
///
/// The first valid reading seeds the average. `NaN` readings leave it alone
/// but still count towards the emission cadence; when such a reading lands on
/// an emission tick, `NaN` is emitted.
#[derive(Debug, Clone)]
pub struct ExponentialMovingAverageFilter {
    alpha: f32,
    accumulator: Option<f32>,
    gate: SendGate,
}

impl ExponentialMovingAverageFilter {
    /// Create an EMA stage
    ///
    /// Panics if `alpha` is outside (0, 1], `send_every` is zero, or
    /// `send_first_at > send_every`.
    pub fn new(alpha: f32, send_every: usize, send_first_at: usize) -> Self {
        assert!(alpha > 0.0 && alpha <= 1.0, "alpha must be within (0, 1]");
        Self {
            alpha,
            accumulator: None,
            gate: SendGate::new(send_every, send_first_at),
        }
    }

    /// Smoothing factor
    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    /// Current average, `None` until a valid reading was seen
    pub fn current(&self) -> Option<f32> {
        self.accumulator
    }
}

impl Filter for ExponentialMovingAverageFilter {
    fn new_value(&mut self, value: f32, _ctx: &mut FilterContext<'_>) -> Option<f32> {
        if !value.is_nan() {
            let next = match self.accumulator {
                None => value,
                Some(acc) => self.alpha * value + (1.0 - self.alpha) * acc,
            };
            self.accumulator = Some(next);
        }

        if !self.gate.tick() {
            return None;
        }
        if value.is_nan() {
            Some(f32::NAN)
        } else {
            self.accumulator
        }
    }

    fn name(&self) -> &'static str {
        "ExponentialMovingAverageFilter"
    }
}
