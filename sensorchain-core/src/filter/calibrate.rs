//! Calibration stages
//!
//! ## Overview
//!
//! Both stages map a raw reading through a function fitted to reference
//! datapoints `(measured, actual)`:
//!
//! - [`CalibrateLinearFilter`] - piecewise linear. Segments are ordered by
//!   ascending upper bound; the first segment whose bound lies above the
//!   reading applies. A segment with a non-finite bound catches everything.
//! - [`CalibratePolynomialFilter`] - polynomial with ascending coefficients,
//!   `c0 + c1*x + c2*x^2 + ...`.
//!
//! ## Fitting
//!
//! Fits run once at construction, in `f64`, and never allocate per reading.
//! The linear least-squares fit is the single-segment case; the exact method
//! draws one segment through each pair of neighbouring datapoints, extending
//! the outer segments beyond the first and last point.
//!
//! ```text
//! actual
//!   │            exact            ╱
//!   │                       ╱───╱   ← last segment, unbounded
//!   │                 ╱────╱
//!   │          ╱─────╱
//!   │  ╱──────╱
//!   └───────────────────────────── measured
//! ```

use alloc::vec::Vec as AllocVec;
use heapless::Vec;

use crate::{
    constants::{MAX_CALIBRATION_SEGMENTS, MAX_POLYNOMIAL_TERMS},
    errors::{FilterError, FilterResult},
};

use super::{Filter, FilterContext};

const SINGULAR_PIVOT: f64 = 1e-12;

/// One linear piece: `slope * x + bias` for readings below `upper_bound`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearSegment {
    /// Gain
    pub slope: f32,
    /// Offset
    pub bias: f32,
    /// Exclusive upper bound of readings this segment covers
    pub upper_bound: f32,
}

impl LinearSegment {
    /// Segment covering every reading
    pub fn unbounded(slope: f32, bias: f32) -> Self {
        Self { slope, bias, upper_bound: f32::INFINITY }
    }

    fn covers(&self, value: f32) -> bool {
        !self.upper_bound.is_finite() || value < self.upper_bound
    }

    fn apply(&self, value: f32) -> f32 {
        value * self.slope + self.bias
    }
}

/// Piecewise linear calibration
///
/// Readings beyond the last bounded segment map to `NaN`.
#[derive(Debug, Clone)]
pub struct CalibrateLinearFilter {
    segments: Vec<LinearSegment, MAX_CALIBRATION_SEGMENTS>,
}

impl CalibrateLinearFilter {
    /// Build from explicit segments, in ascending order of upper bound
    pub fn new<I: IntoIterator<Item = LinearSegment>>(segments: I) -> FilterResult<Self> {
        let mut collected = Vec::new();
        for segment in segments {
            collected.push(segment).map_err(|_| FilterError::TooMany {
                what: "calibration segments",
                limit: MAX_CALIBRATION_SEGMENTS,
            })?;
        }
        if collected.is_empty() {
            return Err(FilterError::InvalidParameter { name: "segments" });
        }
        Ok(Self { segments: collected })
    }

    /// Single line `slope * x + bias`
    pub fn line(slope: f32, bias: f32) -> Self {
        let mut segments = Vec::new();
        let _ = segments.push(LinearSegment::unbounded(slope, bias));
        Self { segments }
    }

    /// Best-fit line through `(measured, actual)` datapoints
    pub fn least_squares(points: &[(f32, f32)]) -> FilterResult<Self> {
        if points.len() < 2 {
            return Err(FilterError::NotEnoughDatapoints { required: 2, available: points.len() });
        }

        let n = points.len() as f64;
        let mean_x = points.iter().map(|p| p.0 as f64).sum::<f64>() / n;
        let mean_y = points.iter().map(|p| p.1 as f64).sum::<f64>() / n;
        let (sxx, sxy) = points.iter().fold((0.0f64, 0.0f64), |(sxx, sxy), &(x, y)| {
            let dx = x as f64 - mean_x;
            (sxx + dx * dx, sxy + dx * (y as f64 - mean_y))
        });
        if sxx < SINGULAR_PIVOT {
            return Err(FilterError::DegenerateCalibration { reason: "all measured values are equal" });
        }

        let slope = sxy / sxx;
        let bias = mean_y - slope * mean_x;
        log_debug!("linear calibration fit: slope={} bias={}", slope, bias);
        Ok(Self::line(slope as f32, bias as f32))
    }

    /// Piecewise line through every datapoint
    pub fn exact(points: &[(f32, f32)]) -> FilterResult<Self> {
        if points.len() < 2 {
            return Err(FilterError::NotEnoughDatapoints { required: 2, available: points.len() });
        }
        if points.len() - 1 > MAX_CALIBRATION_SEGMENTS {
            return Err(FilterError::TooMany {
                what: "calibration segments",
                limit: MAX_CALIBRATION_SEGMENTS,
            });
        }

        let mut sorted: AllocVec<(f32, f32)> = points.to_vec();
        sorted.sort_unstable_by(|a, b| a.0.total_cmp(&b.0));

        let mut segments = Vec::new();
        let last = sorted.len() - 2;
        for (i, pair) in sorted.windows(2).enumerate() {
            let (x1, y1) = (pair[0].0 as f64, pair[0].1 as f64);
            let (x2, y2) = (pair[1].0 as f64, pair[1].1 as f64);
            if x2 - x1 < SINGULAR_PIVOT {
                return Err(FilterError::DegenerateCalibration { reason: "duplicate measured value" });
            }
            let slope = (y2 - y1) / (x2 - x1);
            let segment = LinearSegment {
                slope: slope as f32,
                bias: (y1 - slope * x1) as f32,
                upper_bound: if i == last { f32::INFINITY } else { pair[1].0 },
            };
            // Length was checked against capacity above
            let _ = segments.push(segment);
        }
        Ok(Self { segments })
    }

    /// Segments in evaluation order
    pub fn segments(&self) -> &[LinearSegment] {
        &self.segments
    }
}

impl Filter for CalibrateLinearFilter {
    fn new_value(&mut self, value: f32, _ctx: &mut FilterContext<'_>) -> Option<f32> {
        let output = self
            .segments
            .iter()
            .find(|segment| segment.covers(value))
            .map_or(f32::NAN, |segment| segment.apply(value));
        Some(output)
    }

    fn name(&self) -> &'static str {
        "CalibrateLinearFilter"
    }
}

/// Polynomial calibration
#[derive(Debug, Clone)]
pub struct CalibratePolynomialFilter {
    coefficients: Vec<f32, MAX_POLYNOMIAL_TERMS>,
}

impl CalibratePolynomialFilter {
    /// Build from coefficients in ascending power order
    pub fn new(coefficients: &[f32]) -> FilterResult<Self> {
        if coefficients.is_empty() {
            return Err(FilterError::InvalidParameter { name: "coefficients" });
        }
        let coefficients = Vec::from_slice(coefficients).map_err(|_| FilterError::TooMany {
            what: "polynomial coefficients",
            limit: MAX_POLYNOMIAL_TERMS,
        })?;
        Ok(Self { coefficients })
    }

    /// Least-squares polynomial of `degree` through `(measured, actual)` datapoints
    pub fn fit(points: &[(f32, f32)], degree: usize) -> FilterResult<Self> {
        let terms = degree + 1;
        if terms > MAX_POLYNOMIAL_TERMS {
            return Err(FilterError::TooMany {
                what: "polynomial coefficients",
                limit: MAX_POLYNOMIAL_TERMS,
            });
        }
        if points.len() < terms {
            return Err(FilterError::NotEnoughDatapoints { required: terms, available: points.len() });
        }

        // Normal equations (A^T A) c = A^T y as an augmented matrix
        let mut m = [[0.0f64; MAX_POLYNOMIAL_TERMS + 1]; MAX_POLYNOMIAL_TERMS];
        for &(x, y) in points {
            let mut powers = [0.0f64; MAX_POLYNOMIAL_TERMS];
            let mut p = 1.0f64;
            for slot in powers.iter_mut().take(terms) {
                *slot = p;
                p *= x as f64;
            }
            for row in 0..terms {
                for col in 0..terms {
                    m[row][col] += powers[row] * powers[col];
                }
                m[row][terms] += powers[row] * y as f64;
            }
        }

        let solution = solve(&mut m, terms)?;
        let mut coefficients = Vec::new();
        for c in solution.iter().take(terms) {
            let _ = coefficients.push(*c as f32);
        }
        log_debug!("polynomial calibration fit: {} coefficients", terms);
        Ok(Self { coefficients })
    }

    /// Coefficients in ascending power order
    pub fn coefficients(&self) -> &[f32] {
        &self.coefficients
    }
}

/// Gauss-Jordan elimination with partial pivoting on an `n x (n + 1)` system
fn solve(
    m: &mut [[f64; MAX_POLYNOMIAL_TERMS + 1]; MAX_POLYNOMIAL_TERMS],
    n: usize,
) -> FilterResult<[f64; MAX_POLYNOMIAL_TERMS]> {
    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&a, &b| libm::fabs(m[a][col]).total_cmp(&libm::fabs(m[b][col])))
            .unwrap_or(col);
        if libm::fabs(m[pivot][col]) < SINGULAR_PIVOT {
            return Err(FilterError::DegenerateCalibration { reason: "singular polynomial fit" });
        }
        m.swap(col, pivot);

        let lead = m[col][col];
        for k in col..=n {
            m[col][k] /= lead;
        }
        for row in 0..n {
            if row != col {
                let factor = m[row][col];
                for k in col..=n {
                    m[row][k] -= factor * m[col][k];
                }
            }
        }
    }

    let mut out = [0.0f64; MAX_POLYNOMIAL_TERMS];
    for (i, slot) in out.iter_mut().enumerate().take(n) {
        *slot = m[i][n];
    }
    Ok(out)
}

impl Filter for CalibratePolynomialFilter {
    fn new_value(&mut self, value: f32, _ctx: &mut FilterContext<'_>) -> Option<f32> {
        let mut result = 0.0f32;
        let mut power = 1.0f32;
        for &c in self.coefficients.iter() {
            result += power * c;
            power *= value;
        }
        Some(result)
    }

    fn name(&self) -> &'static str {
        "CalibratePolynomialFilter"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::TimerQueue;

    fn apply(filter: &mut dyn Filter, value: f32) -> f32 {
        let mut timers = TimerQueue::new();
        let mut ctx = FilterContext::new(0, &mut timers, 2);
        filter.new_value(value, &mut ctx).unwrap()
    }

    fn close(a: f32, b: f32) -> bool {
        libm::fabsf(a - b) < 1e-3
    }

    #[test]
    fn least_squares_recovers_line() {
        let mut cal = CalibrateLinearFilter::least_squares(&[(0.0, 1.0), (1.0, 3.0), (2.0, 5.0)]).unwrap();
        assert!(close(apply(&mut cal, 10.0), 21.0));
        assert_eq!(cal.segments().len(), 1);
    }

    #[test]
    fn least_squares_averages_noise() {
        let mut cal =
            CalibrateLinearFilter::least_squares(&[(0.0, 0.0), (1.0, 1.0), (2.0, 1.0), (3.0, 2.0)]).unwrap();
        // slope 0.6, bias 0.1
        assert!(close(apply(&mut cal, 5.0), 3.1));
    }

    #[test]
    fn least_squares_needs_spread() {
        assert_eq!(
            CalibrateLinearFilter::least_squares(&[(1.0, 1.0)]).unwrap_err(),
            FilterError::NotEnoughDatapoints { required: 2, available: 1 }
        );
        assert!(matches!(
            CalibrateLinearFilter::least_squares(&[(1.0, 1.0), (1.0, 2.0)]),
            Err(FilterError::DegenerateCalibration { .. })
        ));
    }

    #[test]
    fn exact_interpolates_and_extrapolates() {
        let mut cal =
            CalibrateLinearFilter::exact(&[(20.0, 150.0), (0.0, 0.0), (10.0, 100.0)]).unwrap();
        assert!(close(apply(&mut cal, 5.0), 50.0));
        assert!(close(apply(&mut cal, 15.0), 125.0));
        assert!(close(apply(&mut cal, 30.0), 200.0));
        assert!(close(apply(&mut cal, -10.0), -100.0));
        assert_eq!(cal.segments().len(), 2);
    }

    #[test]
    fn reading_past_bounded_segments_is_nan() {
        let mut cal = CalibrateLinearFilter::new([LinearSegment {
            slope: 1.0,
            bias: 0.0,
            upper_bound: 10.0,
        }])
        .unwrap();
        assert_eq!(apply(&mut cal, 5.0), 5.0);
        assert!(apply(&mut cal, 10.0).is_nan());
    }

    #[test]
    fn polynomial_ascending_coefficients() {
        let mut cal = CalibratePolynomialFilter::new(&[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(apply(&mut cal, 2.0), 17.0);
        assert!(apply(&mut cal, f32::NAN).is_nan());
    }

    #[test]
    fn polynomial_fit_recovers_square() {
        let points: alloc::vec::Vec<(f32, f32)> = (0..6).map(|i| (i as f32, (i * i) as f32)).collect();
        let mut cal = CalibratePolynomialFilter::fit(&points, 2).unwrap();
        let c = cal.coefficients();
        assert!(close(c[0], 0.0) && close(c[1], 0.0) && close(c[2], 1.0));
        assert!(close(apply(&mut cal, 7.0), 49.0));
    }

    #[test]
    fn polynomial_fit_checks_inputs() {
        assert!(matches!(
            CalibratePolynomialFilter::fit(&[(0.0, 0.0), (1.0, 1.0)], 2),
            Err(FilterError::NotEnoughDatapoints { required: 3, available: 2 })
        ));
        assert!(matches!(
            CalibratePolynomialFilter::fit(&[(1.0, 0.0), (1.0, 1.0), (1.0, 2.0)], 2),
            Err(FilterError::DegenerateCalibration { .. })
        ));
        assert!(CalibratePolynomialFilter::fit(&[(0.0, 0.0); 12], MAX_POLYNOMIAL_TERMS).is_err());
    }
}
