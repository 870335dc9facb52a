//! Error Types for Filter Chain Assembly
//!
//! Filtering itself never fails: an invalid reading travels through the chain
//! as `NaN` and "nothing to publish yet" is `None`. Errors only exist at the
//! edges where a chain is put together:
//!
//! - A configuration that would violate a stage's construction contract
//!   (window of zero, quantile outside (0, 1], zero period, ...)
//! - A chain or stage list that exceeds its fixed capacity
//!
//! Direct constructors (`MedianFilter::new` and friends) panic on the same
//! misuse instead, since their arguments are fixed at build time. The
//! configuration layer checks first so that data loaded at runtime never
//! reaches those panics.
//!
//! ## Design
//!
//! Errors are `Copy`, carry only inline data and `&'static str`, and stay
//! small so they can be returned from firmware code without allocation.
//!
//! ```rust
//! use sensorchain_core::{FilterChain, FilterError};
//! use sensorchain_core::filter::OffsetFilter;
//!
//! let mut chain = FilterChain::new();
//! match chain.add(OffsetFilter::new(1.0)) {
//!     Ok(()) => {}
//!     Err(FilterError::ChainFull { capacity }) => {
//!         // Too many stages for this build
//!         let _ = capacity;
//!     }
//!     Err(_) => {}
//! }
//! ```

use thiserror_no_std::Error;

/// Result type for chain assembly operations
pub type FilterResult<T> = Result<T, FilterError>;

/// Chain assembly and configuration errors
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum FilterError {
    /// A chain already holds its maximum number of stages
    #[error("Filter chain full: capacity {capacity}")]
    ChainFull {
        /// Maximum number of stages per chain
        capacity: usize,
    },

    /// A bounded list inside a stage (or-branches, calibration points, ...) is full
    #[error("Too many {what}: limit {limit}")]
    TooMany {
        /// What overflowed
        what: &'static str,
        /// Maximum allowed
        limit: usize,
    },

    /// Window size must be at least one
    #[error("Window size must be at least 1")]
    InvalidWindowSize,

    /// `send_every` must be at least one
    #[error("send_every must be at least 1")]
    InvalidSendEvery,

    /// `send_first_at` must not exceed `send_every`
    #[error("send_first_at {send_first_at} must be <= send_every {send_every}")]
    InvalidSendFirstAt {
        /// Configured first emission offset
        send_first_at: usize,
        /// Configured emission period
        send_every: usize,
    },

    /// Quantile outside (0, 1]
    #[error("Quantile {quantile} outside (0, 1]")]
    InvalidQuantile {
        /// Configured quantile
        quantile: f32,
    },

    /// EMA smoothing factor outside (0, 1]
    #[error("Alpha {alpha} outside (0, 1]")]
    InvalidAlpha {
        /// Configured smoothing factor
        alpha: f32,
    },

    /// A time-gated stage was configured with a zero period
    #[error("{filter} period must be greater than zero")]
    ZeroPeriod {
        /// Stage name
        filter: &'static str,
    },

    /// Calibration needs more datapoints than were given
    #[error("Calibration needs {required} datapoints, have {available}")]
    NotEnoughDatapoints {
        /// Minimum number of datapoints
        required: usize,
        /// Datapoints supplied
        available: usize,
    },

    /// Datapoints do not determine a unique calibration (identical inputs, singular fit)
    #[error("Calibration datapoints are degenerate: {reason}")]
    DegenerateCalibration {
        /// Why the fit failed
        reason: &'static str,
    },

    /// Clamp bounds are inverted
    #[error("Clamp range [{min}, {max}] is empty")]
    InvalidRange {
        /// Lower bound
        min: f32,
        /// Upper bound
        max: f32,
    },

    /// A numeric parameter is not a usable number
    #[error("Invalid parameter: {name}")]
    InvalidParameter {
        /// Parameter name
        name: &'static str,
    },
}

#[cfg(feature = "defmt")]
impl defmt::Format for FilterError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Self::ChainFull { capacity } =>
                defmt::write!(fmt, "Chain full ({})", capacity),
            Self::TooMany { what, limit } =>
                defmt::write!(fmt, "Too many {} (limit {})", what, limit),
            Self::InvalidWindowSize =>
                defmt::write!(fmt, "Invalid window size"),
            Self::InvalidSendEvery =>
                defmt::write!(fmt, "Invalid send_every"),
            Self::InvalidSendFirstAt { send_first_at, send_every } =>
                defmt::write!(fmt, "send_first_at {} > send_every {}", send_first_at, send_every),
            Self::InvalidQuantile { quantile } =>
                defmt::write!(fmt, "Quantile {} outside (0, 1]", quantile),
            Self::InvalidAlpha { alpha } =>
                defmt::write!(fmt, "Alpha {} outside (0, 1]", alpha),
            Self::ZeroPeriod { filter } =>
                defmt::write!(fmt, "{} period is zero", filter),
            Self::NotEnoughDatapoints { required, available } =>
                defmt::write!(fmt, "Need {} datapoints, have {}", required, available),
            Self::DegenerateCalibration { reason } =>
                defmt::write!(fmt, "Degenerate calibration: {}", reason),
            Self::InvalidRange { min, max } =>
                defmt::write!(fmt, "Empty range [{}, {}]", min, max),
            Self::InvalidParameter { name } =>
                defmt::write!(fmt, "Invalid parameter {}", name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_stay_small() {
        assert!(core::mem::size_of::<FilterError>() <= 32);
    }

    #[cfg(feature = "std")]
    #[test]
    fn display_includes_values() {
        let err = FilterError::InvalidSendFirstAt { send_first_at: 7, send_every: 5 };
        assert_eq!(err.to_string(), "send_first_at 7 must be <= send_every 5");
    }
}
