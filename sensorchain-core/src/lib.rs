//! Sensor value filter chains for edge devices
//!
//! Turns raw, noisy sensor readings into stable published states by running
//! each reading through an ordered chain of small filter stages: window
//! aggregates (median, quantile, min, max, moving averages), time-gated stages
//! (throttle, debounce, heartbeat, timeout) and simple transforms (offset,
//! calibration, clamp, rounding).
//!
//! Key constraints:
//! - Single-threaded cooperative loop, no locks
//! - Bounded per-stage state, no allocation per reading in fixed-size stages
//! - `NaN` means "invalid reading", `None` means "nothing to publish yet"
//!
//! ```no_run
//! use sensorchain_core::{Sensor, time::MonotonicTime};
//! use sensorchain_core::filter::{MedianFilter, OffsetFilter};
//!
//! let mut sensor = Sensor::new("Living Room Temperature", MonotonicTime::new());
//! sensor.add_filter(OffsetFilter::new(-0.5)).unwrap();
//! sensor.add_filter(MedianFilter::new(5, 5, 1)).unwrap();
//!
//! // Called from the driver on every register read
//! sensor.publish_state(21.7);
//!
//! // Called from the main loop so time-gated stages can fire
//! sensor.poll();
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unsafe_code)]
#![warn(missing_docs)]

extern crate alloc;

#[macro_use]
mod macros;

pub mod buffer;
#[cfg(all(feature = "serde", any(feature = "std", feature = "alloc")))]
pub mod config;
pub mod constants;
pub mod errors;
pub mod filter;
pub mod scheduler;
pub mod sensor;
pub mod time;

// Public API
pub use errors::{FilterError, FilterResult};
pub use filter::{Filter, FilterChain, FilterContext};
pub use scheduler::{TimerKey, TimerQueue};
pub use sensor::Sensor;
pub use time::{TimeSource, Timestamp};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_exists() {
        assert!(!VERSION.is_empty());
    }
}
