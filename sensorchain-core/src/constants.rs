//! Constants for filter chains
//!
//! Capacity limits for the fixed-size parts of a chain, and the default
//! parameters the configuration layer fills in when a key is omitted. The
//! defaults match the values firmware configurations have always assumed,
//! so existing configs behave the same.

// ===== CAPACITY LIMITS =====

/// Maximum number of stages in one chain (or-branches count separately).
pub const MAX_CHAIN_STAGES: usize = 16;

/// Maximum number of branches in an `or` stage.
pub const MAX_OR_BRANCHES: usize = 8;

/// Maximum number of values a `filter_out` stage can drop.
pub const MAX_FILTER_OUT_VALUES: usize = 8;

/// Maximum number of segments in a piecewise linear calibration.
pub const MAX_CALIBRATION_SEGMENTS: usize = 16;

/// Maximum number of polynomial coefficients (degree + 1).
pub const MAX_POLYNOMIAL_TERMS: usize = 8;

/// Most decimals a `round` stage accepts; `10^39` overflows `f32`.
pub const MAX_ROUND_DECIMALS: u8 = f32::MAX_10_EXP as u8;

// ===== WINDOW DEFAULTS =====

/// Default window size for median, quantile, min and max.
pub const DEFAULT_WINDOW_SIZE: usize = 5;

/// Default emission period for median, quantile, min and max.
pub const DEFAULT_SEND_EVERY: usize = 5;

/// Default first emission for every windowed stage.
///
/// 1 means the first reading is published right away so the sensor has a
/// state before the window fills.
pub const DEFAULT_SEND_FIRST_AT: usize = 1;

/// Default window size for the sliding window moving average.
pub const DEFAULT_MOVING_AVERAGE_WINDOW_SIZE: usize = 15;

/// Default emission period for the sliding window moving average.
pub const DEFAULT_MOVING_AVERAGE_SEND_EVERY: usize = 15;

/// Default quantile.
pub const DEFAULT_QUANTILE: f32 = 0.9;

// ===== EXPONENTIAL MOVING AVERAGE =====

/// Default EMA smoothing factor.
pub const DEFAULT_EMA_ALPHA: f32 = 0.1;

/// Default EMA emission period.
pub const DEFAULT_EMA_SEND_EVERY: usize = 15;

// ===== TIMER NAMES =====

/// Timer used by the throttle average stage.
pub const TIMER_THROTTLE_AVERAGE: &str = "throttle_average";

/// Timer used by the timeout stage.
pub const TIMER_TIMEOUT: &str = "timeout";

/// Timer used by the debounce stage.
pub const TIMER_DEBOUNCE: &str = "debounce";

/// Timer used by the heartbeat stage.
pub const TIMER_HEARTBEAT: &str = "heartbeat";
