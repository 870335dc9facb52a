//! Time sources for filter chains
//!
//! Throttle reads the current time directly and every timer deadline is
//! computed from it, so the clock is injected into the owning sensor instead
//! of being read from a global:
//! - `MonotonicTime` for hosts (milliseconds since creation)
//! - `ManualTime` for tests and simulations that step time by hand
//!
//! Deadlines are plain differences of readings, so the source must never go
//! backwards. A wall clock that can be stepped by NTP is the wrong choice.

/// Timestamp in milliseconds since device boot (or clock creation)
pub type Timestamp = u64;

/// Monotonic millisecond clock
///
/// Firmware ports implement this over their tick counter.
pub trait TimeSource: Send {
    /// Get current timestamp in milliseconds
    fn now(&self) -> Timestamp;
}

/// Monotonic time source backed by `std::time::Instant`
///
/// Starts at 0 when created, always increases.
#[cfg(feature = "std")]
#[derive(Debug, Clone)]
pub struct MonotonicTime {
    start: std::time::Instant,
}

#[cfg(feature = "std")]
impl MonotonicTime {
    /// Start a new monotonic clock at 0
    pub fn new() -> Self {
        Self { start: std::time::Instant::now() }
    }
}

#[cfg(feature = "std")]
impl Default for MonotonicTime {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "std")]
impl TimeSource for MonotonicTime {
    fn now(&self) -> Timestamp {
        self.start.elapsed().as_millis() as Timestamp
    }
}

/// Hand-stepped time source for tests and simulations
#[derive(Debug, Clone, Default)]
pub struct ManualTime {
    timestamp: Timestamp,
}

impl ManualTime {
    /// Create a clock stopped at `timestamp`
    pub fn new(timestamp: Timestamp) -> Self {
        Self { timestamp }
    }

    /// Jump to an absolute time
    pub fn set(&mut self, timestamp: Timestamp) {
        self.timestamp = timestamp;
    }

    /// Move forward by `ms` milliseconds
    pub fn advance(&mut self, ms: u64) {
        self.timestamp = self.timestamp.saturating_add(ms);
    }
}

impl TimeSource for ManualTime {
    fn now(&self) -> Timestamp {
        self.timestamp
    }
}
