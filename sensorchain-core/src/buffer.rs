//! Sample windows and emission gates for aggregating stages
//!
//! ## Overview
//!
//! Median, quantile, min, max and the sliding window moving average all keep
//! the most recent N readings and publish an aggregate every few inputs. This
//! module holds the two pieces they share:
//!
//! - [`SampleWindow`]: bounded FIFO of the newest `capacity` readings. Unlike
//!   a growable collection it never refuses a push; the oldest reading is
//!   evicted instead, since recent data matters more than old data.
//! - [`SendGate`]: the modulo counter behind `send_every` / `send_first_at`.
//!
//! ### Why a runtime capacity?
//!
//! Window sizes come from configuration, so the capacity is a constructor
//! argument rather than a const generic. Storage is allocated once, at
//! construction, and never grows past `capacity`.
//!
//! ### NaN handling
//!
//! `NaN` readings occupy a slot like any other reading (the window bound is by
//! total count), but every aggregate skips them. An aggregate over a window
//! with no valid readings is `NaN`.
//!
//! ```text
//! SampleWindow capacity 4, after pushing 1 2 NaN 4 5:
//! ┌─────┬─────┬─────┬─────┐
//! │  2  │ NaN │  4  │  5  │   len 4, valid 3
//! └─────┴─────┴─────┴─────┘
//!   oldest            newest
//! ```
//!
//! ## Usage Example
//!
//! ```rust
//! use sensorchain_core::buffer::{SampleWindow, SendGate};
//!
//! let mut window = SampleWindow::new(3);
//! let mut gate = SendGate::new(2, 1);
//!
//! for reading in [20.0, 21.0, 22.0, 23.0] {
//!     window.push(reading);
//!     if gate.tick() {
//!         let _max = window.max();
//!     }
//! }
//! assert_eq!(window.len(), 3);
//! ```

use alloc::collections::VecDeque;
use alloc::vec::Vec;

/// Bounded FIFO of the newest readings
///
/// ## Internal Invariants
///
/// - `values.len() <= capacity` after every operation
/// - iteration order is oldest to newest
#[derive(Debug, Clone)]
pub struct SampleWindow {
    values: VecDeque<f32>,
    capacity: usize,
}

impl SampleWindow {
    /// Create an empty window holding at most `capacity` readings
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity >= 1, "window size must be at least 1");
        Self {
            values: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Add a reading, evicting the oldest ones first so at most `capacity` remain
    pub fn push(&mut self, value: f32) {
        while self.values.len() >= self.capacity {
            self.values.pop_front();
        }
        self.values.push_back(value);
    }

    /// Number of stored readings, NaN included
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the window is empty
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Check if the window is full
    pub fn is_full(&self) -> bool {
        self.values.len() == self.capacity
    }

    /// Maximum number of readings kept
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop all readings
    pub fn clear(&mut self) {
        self.values.clear();
    }

    /// Iterate readings from oldest to newest, NaN included
    pub fn iter(&self) -> impl Iterator<Item = f32> + '_ {
        self.values.iter().copied()
    }

    /// Iterate the non-NaN readings from oldest to newest
    pub fn valid(&self) -> impl Iterator<Item = f32> + '_ {
        self.iter().filter(|v| !v.is_nan())
    }

    /// Non-NaN readings sorted ascending
    pub fn sorted_valid(&self) -> Vec<f32> {
        let mut sorted: Vec<f32> = self.valid().collect();
        sorted.sort_unstable_by(|a, b| a.total_cmp(b));
        sorted
    }

    /// Smallest non-NaN reading, NaN if there is none
    pub fn min(&self) -> f32 {
        self.valid().fold(f32::NAN, |acc, v| if acc.is_nan() || v < acc { v } else { acc })
    }

    /// Largest non-NaN reading, NaN if there is none
    pub fn max(&self) -> f32 {
        self.valid().fold(f32::NAN, |acc, v| if acc.is_nan() || v > acc { v } else { acc })
    }

    /// Mean of the non-NaN readings, NaN if there is none
    pub fn mean(&self) -> f32 {
        let (sum, count) = self.valid().fold((0.0f32, 0usize), |(s, n), v| (s + v, n + 1));
        if count == 0 {
            f32::NAN
        } else {
            sum / count as f32
        }
    }
}

/// Modulo gate deciding which inputs emit
///
/// The counter starts at `send_every - send_first_at` and advances once per
/// input; when it reaches `send_every` it wraps to 0 and the input emits. The
/// first emission is on input `send_first_at` (1-indexed), then every
/// `send_every` inputs.
#[derive(Debug, Clone, Copy)]
pub struct SendGate {
    send_every: usize,
    send_at: usize,
}

impl SendGate {
    /// Create a gate
    ///
    /// Panics if `send_every` is zero or `send_first_at > send_every`.
    pub fn new(send_every: usize, send_first_at: usize) -> Self {
        assert!(send_every >= 1, "send_every must be at least 1");
        assert!(
            send_first_at <= send_every,
            "send_first_at must be smaller than or equal to send_every"
        );
        Self {
            send_every,
            send_at: send_every - send_first_at,
        }
    }

    /// Count one input, returning `true` if it should emit
    pub fn tick(&mut self) -> bool {
        self.send_at += 1;
        if self.send_at >= self.send_every {
            self.send_at = 0;
            true
        } else {
            false
        }
    }

    /// Configured emission period
    pub fn send_every(&self) -> usize {
        self.send_every
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn empty_window() {
        let window = SampleWindow::new(5);
        assert!(window.is_empty());
        assert_eq!(window.len(), 0);
        assert!(window.min().is_nan());
        assert!(window.max().is_nan());
        assert!(window.mean().is_nan());
    }

    #[test]
    fn oldest_readings_are_evicted() {
        let mut window = SampleWindow::new(3);
        for i in 0..5 {
            window.push(i as f32);
        }

        assert_eq!(window.len(), 3);
        assert!(window.is_full());
        let values: Vec<f32> = window.iter().collect();
        assert_eq!(values, vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn nan_occupies_a_slot_but_not_the_aggregate() {
        let mut window = SampleWindow::new(4);
        for v in [f32::NAN, 5.0, f32::NAN, 7.0] {
            window.push(v);
        }

        assert_eq!(window.len(), 4);
        assert_eq!(window.min(), 5.0);
        assert_eq!(window.max(), 7.0);
        assert_eq!(window.mean(), 6.0);
        assert_eq!(window.sorted_valid(), vec![5.0, 7.0]);
    }

    #[test]
    fn gate_emits_first_then_every_period() {
        let mut gate = SendGate::new(3, 1);
        let emitted: Vec<bool> = (0..7).map(|_| gate.tick()).collect();
        assert_eq!(emitted, vec![true, false, false, true, false, false, true]);
    }

    #[test]
    fn gate_with_full_first_offset_waits_one_period() {
        let mut gate = SendGate::new(4, 4);
        let emitted: Vec<bool> = (0..8).map(|_| gate.tick()).collect();
        assert_eq!(emitted, vec![false, false, false, true, false, false, false, true]);
    }

    #[test]
    #[should_panic]
    fn gate_rejects_late_first_send() {
        let _ = SendGate::new(2, 3);
    }
}
