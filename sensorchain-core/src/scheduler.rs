//! Named timers for time-gated stages
//!
//! ## Overview
//!
//! Debounce, heartbeat, timeout and throttle-average stages need to emit
//! later, not while they are handling an input. They register named timers
//! here; the owning sensor drains due timers from its main loop
//! ([`crate::Sensor::poll`]) and routes each one back to the stage that armed
//! it. Everything runs on the caller's loop: a timer never fires while a
//! stage is in the middle of `new_value`.
//!
//! ## Keys
//!
//! A timer is identified by the arming stage and a static name. Arming a key
//! that already exists replaces the pending entry (last write wins), which is
//! how debounce and timeout restart their countdown on every input.
//!
//! ## Ordering
//!
//! Due timers come out by deadline, ties broken by registration order.
//! Intervals are rescheduled one period after the moment they fired, so a
//! late poll does not cause a burst of catch-up firings.

use alloc::vec::Vec;
use core::cell::Cell;
use critical_section::Mutex;

use crate::time::Timestamp;

// No atomic read-modify-write on single-core parts such as the ESP32-C3
static NEXT_STAGE_ID: Mutex<Cell<u32>> = Mutex::new(Cell::new(1));

/// Unique identity of one stage instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StageId(u32);

impl StageId {
    /// Stage of a context not yet bound to a chain slot; never allocated
    pub(crate) const UNBOUND: StageId = StageId(0);

    /// Allocate a fresh id, distinct from every id allocated before
    ///
    /// Firmware builds need a `critical-section` implementation, usually
    /// provided by the HAL.
    pub fn next() -> Self {
        critical_section::with(|cs| {
            let counter = NEXT_STAGE_ID.borrow(cs);
            let id = counter.get();
            // Zero is reserved for unbound contexts
            counter.set(id.checked_add(1).unwrap_or(1));
            Self(id)
        })
    }
}

/// Timer identity: the stage that armed it plus a name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerKey {
    /// Stage that owns the timer
    pub stage: StageId,
    /// Timer name within that stage
    pub name: &'static str,
}

impl TimerKey {
    /// Build a key
    pub fn new(stage: StageId, name: &'static str) -> Self {
        Self { stage, name }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerKind {
    Timeout,
    Interval { period_ms: u32 },
}

#[derive(Debug, Clone)]
struct TimerEntry {
    key: TimerKey,
    kind: TimerKind,
    deadline: Timestamp,
    seq: u64,
}

/// Pending timeouts and intervals of one sensor
#[derive(Debug, Default)]
pub struct TimerQueue {
    entries: Vec<TimerEntry>,
    seq: u64,
}

impl TimerQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a one-shot timer `delay_ms` from `now`, replacing any timer with the same key
    pub fn set_timeout(&mut self, key: TimerKey, delay_ms: u32, now: Timestamp) {
        self.insert(key, TimerKind::Timeout, now.saturating_add(delay_ms as u64));
    }

    /// Arm a periodic timer, replacing any timer with the same key
    ///
    /// The first firing is one period from `now`. Panics if `period_ms` is zero.
    pub fn set_interval(&mut self, key: TimerKey, period_ms: u32, now: Timestamp) {
        assert!(period_ms > 0, "interval period must be greater than zero");
        self.insert(
            key,
            TimerKind::Interval { period_ms },
            now.saturating_add(period_ms as u64),
        );
    }

    /// Cancel a timer, returning whether one was pending
    pub fn cancel(&mut self, key: &TimerKey) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.key != *key);
        self.entries.len() != before
    }

    /// Cancel every timer owned by `stage`
    pub fn cancel_stage(&mut self, stage: StageId) {
        self.entries.retain(|entry| entry.key.stage != stage);
    }

    /// Check whether a timer with this key is pending
    pub fn is_pending(&self, key: &TimerKey) -> bool {
        self.entries.iter().any(|entry| entry.key == *key)
    }

    /// Take the earliest timer due at `now`
    ///
    /// Timeouts are removed; intervals are rescheduled one period after `now`.
    pub fn pop_due(&mut self, now: Timestamp) -> Option<TimerKey> {
        let index = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.deadline <= now)
            .min_by_key(|(_, entry)| (entry.deadline, entry.seq))
            .map(|(index, _)| index)?;

        let key = self.entries[index].key;
        match self.entries[index].kind {
            TimerKind::Timeout => {
                self.entries.swap_remove(index);
            }
            TimerKind::Interval { period_ms } => {
                let seq = self.bump_seq();
                let entry = &mut self.entries[index];
                entry.deadline = now.saturating_add(period_ms as u64);
                entry.seq = seq;
            }
        }
        Some(key)
    }

    /// Earliest pending deadline
    pub fn next_deadline(&self) -> Option<Timestamp> {
        self.entries.iter().map(|entry| entry.deadline).min()
    }

    /// Number of pending timers
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if no timer is pending
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every timer
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn insert(&mut self, key: TimerKey, kind: TimerKind, deadline: Timestamp) {
        self.cancel(&key);
        let seq = self.bump_seq();
        self.entries.push(TimerEntry { key, kind, deadline, seq });
    }

    fn bump_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }
}
