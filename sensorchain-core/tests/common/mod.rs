//! Common test utilities for integration tests
//!
//! - [`Recorder`]: captures every published state of a sensor
//! - [`recording_sensor`]: sensor on manual time with a recorder attached
//! - [`run_until`]: advance simulated time in steps, polling as a main loop would
//! - `generators`: deterministic noisy signals

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use sensorchain_core::{
    time::{ManualTime, TimeSource, Timestamp},
    Filter, Sensor,
};

pub mod generators;

/// Shared log of published states
#[derive(Clone, Default)]
pub struct Recorder {
    states: Arc<Mutex<Vec<f32>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach to a sensor's filtered output
    pub fn attach(&self, sensor: &mut Sensor<ManualTime>) {
        let states = Arc::clone(&self.states);
        sensor.add_on_state_callback(move |value| states.lock().unwrap().push(value));
    }

    /// Everything published so far
    pub fn states(&self) -> Vec<f32> {
        self.states.lock().unwrap().clone()
    }

    /// Take everything published so far
    pub fn drain(&self) -> Vec<f32> {
        std::mem::take(&mut *self.states.lock().unwrap())
    }

    pub fn len(&self) -> usize {
        self.states.lock().unwrap().len()
    }
}

/// Sensor at time zero with the given stages and a recorder on its output
pub fn recording_sensor(filters: Vec<Box<dyn Filter>>) -> (Sensor<ManualTime>, Recorder) {
    let mut sensor = Sensor::new("test_sensor", ManualTime::new(0));
    sensor.set_accuracy_decimals(2);
    sensor.add_filters(filters).expect("chain fits");
    let recorder = Recorder::new();
    recorder.attach(&mut sensor);
    (sensor, recorder)
}

/// Advance to `until` in `step_ms` increments, polling after every step
pub fn run_until(sensor: &mut Sensor<ManualTime>, until: Timestamp, step_ms: u64) {
    while sensor.clock().now() < until {
        let next = (sensor.clock().now() + step_ms).min(until);
        sensor.clock_mut().set(next);
        sensor.poll();
    }
}

/// Publish `value` at time `at`, after firing every timer due before it
pub fn publish_at(sensor: &mut Sensor<ManualTime>, at: Timestamp, value: f32) {
    sensor.clock_mut().set(at);
    sensor.poll();
    sensor.publish_state(value);
}

/// Compare with a tolerance suited to single precision sums
pub fn assert_close(actual: f32, expected: f32) {
    assert!(
        (actual - expected).abs() < 1e-4,
        "expected {expected}, got {actual}"
    );
}
