//! Sensors assembled from JSON configuration

#![cfg(feature = "std")]

mod common;

use sensorchain_core::{
    config::{FilterConfig, SensorConfig},
    time::ManualTime,
    FilterError, Sensor,
};

use common::{assert_close, Recorder};

fn sensor_from_json(json: &str) -> (Sensor<ManualTime>, Recorder) {
    let config: SensorConfig = serde_json::from_str(json).unwrap();
    let mut sensor = Sensor::from_config(&config, ManualTime::new(0)).unwrap();
    let recorder = Recorder::new();
    recorder.attach(&mut sensor);
    (sensor, recorder)
}

#[test]
fn typical_temperature_config() {
    let (mut sensor, recorder) = sensor_from_json(
        r#"{
            "name": "Outside Temperature",
            "unit_of_measurement": "°C",
            "accuracy_decimals": 1,
            "filters": [
                { "offset": -0.5 },
                { "median": { "window_size": 3, "send_every": 3, "send_first_at": 3 } },
                { "round": 1 }
            ]
        }"#,
    );

    assert_eq!(sensor.filter_names().collect::<Vec<_>>(), ["OffsetFilter", "MedianFilter", "RoundFilter"]);
    for raw in [20.54, 35.0, 20.76] {
        sensor.publish_state(raw);
    }
    let states = recorder.states();
    assert_eq!(states.len(), 1);
    assert_close(states[0], 20.3);
}

#[test]
fn moving_average_defaults() {
    let (mut sensor, recorder) =
        sensor_from_json(r#"{ "name": "Flow", "filters": [ { "sliding_window_moving_average": {} } ] }"#);

    for i in 0..31 {
        sensor.publish_state(i as f32);
    }

    // Window 15, every 15, first at 1: inputs 1, 16 and 31 emit
    let states = recorder.states();
    assert_eq!(states.len(), 3);
    assert_close(states[0], 0.0);
    assert_close(states[1], 8.0);
    assert_close(states[2], 23.0);
}

#[test]
fn ema_defaults() {
    let (mut sensor, recorder) =
        sensor_from_json(r#"{ "name": "Light", "filters": [ { "exponential_moving_average": {} } ] }"#);

    sensor.publish_state(100.0);
    for _ in 0..15 {
        sensor.publish_state(0.0);
    }

    // alpha 0.1: after 15 zeros 100 * 0.9^15
    let states = recorder.states();
    assert_eq!(states.len(), 2);
    assert_close(states[0], 100.0);
    assert!((states[1] - 100.0 * 0.9f32.powi(15)).abs() < 1e-3);
}

#[test]
fn or_config_builds_branches() {
    let (mut sensor, recorder) = sensor_from_json(
        r#"{
            "name": "Pressure",
            "filters": [
                { "or": [ { "delta": { "value": 5.0 } }, { "throttle": 60000 } ] }
            ]
        }"#,
    );

    sensor.publish_state(1000.0);
    sensor.publish_state(1001.0);
    sensor.clock_mut().set(60_000);
    sensor.publish_state(1002.0);
    sensor.publish_state(1010.0);

    assert_eq!(recorder.states(), [1000.0, 1002.0, 1010.0]);
}

#[test]
fn filter_out_uses_configured_sensor_decimals() {
    let (mut sensor, recorder) = sensor_from_json(
        r#"{
            "name": "Probe",
            "accuracy_decimals": 0,
            "filters": [ { "filter_out": { "values": [85] } } ]
        }"#,
    );

    sensor.publish_state(85.2);
    sensor.publish_state(86.0);
    assert_eq!(recorder.states(), [86.0]);
}

#[test]
fn calibrate_polynomial_config() {
    let (mut sensor, recorder) = sensor_from_json(
        r#"{
            "name": "Thermistor",
            "filters": [
                { "calibrate_polynomial": {
                    "degree": 2,
                    "datapoints": [
                        { "from": 0, "to": 1 },
                        { "from": 1, "to": 2 },
                        { "from": 2, "to": 5 },
                        { "from": 3, "to": 10 }
                    ]
                } }
            ]
        }"#,
    );

    sensor.publish_state(4.0);
    assert_close(recorder.states()[0], 17.0);
}

#[test]
fn invalid_stage_rejects_whole_sensor() {
    let config: SensorConfig = serde_json::from_str(
        r#"{
            "name": "Broken",
            "filters": [ { "offset": 1 }, { "quantile": { "window_size": 0 } } ]
        }"#,
    )
    .unwrap();

    assert_eq!(
        Sensor::from_config(&config, ManualTime::new(0)).err(),
        Some(FilterError::InvalidWindowSize)
    );
    assert_eq!(config.build_chain().err(), Some(FilterError::InvalidWindowSize));
}

#[test]
fn oversized_chain_is_rejected() {
    let config = SensorConfig {
        name: "Long".into(),
        unit_of_measurement: None,
        accuracy_decimals: 0,
        filters: vec![FilterConfig::Offset(0.0); sensorchain_core::constants::MAX_CHAIN_STAGES + 1],
    };

    assert_eq!(
        config.build_chain().err(),
        Some(FilterError::ChainFull { capacity: sensorchain_core::constants::MAX_CHAIN_STAGES })
    );
}
