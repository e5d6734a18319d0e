//! Tests for the full validation pipeline.

use super::*;

#[test]
fn default_config_validates() {
    let config = HuddleConfig::default();
    assert!(validate(&config).is_ok());
}

#[test]
fn catches_threshold_out_of_range() {
    let mut config = HuddleConfig::default();
    config.voice_activity.threshold = 1.5;
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("voice_activity.threshold"));
}

#[test]
fn catches_buffer_size_not_power_of_two() {
    let mut config = HuddleConfig::default();
    config.voice_activity.buffer_size = 1000;
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("not a power of two"));
}

#[test]
fn catches_tick_too_fast() {
    let mut config = HuddleConfig::default();
    config.voice_activity.tick_ms = 1;
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("voice_activity.tick_ms"));
}

#[test]
fn catches_non_websocket_relay_url() {
    let mut config = HuddleConfig::default();
    config.relay.url = "http://relay.example.com".into();
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("relay.url"));
}

#[test]
fn catches_inverted_reconnect_delays() {
    let mut config = HuddleConfig::default();
    config.relay.reconnect_delay_secs = 10;
    config.relay.max_reconnect_delay_secs = 5;
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("relay.max_reconnect_delay_secs"));
}

#[test]
fn collects_multiple_errors() {
    let mut config = HuddleConfig::default();
    config.mesh.max_participants = 1;
    config.relay.port = 0;
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("mesh.max_participants"));
    assert!(err.contains("relay.port"));
}
