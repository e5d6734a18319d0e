//! Validation for the mesh engine and relay sections.

use crate::schema::HuddleConfig;

use super::helpers::validate_range;

pub(crate) fn validate_mesh(errors: &mut Vec<String>, config: &HuddleConfig) {
    validate_range(
        errors,
        "mesh.command_capacity",
        config.mesh.command_capacity,
        1,
        4096,
    );
    validate_range(
        errors,
        "mesh.event_capacity",
        config.mesh.event_capacity,
        1,
        65536,
    );
    validate_range(
        errors,
        "mesh.max_participants",
        config.mesh.max_participants,
        2,
        64,
    );
}

pub(crate) fn validate_relay(errors: &mut Vec<String>, config: &HuddleConfig) {
    let relay = &config.relay;
    if !(relay.url.starts_with("ws://") || relay.url.starts_with("wss://")) {
        errors.push(format!("relay.url = {} must be a ws:// or wss:// URL", relay.url));
    }
    validate_range(errors, "relay.port", relay.port, 1, 65535);
    validate_range(
        errors,
        "relay.connect_timeout_secs",
        relay.connect_timeout_secs,
        1,
        120,
    );
    validate_range(
        errors,
        "relay.reconnect_delay_secs",
        relay.reconnect_delay_secs,
        1,
        60,
    );
    if relay.max_reconnect_delay_secs < relay.reconnect_delay_secs {
        errors.push(format!(
            "relay.max_reconnect_delay_secs = {} is below relay.reconnect_delay_secs = {}",
            relay.max_reconnect_delay_secs, relay.reconnect_delay_secs
        ));
    }
    validate_range(
        errors,
        "relay.hello_timeout_secs",
        relay.hello_timeout_secs,
        1,
        60,
    );
}
