//! Tests for TOML config loading, creation, and path resolution.

use super::*;
use std::path::Path;

#[test]
fn load_from_nonexistent_returns_file_not_found() {
    let result = load_from_path(Path::new("/tmp/nonexistent_huddle_config.toml"));
    assert!(matches!(
        result.unwrap_err(),
        huddle_common::ConfigError::FileNotFound(_)
    ));
}

#[test]
fn load_valid_partial_toml() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
[voice_activity]
threshold = 0.05

[relay]
url = "wss://relay.example.com"
"#,
    )
    .unwrap();

    let config = load_from_path(&path).unwrap();
    assert_eq!(config.voice_activity.threshold, 0.05);
    assert_eq!(config.relay.url, "wss://relay.example.com");
    // Defaults preserved
    assert_eq!(config.voice_activity.buffer_size, 2048);
    assert_eq!(config.mesh.event_capacity, 256);
}

#[test]
fn load_invalid_toml_returns_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "this is not valid toml {{{").unwrap();

    let err = load_from_path(&path).unwrap_err();
    assert!(matches!(err, huddle_common::ConfigError::ParseError(_)));
}

#[test]
fn load_out_of_range_values_still_returns_config() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[voice_activity]\ntick_ms = 1\n").unwrap();

    let config = load_from_path(&path).unwrap();
    assert_eq!(config.voice_activity.tick_ms, 1);
}

#[test]
fn create_and_load_default_config() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("huddle").join("config.toml");

    create_default_config(&path).unwrap();
    assert!(path.exists());

    let config = load_from_path(&path).unwrap();
    assert_eq!(config.voice_activity.threshold, 0.02);
}

#[test]
fn default_config_toml_is_valid() {
    use super::template::default_config_toml;
    use crate::schema::HuddleConfig;

    let config: HuddleConfig = toml::from_str(&default_config_toml()).unwrap();
    assert!(crate::validation::validate(&config).is_ok());
}

#[test]
fn default_config_path_honors_override() {
    std::env::set_var(CONFIG_ENV, "/srv/huddle/relay.toml");
    assert_eq!(
        default_config_path().unwrap(),
        Path::new("/srv/huddle/relay.toml")
    );

    std::env::remove_var(CONFIG_ENV);
    if let Ok(path) = default_config_path() {
        let path_str = path.to_string_lossy();
        assert!(path_str.contains("huddle"));
        assert!(path_str.ends_with("config.toml"));
    }
}

#[test]
fn existing_config_is_not_overwritten() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[mesh]\nmax_participants = 4\n").unwrap();

    create_default_config(&path).unwrap();
    let config = load_from_path(&path).unwrap();
    assert_eq!(config.mesh.max_participants, 4);
}

#[test]
fn parse_config_reports_bad_types() {
    let err = parse_config("[relay]\nport = \"eighty\"\n").unwrap_err();
    assert!(matches!(err, huddle_common::ConfigError::ParseError(msg) if msg.starts_with("invalid TOML")));
    assert_eq!(parse_config("").unwrap().relay.port, 8080);
}
