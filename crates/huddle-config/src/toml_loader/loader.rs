//! Reading a config file: parse, then warn about out-of-range values.

use std::io;
use std::path::Path;

use huddle_common::ConfigError;
use tracing::{info, warn};

use super::paths::{create_default_config, default_config_path};
use crate::schema::HuddleConfig;
use crate::validation;

/// Parse config text. Missing sections and fields take their defaults.
pub fn parse_config(content: &str) -> Result<HuddleConfig, ConfigError> {
    toml::from_str(content).map_err(|e| ConfigError::ParseError(format!("invalid TOML: {e}")))
}

/// Load a config file.
///
/// Out-of-range values are logged and kept, so the relay still starts on a
/// slightly wrong file. [`crate::load_config`] is the strict variant.
pub fn load_from_path(path: &Path) -> Result<HuddleConfig, ConfigError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(ConfigError::FileNotFound(path.to_path_buf()))
        }
        Err(e) => {
            return Err(ConfigError::ParseError(format!(
                "cannot read {}: {e}",
                path.display()
            )))
        }
    };

    let config = parse_config(&content)?;
    if let Err(e) = validation::validate(&config) {
        warn!(path = %path.display(), error = %e, "Config has out-of-range values");
    }

    info!(path = %path.display(), relay = %config.relay.url, "Loaded config");
    Ok(config)
}

/// Load the per-user config, writing the commented template on first run.
pub fn load_default() -> Result<HuddleConfig, ConfigError> {
    let path = default_config_path()?;
    match load_from_path(&path) {
        Err(ConfigError::FileNotFound(_)) => {
            create_default_config(&path)?;
            Ok(HuddleConfig::default())
        }
        other => other,
    }
}
