//! Where the config file lives.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use huddle_common::ConfigError;
use tracing::{debug, info};

use super::template::default_config_toml;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "HUDDLE_CONFIG";

/// `$HUDDLE_CONFIG` if set, otherwise `<user config dir>/huddle/config.toml`.
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    if let Some(path) = std::env::var_os(CONFIG_ENV).filter(|p| !p.is_empty()) {
        return Ok(PathBuf::from(path));
    }
    dirs::config_dir()
        .map(|dir| dir.join("huddle").join("config.toml"))
        .ok_or_else(|| ConfigError::ParseError("no user config directory on this platform".into()))
}

/// Write the commented template to `path`. An existing file is left alone.
pub fn create_default_config(path: &Path) -> Result<(), ConfigError> {
    let io_error = |what: &str, at: &Path, e: io::Error| {
        ConfigError::ParseError(format!("cannot {what} {}: {e}", at.display()))
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| io_error("create", parent, e))?;
    }

    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            debug!(path = %path.display(), "Config already exists, not overwriting");
            return Ok(());
        }
        Err(e) => return Err(io_error("create", path, e)),
    };
    file.write_all(default_config_toml().as_bytes())
        .map_err(|e| io_error("write", path, e))?;

    info!(path = %path.display(), "Wrote default config");
    Ok(())
}
