//! Centralized path resolution for hostprep
//!
//! # Environment Variables
//!
//! - `HOSTPREP_CONFIG` - Settings file to load
//! - `HOSTPREP_STATE_DIR` - Override the marker directory
//!
//! # Settings File Priority
//!
//! 1. `--config` flag (clap also reads `HOSTPREP_CONFIG` into it)
//! 2. `/etc/hostprep/config.toml` if it exists
//! 3. Built-in defaults

use std::path::{Path, PathBuf};

/// Environment variable naming the settings file
pub const ENV_CONFIG: &str = "HOSTPREP_CONFIG";

/// Environment variable for state directory override
pub const ENV_STATE_DIR: &str = "HOSTPREP_STATE_DIR";

/// System-wide settings file
pub const SYSTEM_CONFIG: &str = "/etc/hostprep/config.toml";

/// Pick the settings file to load, if any.
///
/// An explicit path is returned even when missing so the load fails loudly;
/// the system file is only used when present.
pub fn config_file(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        let path = expand(&path.to_string_lossy());
        log::debug!("Using settings file {}", path.display());
        return Some(path);
    }

    let system = PathBuf::from(SYSTEM_CONFIG);
    if system.is_file() {
        log::debug!("Using system settings file {}", system.display());
        return Some(system);
    }

    log::debug!("No settings file, using built-in defaults");
    None
}

/// Resolve the marker directory.
///
/// `HOSTPREP_STATE_DIR` wins over the configured value.
pub fn state_dir(configured: &str) -> PathBuf {
    if let Ok(dir) = std::env::var(ENV_STATE_DIR) {
        let path = expand(&dir);
        log::debug!("Using state dir from {}: {}", ENV_STATE_DIR, path.display());
        return path;
    }
    expand(configured)
}

/// Expand ~ and environment variables in a path string.
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}
