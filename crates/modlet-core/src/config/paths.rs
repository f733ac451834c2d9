//! Standard locations for Modlet configuration files

use std::path::PathBuf;

/// Per-user configuration directory
///
/// Returns `<config dir>/modlet`, e.g. `~/.config/modlet` on Linux. Falls
/// back to the working directory when the platform has no config dir.
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("modlet")
}

/// Default player configuration file: `<config dir>/modlet/config.yaml`
pub fn default_config_path() -> PathBuf {
    config_dir().join("config.yaml")
}
