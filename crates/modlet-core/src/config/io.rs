//! YAML configuration I/O
//!
//! Works with any serde configuration type. Loading comes in two flavours:
//! [`try_load_config`] reports what went wrong, [`load_config`] logs it and
//! falls back to defaults so a broken file never keeps the player from
//! starting.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

/// Read and parse a YAML configuration file
pub fn try_load_config<T>(path: &Path) -> Result<T>
where
    T: DeserializeOwned,
{
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;
    serde_yaml::from_str(&contents).with_context(|| format!("Failed to parse config: {:?}", path))
}

/// Load configuration, using defaults when the file is missing or invalid
///
/// ```ignore
/// let config: PlayerConfig = load_config(&default_config_path());
/// ```
pub fn load_config<T>(path: &Path) -> T
where
    T: DeserializeOwned + Default,
{
    if !path.exists() {
        log::info!("No config at {:?}, using defaults", path);
        return T::default();
    }

    match try_load_config(path) {
        Ok(config) => {
            log::info!("Loaded config from {:?}", path);
            config
        }
        Err(e) => {
            log::warn!("{:#}, using defaults", e);
            T::default()
        }
    }
}

/// Save configuration to a YAML file
///
/// Creates parent directories if they don't exist.
pub fn save_config<T>(config: &T, path: &Path) -> Result<()>
where
    T: Serialize,
{
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
    }

    let yaml = serde_yaml::to_string(config).context("Failed to serialize config to YAML")?;
    std::fs::write(path, yaml)
        .with_context(|| format!("Failed to write config file: {:?}", path))?;

    log::info!("Saved config to {:?}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlayerConfig;

    #[test]
    fn test_missing_file_returns_default() {
        let config: PlayerConfig = load_config(Path::new("/nonexistent/modlet/config.yaml"));
        assert_eq!(config, PlayerConfig::default());
        assert!(try_load_config::<PlayerConfig>(Path::new("/nonexistent/modlet/config.yaml")).is_err());
    }

    #[test]
    fn test_invalid_yaml_returns_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "report_interval_ms: [not, a, number").unwrap();

        let config: PlayerConfig = load_config(&path);
        assert_eq!(config, PlayerConfig::default());

        let err = try_load_config::<PlayerConfig>(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to parse config"));
    }

    #[test]
    fn test_roundtrip_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("modlet").join("config.yaml");

        let config = PlayerConfig {
            report_interval_ms: 33.0,
            start_looping: false,
            initial_volume: 0.8,
            ..Default::default()
        };

        save_config(&config, &path).unwrap();
        let loaded: PlayerConfig = load_config(&path);
        assert_eq!(loaded, config);
    }
}
