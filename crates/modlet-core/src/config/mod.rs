//! Configuration for Modlet
//!
//! - Generic YAML config loading/saving
//! - Standard config paths
//! - [`PlayerConfig`]: session defaults and host audio settings
//!
//! # Usage
//!
//! ```ignore
//! use modlet_core::config::{default_config_path, load_config, save_config, PlayerConfig};
//!
//! let path = default_config_path();
//! let config: PlayerConfig = load_config(&path);
//! save_config(&config, &path)?;
//! ```

mod io;
mod paths;
mod player;

pub use io::{load_config, save_config, try_load_config};
pub use paths::{config_dir, default_config_path};
pub use player::PlayerConfig;
