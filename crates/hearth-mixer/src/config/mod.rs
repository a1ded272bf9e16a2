//! Configuration for the mixing core
//!
//! - [`MixerConfig`]: mixer settings plus backend device selection
//! - YAML loading/saving for any serde config type
//! - Standard config file locations
//!
//! # Usage
//!
//! ```ignore
//! use hearth_mixer::config::{default_config_path, load_config, save_config, MixerConfig, MIXER_CONFIG_FILE};
//!
//! let path = default_config_path(MIXER_CONFIG_FILE);
//! let config: MixerConfig = load_config(&path);
//! save_config(&config, &path)?;
//! ```

mod io;
mod mixer;
mod paths;

pub use io::{load_config, save_config};
pub use mixer::MixerConfig;
pub use paths::{default_config_dir, default_config_path, MIXER_CONFIG_FILE};
