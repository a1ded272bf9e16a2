//! YAML persistence for configuration types

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

/// Load a config from YAML, falling back to `T::default()`
///
/// A missing file is normal on first run. An unreadable or malformed file is
/// logged and ignored, so a bad edit never keeps audio from starting.
pub fn load_config<T>(path: &Path) -> T
where
    T: DeserializeOwned + Default,
{
    if !path.exists() {
        log::info!("No config at {:?}, using defaults", path);
        return T::default();
    }

    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) => {
            log::warn!("Failed to read config {:?}: {}, using defaults", path, e);
            return T::default();
        }
    };

    match serde_yaml::from_str::<T>(&contents) {
        Ok(config) => {
            log::info!("Loaded config from {:?}", path);
            config
        }
        Err(e) => {
            log::warn!("Failed to parse config {:?}: {}, using defaults", path, e);
            T::default()
        }
    }
}

/// Write a config as YAML, creating parent directories
pub fn save_config<T>(config: &T, path: &Path) -> Result<()>
where
    T: Serialize,
{
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
    }

    let yaml = serde_yaml::to_string(config).context("Failed to serialize config to YAML")?;
    std::fs::write(path, yaml).with_context(|| format!("Failed to write config file: {:?}", path))?;

    log::info!("Saved config to {:?}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{BufferSize, DeviceId, LatencyMode};
    use crate::config::MixerConfig;

    #[test]
    fn test_missing_file_gives_defaults() {
        let config: MixerConfig = load_config(Path::new("/nonexistent/hearth/mixer.yaml"));
        assert_eq!(config, MixerConfig::default());
    }

    #[test]
    fn test_malformed_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mixer.yaml");
        std::fs::write(&path, "output_channels: [not, a, number").unwrap();

        let config: MixerConfig = load_config(&path);
        assert_eq!(config, MixerConfig::default());
    }

    #[test]
    fn test_save_creates_directories_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("mixer.yaml");

        let mut config = MixerConfig {
            output_channels: 0,
            volume: 0.7,
            latency: LatencyMode::High,
            ..MixerConfig::default()
        };
        config.audio.output_device = Some(DeviceId::new("Speakers"));
        config.audio.buffer_size = BufferSize::Fixed(512);

        save_config(&config, &path).unwrap();
        let loaded: MixerConfig = load_config(&path);
        assert_eq!(loaded, config);
    }
}
