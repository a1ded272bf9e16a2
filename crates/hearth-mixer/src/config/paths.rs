//! Standard locations for hearth configuration files

use std::path::PathBuf;

/// Name of the configuration directory under the platform config root
const APP_DIR: &str = "hearth";

/// File name of the mixer configuration
pub const MIXER_CONFIG_FILE: &str = "mixer.yaml";

/// Directory holding hearth configuration
///
/// Returns: `{config_dir}/hearth`, falling back to `~/.hearth` (or `./.hearth`)
/// when the platform has no config directory.
pub fn default_config_dir() -> PathBuf {
    match dirs::config_dir() {
        Some(dir) => dir.join(APP_DIR),
        None => dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(format!(".{}", APP_DIR)),
    }
}

/// Path of a configuration file inside [`default_config_dir`]
pub fn default_config_path(filename: &str) -> PathBuf {
    default_config_dir().join(filename)
}
