//! Path utilities for cadence configuration files

use std::path::PathBuf;

/// Get the default configuration directory
///
/// Returns: `~/.config/cadence` (platform config dir, or `./cadence` when the
/// platform has none)
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("cadence")
}

/// Get the default config file path for a given file name
///
/// # Arguments
/// * `filename` - Config file name (e.g., "sync.yaml", "scenario.yaml")
pub fn default_config_path(filename: &str) -> PathBuf {
    default_config_dir().join(filename)
}
