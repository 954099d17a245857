//! Standard locations for notasync configuration files

use std::path::PathBuf;

/// Directory holding notasync configuration
///
/// Returns: `~/.config/notasync` (platform config dir, home or `.` as fallback)
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("notasync")
}

/// Default engine config file path
///
/// Returns: `~/.config/notasync/config.yaml`
pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.yaml")
}
