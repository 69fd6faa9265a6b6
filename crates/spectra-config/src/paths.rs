//! Platform-specific configuration paths.
//!
//! - Linux: `~/.config/spectra/`
//! - macOS: `~/Library/Application Support/spectra/`
//! - Windows: `%APPDATA%\spectra\`

use std::path::PathBuf;

/// Application name used for directory paths.
const APP_NAME: &str = "spectra";

/// File name of the default configuration.
pub const CONFIG_FILE: &str = "spectra.toml";

/// Returns the user-specific configuration directory.
///
/// Returns a fallback path if the config directory cannot be determined.
pub fn user_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Returns the default configuration file path.
pub fn default_config_path() -> PathBuf {
    user_config_dir().join(CONFIG_FILE)
}

/// Returns the default directory for PSD dumps.
pub fn default_dump_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
        .join("dumps")
}
