//! Centralized application directory paths for chatvox.
//!
//! Uses the [`dirs`] crate for platform-appropriate directory resolution.
//!
//! # Directory Layout
//!
//! | Purpose | macOS | Linux |
//! |---------|-------|-------|
//! | App data | `~/Library/Application Support/chatvox/` | `~/.local/share/chatvox/` |
//! | Config | `~/Library/Application Support/chatvox/` | `~/.config/chatvox/` |
//!
//! # Environment Overrides
//!
//! - `CHATVOX_DATA_DIR` overrides [`data_dir`]
//! - `CHATVOX_CONFIG_DIR` overrides [`config_dir`]

use std::path::PathBuf;

/// Application data root directory.
///
/// Holds persisted voice profiles and log files.
#[must_use]
pub fn data_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("CHATVOX_DATA_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::data_dir()
        .map(|d| d.join("chatvox"))
        .unwrap_or_else(|| PathBuf::from("/tmp/chatvox-data"))
}

/// Application config directory.
#[must_use]
pub fn config_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("CHATVOX_CONFIG_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::config_dir()
        .map(|d| d.join("chatvox"))
        .unwrap_or_else(|| PathBuf::from("/tmp/chatvox-config"))
}

/// Log file directory (`data_dir()/logs/`).
#[must_use]
pub fn logs_dir() -> PathBuf {
    data_dir().join("logs")
}

/// Main config file path (`config_dir()/config.toml`).
#[must_use]
pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}

/// Voice profile store (`data_dir()/voice_profiles.json`).
#[must_use]
pub fn voice_profiles_file() -> PathBuf {
    data_dir().join("voice_profiles.json")
}
