//! Configuration module for HDR Gamma Fix.
//!
//! This module provides functionality for managing application configuration,
//! including:
//! - Names of the calibration tool, curve file and fallback scripts
//! - Global hotkey chords
//! - Debounce and process timeouts
//! - Persisting configuration to disk as JSON
//! - Determining the appropriate data directory for the application
//!
//! The configuration is automatically saved to and loaded from a `config.json`
//! file located in the platform-specific application data directory
//! (%APPDATA%/HDRGammaFix/ on Windows).
//!
//! User preferences that change at runtime (monitor selection, notification
//! toggle) are not stored here; see the `settings` module.
//!
//! # Example
//!
//! ```no_run
//! use hdr_gamma_fix_core::config::{load_config, save_config};
//!
//! // Load existing config or get defaults
//! let mut config = load_config();
//!
//! // Modify config
//! config.apply_hotkey = "Ctrl+Alt+G".to_string();
//!
//! // Save changes
//! save_config(&config).expect("Failed to save config");
//! ```

use anyhow::{anyhow, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name used for the data directory and the registry key
pub const APP_NAME: &str = "HDRGammaFix";

const CONFIG_FILE: &str = "config.json";

/// Application configuration
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct AppConfig {
    /// File name of the calibration executable
    pub calibration_tool: String,
    /// Curve file loaded when applying the corrected profile
    pub calibration_file: String,
    /// Legacy script run when the tool is missing (apply)
    pub apply_script: String,
    /// Legacy script run when the tool is missing (revert)
    pub revert_script: String,
    /// Chord that switches to the corrected profile
    pub apply_hotkey: String,
    /// Chord that switches back to the default profile
    pub revert_hotkey: String,
    pub notification_delay_ms: u64,
    pub tool_timeout_secs: u64,
    pub discovery_timeout_secs: u64,
    /// Try to apply the corrected profile as soon as the tray starts
    pub apply_on_startup: bool,
    pub debug_logging: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            calibration_tool: "dispwin.exe".to_string(),
            calibration_file: "lut.cal".to_string(),
            apply_script: "srgb-to-gamma.bat".to_string(),
            revert_script: "revert.bat".to_string(),
            apply_hotkey: "Alt+F1".to_string(),
            revert_hotkey: "Alt+F2".to_string(),
            notification_delay_ms: 500,
            tool_timeout_secs: 10,
            discovery_timeout_secs: 5,
            apply_on_startup: true,
            debug_logging: false,
        }
    }
}

impl AppConfig {
    pub fn notification_delay(&self) -> Duration {
        Duration::from_millis(self.notification_delay_ms)
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }

    pub fn discovery_timeout(&self) -> Duration {
        Duration::from_secs(self.discovery_timeout_secs)
    }
}

/// Get the application's data directory
/// Returns %APPDATA%/HDRGammaFix/ on Windows
/// Creates directory if it doesn't exist
pub fn get_data_directory() -> Result<PathBuf> {
    let project_dirs = ProjectDirs::from("", "", APP_NAME)
        .ok_or_else(|| anyhow!("Failed to determine user data directory"))?;

    let data_dir = project_dirs.data_dir();

    fs::create_dir_all(data_dir)
        .map_err(|e| anyhow!("Failed to create data directory: {}", e))?;

    Ok(data_dir.to_path_buf())
}

/// Full path of config.json in the data directory
pub fn config_path() -> Result<PathBuf> {
    Ok(get_data_directory()?.join(CONFIG_FILE))
}

/// Load application configuration from config.json
/// Returns default config if file doesn't exist or on error
pub fn load_config() -> AppConfig {
    let Ok(path) = config_path() else {
        return AppConfig::default();
    };

    load_config_from(&path)
}

/// Load configuration from an explicit path, defaulting on any error
pub fn load_config_from(path: &Path) -> AppConfig {
    if !path.exists() {
        return AppConfig::default();
    }

    let Ok(contents) = fs::read_to_string(path) else {
        return AppConfig::default();
    };

    match serde_json::from_str(&contents) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!("Ignoring malformed {}: {}", path.display(), e);
            AppConfig::default()
        }
    }
}

/// Save application configuration to config.json
pub fn save_config(config: &AppConfig) -> Result<()> {
    save_config_to(config, &config_path()?)
}

pub fn save_config_to(config: &AppConfig, path: &Path) -> Result<()> {
    // Serialize to pretty-printed JSON
    let json = serde_json::to_string_pretty(config)
        .map_err(|e| anyhow!("Failed to serialize config: {}", e))?;

    fs::write(path, json)
        .map_err(|e| anyhow!("Failed to write {}: {}", path.display(), e))?;

    Ok(())
}
