//! User preferences that survive restarts
//!
//! [`SettingsStore`] is a plain key/value seam; the Windows runner backs it
//! with the registry, everything else with [`JsonSettingsStore`].
//! [`Preferences`] sits on top and never lets a store failure escape: reads
//! fall back to defaults and failed writes are logged and forgotten.

use crate::error::SettingsError;
use crate::monitor::MonitorSelection;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const SELECTED_MONITOR_KEY: &str = "SelectedMonitor";
pub const NOTIFICATIONS_ENABLED_KEY: &str = "NotificationsEnabled";

const SETTINGS_FILE: &str = "settings.json";

pub trait SettingsStore {
    /// `Ok(None)` when the key has never been written
    fn get_i32(&self, key: &str) -> Result<Option<i32>, SettingsError>;
    fn set_i32(&mut self, key: &str, value: i32) -> Result<(), SettingsError>;
    fn get_bool(&self, key: &str) -> Result<Option<bool>, SettingsError>;
    fn set_bool(&mut self, key: &str, value: bool) -> Result<(), SettingsError>;
}

/// Flat JSON object on disk, rewritten on every change
#[derive(Debug)]
pub struct JsonSettingsStore {
    path: PathBuf,
    values: Map<String, Value>,
}

impl JsonSettingsStore {
    /// Open `path`, starting empty if it is missing or unreadable
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let values = match Self::read(&path) {
            Ok(values) => values,
            Err(e) => {
                warn!("Starting with empty settings, {}: {}", path.display(), e);
                Map::new()
            }
        };
        Self { path, values }
    }

    /// `settings.json` in the application data directory
    pub fn in_data_dir() -> anyhow::Result<Self> {
        let dir = crate::config::get_data_directory()?;
        Ok(Self::open(dir.join(SETTINGS_FILE)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(path: &Path) -> Result<Map<String, Value>, SettingsError> {
        if !path.exists() {
            return Ok(Map::new());
        }
        let contents = fs::read_to_string(path)?;
        match serde_json::from_str::<Value>(&contents)? {
            Value::Object(values) => Ok(values),
            _ => Err(SettingsError::Unavailable(
                "settings file is not a JSON object".to_string(),
            )),
        }
    }

    fn persist(&self) -> Result<(), SettingsError> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_string_pretty(&self.values)?;
        fs::write(&self.path, json)?;
        Ok(())
    }
}

impl SettingsStore for JsonSettingsStore {
    fn get_i32(&self, key: &str) -> Result<Option<i32>, SettingsError> {
        match self.values.get(key) {
            None => Ok(None),
            Some(value) => value
                .as_i64()
                .and_then(|n| i32::try_from(n).ok())
                .map(Some)
                .ok_or_else(|| SettingsError::InvalidValue { key: key.to_string() }),
        }
    }

    fn set_i32(&mut self, key: &str, value: i32) -> Result<(), SettingsError> {
        self.values.insert(key.to_string(), Value::from(value));
        self.persist()
    }

    fn get_bool(&self, key: &str) -> Result<Option<bool>, SettingsError> {
        match self.values.get(key) {
            None => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(_) => Err(SettingsError::InvalidValue { key: key.to_string() }),
        }
    }

    fn set_bool(&mut self, key: &str, value: bool) -> Result<(), SettingsError> {
        self.values.insert(key.to_string(), Value::Bool(value));
        self.persist()
    }
}

/// Typed access to the stored preferences with their defaults applied
pub struct Preferences {
    store: Box<dyn SettingsStore>,
}

impl Preferences {
    pub fn new(store: Box<dyn SettingsStore>) -> Self {
        Self { store }
    }

    /// Defaults to all monitors
    pub fn selection(&self) -> MonitorSelection {
        match self.store.get_i32(SELECTED_MONITOR_KEY) {
            Ok(Some(raw)) => MonitorSelection::from_raw(raw),
            Ok(None) => MonitorSelection::All,
            Err(e) => {
                warn!("Could not read {}: {}", SELECTED_MONITOR_KEY, e);
                MonitorSelection::All
            }
        }
    }

    pub fn set_selection(&mut self, selection: MonitorSelection) {
        match self.store.set_i32(SELECTED_MONITOR_KEY, selection.to_raw()) {
            Ok(()) => debug!("Saved monitor selection: {}", selection),
            Err(e) => warn!("Could not save {}: {}", SELECTED_MONITOR_KEY, e),
        }
    }

    /// Defaults to enabled
    pub fn notifications_enabled(&self) -> bool {
        match self.store.get_bool(NOTIFICATIONS_ENABLED_KEY) {
            Ok(Some(enabled)) => enabled,
            Ok(None) => true,
            Err(e) => {
                warn!("Could not read {}: {}", NOTIFICATIONS_ENABLED_KEY, e);
                true
            }
        }
    }

    pub fn set_notifications_enabled(&mut self, enabled: bool) {
        match self.store.set_bool(NOTIFICATIONS_ENABLED_KEY, enabled) {
            Ok(()) => debug!("Saved notifications enabled: {}", enabled),
            Err(e) => warn!("Could not save {}: {}", NOTIFICATIONS_ENABLED_KEY, e),
        }
    }
}

/// What a startup toggle actually changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupChange {
    Enabled,
    Disabled,
    /// Disabling something that was never registered
    Unchanged,
}

/// "Run at login" registration, kept apart from the preference keys
pub trait StartupRegistration {
    fn is_enabled(&self) -> bool;
    fn set_enabled(&mut self, enabled: bool) -> Result<StartupChange, SettingsError>;
}

/// For hosts where login registration is not supported
#[derive(Debug, Default)]
pub struct NoStartupRegistration;

impl StartupRegistration for NoStartupRegistration {
    fn is_enabled(&self) -> bool {
        false
    }

    fn set_enabled(&mut self, _enabled: bool) -> Result<StartupChange, SettingsError> {
        Err(SettingsError::Unavailable(
            "run at login is not supported on this platform".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemorySettingsStore;

    #[test]
    fn test_json_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        let mut store = JsonSettingsStore::open(&path);
        assert_eq!(store.get_i32(SELECTED_MONITOR_KEY).unwrap(), None);
        store.set_i32(SELECTED_MONITOR_KEY, -1).unwrap();
        store.set_bool(NOTIFICATIONS_ENABLED_KEY, false).unwrap();

        let reopened = JsonSettingsStore::open(&path);
        assert_eq!(reopened.get_i32(SELECTED_MONITOR_KEY).unwrap(), Some(-1));
        assert_eq!(reopened.get_bool(NOTIFICATIONS_ENABLED_KEY).unwrap(), Some(false));
    }

    #[test]
    fn test_json_store_wrong_type() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{ "SelectedMonitor": "two", "NotificationsEnabled": 1 }"#).unwrap();

        let store = JsonSettingsStore::open(&path);
        assert!(matches!(
            store.get_i32(SELECTED_MONITOR_KEY),
            Err(SettingsError::InvalidValue { .. })
        ));
        assert!(store.get_bool(NOTIFICATIONS_ENABLED_KEY).is_err());
    }

    #[test]
    fn test_json_store_corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "[1, 2").unwrap();

        let store = JsonSettingsStore::open(&path);
        assert_eq!(store.get_bool(NOTIFICATIONS_ENABLED_KEY).unwrap(), None);
    }

    #[test]
    fn test_preferences_defaults() {
        let prefs = Preferences::new(Box::new(MemorySettingsStore::default()));
        assert_eq!(prefs.selection(), MonitorSelection::All);
        assert!(prefs.notifications_enabled());
    }

    #[test]
    fn test_preferences_tolerate_broken_store() {
        let mut prefs = Preferences::new(Box::new(MemorySettingsStore::broken()));
        assert_eq!(prefs.selection(), MonitorSelection::All);
        assert!(prefs.notifications_enabled());

        // Writes fail silently
        prefs.set_selection(MonitorSelection::Display(2));
        prefs.set_notifications_enabled(false);
    }

    #[test]
    fn test_preferences_persist() {
        let store = MemorySettingsStore::default();
        let mut prefs = Preferences::new(Box::new(store.clone()));

        prefs.set_selection(MonitorSelection::Display(2));
        prefs.set_notifications_enabled(false);

        assert_eq!(store.get_i32(SELECTED_MONITOR_KEY).unwrap(), Some(2));
        assert_eq!(store.get_bool(NOTIFICATIONS_ENABLED_KEY).unwrap(), Some(false));
        assert_eq!(prefs.selection(), MonitorSelection::Display(2));
    }
}
