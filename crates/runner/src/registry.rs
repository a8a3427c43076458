//! Registry-backed preferences and login registration

use hdr_gamma_fix_core::config::APP_NAME;
use hdr_gamma_fix_core::error::SettingsError;
use hdr_gamma_fix_core::settings::{SettingsStore, StartupChange, StartupRegistration};
use std::io;
use winreg::enums::*;
use winreg::RegKey;

const RUN_KEY: &str = "Software\\Microsoft\\Windows\\CurrentVersion\\Run";

/// DWORD values under `HKCU\SOFTWARE\HDRGammaFix`
pub struct RegistrySettingsStore {
    key_path: String,
}

impl RegistrySettingsStore {
    /// Create the key if needed so later writes cannot fail on a missing parent
    pub fn open() -> Result<Self, SettingsError> {
        let key_path = format!("SOFTWARE\\{}", APP_NAME);
        RegKey::predef(HKEY_CURRENT_USER).create_subkey(&key_path)?;
        Ok(Self { key_path })
    }

    fn read_dword(&self, name: &str) -> Result<Option<u32>, SettingsError> {
        let key = match RegKey::predef(HKEY_CURRENT_USER).open_subkey(&self.key_path) {
            Ok(key) => key,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match key.get_value::<u32, _>(name) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(_) => Err(SettingsError::InvalidValue { key: name.to_string() }),
        }
    }

    fn write_dword(&self, name: &str, value: u32) -> Result<(), SettingsError> {
        let (key, _) = RegKey::predef(HKEY_CURRENT_USER).create_subkey(&self.key_path)?;
        key.set_value(name, &value)?;
        Ok(())
    }
}

impl SettingsStore for RegistrySettingsStore {
    fn get_i32(&self, key: &str) -> Result<Option<i32>, SettingsError> {
        Ok(self.read_dword(key)?.map(|v| v as i32))
    }

    fn set_i32(&mut self, key: &str, value: i32) -> Result<(), SettingsError> {
        self.write_dword(key, value as u32)
    }

    fn get_bool(&self, key: &str) -> Result<Option<bool>, SettingsError> {
        Ok(self.read_dword(key)?.map(|v| v != 0))
    }

    fn set_bool(&mut self, key: &str, value: bool) -> Result<(), SettingsError> {
        self.write_dword(key, u32::from(value))
    }
}

/// `HDRGammaFix` value under the per-user Run key
pub struct RunKeyStartup {
    command: String,
}

impl RunKeyStartup {
    pub fn for_current_exe() -> io::Result<Self> {
        let exe = std::env::current_exe()?;
        Ok(Self {
            command: format!("\"{}\"", exe.display()),
        })
    }
}

impl StartupRegistration for RunKeyStartup {
    fn is_enabled(&self) -> bool {
        let hkcu = RegKey::predef(HKEY_CURRENT_USER);
        match hkcu.open_subkey(RUN_KEY) {
            Ok(key) => key.get_value::<String, _>(APP_NAME).is_ok(),
            Err(_) => false,
        }
    }

    fn set_enabled(&mut self, enabled: bool) -> Result<StartupChange, SettingsError> {
        let hkcu = RegKey::predef(HKEY_CURRENT_USER);
        let key = hkcu.open_subkey_with_flags(RUN_KEY, KEY_SET_VALUE | KEY_QUERY_VALUE)?;

        if enabled {
            key.set_value(APP_NAME, &self.command)?;
            tracing::info!("Run at startup enabled: {}", self.command);
            return Ok(StartupChange::Enabled);
        }

        match key.delete_value(APP_NAME) {
            Ok(()) => {
                tracing::info!("Run at startup disabled");
                Ok(StartupChange::Disabled)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(StartupChange::Unchanged),
            Err(e) => Err(e.into()),
        }
    }
}
