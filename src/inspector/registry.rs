//! Windows registry backend.

use crate::catalog::Hive;
use crate::inspector::store::ConfigStore;
use tracing::debug;
use winreg::enums::{HKEY_CURRENT_USER, HKEY_LOCAL_MACHINE, KEY_READ, KEY_WOW64_64KEY};
use winreg::RegKey;

/// Reads the live registry through its 64-bit view.
#[derive(Debug, Default, Clone, Copy)]
pub struct RegistryStore;

impl RegistryStore {
    pub fn new() -> Self {
        Self
    }

    fn open(&self, hive: Hive, path: &str) -> Option<RegKey> {
        let root = match hive {
            Hive::Machine => RegKey::predef(HKEY_LOCAL_MACHINE),
            Hive::User => RegKey::predef(HKEY_CURRENT_USER),
        };
        match root.open_subkey_with_flags(path, KEY_READ | KEY_WOW64_64KEY) {
            Ok(key) => Some(key),
            Err(e) => {
                debug!("Registry key {}\\{} not readable: {}", hive, path, e);
                None
            }
        }
    }
}

impl ConfigStore for RegistryStore {
    fn key_exists(&self, hive: Hive, path: &str) -> bool {
        self.open(hive, path).is_some()
    }

    fn read_value(&self, hive: Hive, path: &str, name: &str) -> Option<String> {
        self.open(hive, path)?
            .get_value::<String, _>(name)
            .ok()
            .map(|v| v.trim().to_string())
    }

    fn subkeys(&self, hive: Hive, path: &str) -> Vec<String> {
        self.open(hive, path)
            .map(|key| key.enum_keys().filter_map(|k| k.ok()).collect())
            .unwrap_or_default()
    }
}
