//! Configuration store backends.
//!
//! Detection rules are evaluated against a [`ConfigStore`]: a tree of
//! backslash-separated key paths, each holding named string values. Paths
//! and value names compare case-insensitively, as on the Windows registry.

use crate::catalog::Hive;
use crate::error::{Result, ScoutError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use std::sync::{Arc, RwLock};

/// Uninstall key of native programs.
pub const UNINSTALL_KEY: &str = r"SOFTWARE\Microsoft\Windows\CurrentVersion\Uninstall";
/// Uninstall key of 32-bit programs on 64-bit hosts.
pub const UNINSTALL_KEY_WOW64: &str =
    r"SOFTWARE\WOW6432Node\Microsoft\Windows\CurrentVersion\Uninstall";

/// Read-only view of a hierarchical configuration store.
pub trait ConfigStore: Send + Sync {
    /// Whether the key at `path` exists.
    fn key_exists(&self, hive: Hive, path: &str) -> bool;

    /// A string value, or `None` if the key or value is missing.
    fn read_value(&self, hive: Hive, path: &str, name: &str) -> Option<String>;

    /// Names of the direct child keys of `path`. Missing keys have none.
    fn subkeys(&self, hive: Hive, path: &str) -> Vec<String>;

    /// Whether an installer package with this product code is registered.
    fn product_installed(&self, code: &str) -> bool {
        let code = code.trim();
        !code.is_empty()
            && [UNINSTALL_KEY, UNINSTALL_KEY_WOW64]
                .iter()
                .any(|base| self.key_exists(Hive::Machine, &format!(r"{base}\{code}")))
    }
}

#[derive(Debug, Default, Clone)]
struct StoredKey {
    /// Path with its original casing.
    path: String,
    /// Lower-cased value name to `(name, value)`.
    values: BTreeMap<String, (String, String)>,
}

type KeyMap = HashMap<(Hive, String), StoredKey>;

/// In-memory store, shareable across threads.
///
/// Clones share the same data, so a test can hand one clone to the engine and
/// mutate another to simulate an installer changing the system.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    keys: Arc<RwLock<KeyMap>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a key and all its ancestors.
    pub fn insert_key(&self, hive: Hive, path: &str) {
        let mut keys = self.write();
        let parts: Vec<&str> = split(path).collect();
        for depth in 1..=parts.len() {
            let partial = parts[..depth].join("\\");
            keys.entry((hive, partial.to_lowercase()))
                .or_insert_with(|| StoredKey {
                    path: partial,
                    values: BTreeMap::new(),
                });
        }
    }

    /// Set a value, creating the key if needed.
    pub fn set_value(&self, hive: Hive, path: &str, name: &str, value: &str) {
        self.insert_key(hive, path);
        let mut keys = self.write();
        if let Some(key) = keys.get_mut(&(hive, normalize(path))) {
            key.values
                .insert(name.to_lowercase(), (name.to_string(), value.to_string()));
        }
    }

    /// Remove a key and everything below it.
    pub fn remove_key(&self, hive: Hive, path: &str) {
        let target = normalize(path);
        let prefix = format!("{target}\\");
        self.write()
            .retain(|(h, p), _| !(*h == hive && (*p == target || p.starts_with(&prefix))));
    }

    /// Load a YAML snapshot.
    ///
    /// ```yaml
    /// HKLM:
    ///   'SOFTWARE\Vendor\Widget':
    ///     Version: "4.1"
    /// HKCU: {}
    /// ```
    pub fn from_snapshot_str(content: &str) -> Result<Self> {
        let snapshot: Snapshot =
            serde_yaml::from_str(content).map_err(|e| ScoutError::ConfigError {
                message: format!("invalid store snapshot: {e}"),
            })?;
        let store = Self::new();
        for (hive, keys) in [(Hive::Machine, snapshot.machine), (Hive::User, snapshot.user)] {
            for (path, values) in keys {
                store.insert_key(hive, &path);
                for (name, value) in values {
                    store.set_value(hive, &path, &name, &value);
                }
            }
        }
        Ok(store)
    }

    /// Load a YAML snapshot file.
    pub fn load_snapshot(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| ScoutError::ConfigError {
            message: format!("cannot read store snapshot {}: {e}", path.display()),
        })?;
        Self::from_snapshot_str(&content)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, KeyMap> {
        self.keys.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, KeyMap> {
        self.keys
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ConfigStore for MemoryStore {
    fn key_exists(&self, hive: Hive, path: &str) -> bool {
        self.read().contains_key(&(hive, normalize(path)))
    }

    fn read_value(&self, hive: Hive, path: &str, name: &str) -> Option<String> {
        self.read()
            .get(&(hive, normalize(path)))
            .and_then(|key| key.values.get(&name.to_lowercase()))
            .map(|(_, value)| value.clone())
    }

    fn subkeys(&self, hive: Hive, path: &str) -> Vec<String> {
        let parent = normalize(path);
        let prefix = format!("{parent}\\");
        let mut children: Vec<String> = self
            .read()
            .iter()
            .filter(|((h, p), _)| *h == hive && p.starts_with(&prefix))
            .filter(|((_, p), _)| !p[prefix.len()..].contains('\\'))
            .filter_map(|(_, key)| key.path.rsplit('\\').next().map(str::to_string))
            .collect();
        children.sort_by_key(|c| c.to_lowercase());
        children
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    #[serde(default, rename = "HKLM")]
    machine: BTreeMap<String, BTreeMap<String, String>>,
    #[serde(default, rename = "HKCU")]
    user: BTreeMap<String, BTreeMap<String, String>>,
}

fn split(path: &str) -> impl Iterator<Item = &str> {
    path.split(['\\', '/']).filter(|p| !p.is_empty())
}

/// Lower-cased canonical key path.
fn normalize(path: &str) -> String {
    split(path).collect::<Vec<_>>().join("\\").to_lowercase()
}
