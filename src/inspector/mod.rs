//! Installed-state inspection.
//!
//! An [`Inspector`] evaluates a definition's detection rules, in order,
//! against a [`ConfigStore`]. The first satisfied rule decides; missing keys
//! or values only make a rule fail, they are never errors.
//!
//! # Backends
//!
//! - [`MemoryStore`] - in-memory tree, also loadable from a YAML snapshot
//! - [`RegistryStore`] - the live Windows registry (Windows only)

#[cfg(windows)]
pub mod registry;
pub mod store;
pub mod uninstall;

#[cfg(windows)]
pub use registry::RegistryStore;
pub use store::{ConfigStore, MemoryStore, UNINSTALL_KEY, UNINSTALL_KEY_WOW64};
pub use uninstall::{clean_uninstall_string, UninstallEntry};

use crate::catalog::{DetectionRule, SoftwareDefinition};
use regex::{Regex, RegexBuilder};
use serde::Serialize;
use std::path::Path;
use std::sync::{Arc, LazyLock};
use tracing::{debug, warn};

static ENV_VAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"%([A-Za-z_][A-Za-z0-9_()]*)%|\$\{([A-Za-z_][A-Za-z0-9_]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)")
        .expect("ENV_VAR must compile")
});

/// Outcome of evaluating a rule set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Detection {
    pub installed: bool,
    pub version: Option<String>,
}

impl Detection {
    pub fn absent() -> Self {
        Self::default()
    }

    pub fn present(version: Option<String>) -> Self {
        Self {
            installed: true,
            version,
        }
    }
}

/// Evaluates detection rules against a configuration store.
#[derive(Clone)]
pub struct Inspector {
    store: Arc<dyn ConfigStore>,
}

impl Inspector {
    pub fn new(store: Arc<dyn ConfigStore>) -> Self {
        Self { store }
    }

    /// Inspector over the host's native store: the registry on Windows,
    /// an empty in-memory store elsewhere.
    pub fn native() -> Self {
        #[cfg(windows)]
        let store: Arc<dyn ConfigStore> = Arc::new(RegistryStore::new());
        #[cfg(not(windows))]
        let store: Arc<dyn ConfigStore> = Arc::new(MemoryStore::new());
        Self::new(store)
    }

    pub fn store(&self) -> &dyn ConfigStore {
        self.store.as_ref()
    }

    /// Evaluate a definition's detection rules.
    pub fn evaluate(&self, def: &SoftwareDefinition) -> Detection {
        let detection = self.evaluate_rules(&def.detection);
        debug!(
            key = %def.key,
            installed = detection.installed,
            version = ?detection.version,
            "Evaluated detection rules"
        );
        detection
    }

    /// Evaluate rules in order; the first satisfied rule short-circuits.
    pub fn evaluate_rules(&self, rules: &[DetectionRule]) -> Detection {
        rules
            .iter()
            .find_map(|rule| self.evaluate_rule(rule))
            .unwrap_or_default()
    }

    /// Authoritative presence check for an installer package product code.
    pub fn product_installed(&self, code: &str) -> bool {
        self.store.product_installed(code)
    }

    /// Best-effort reverse lookup of an uninstall entry.
    pub fn find_uninstall_entry(
        &self,
        name_hint: &str,
        directory_hint: Option<&Path>,
    ) -> Option<UninstallEntry> {
        uninstall::find_uninstall_entry(self.store.as_ref(), name_hint, directory_hint)
    }

    /// `Some` when the rule establishes presence.
    fn evaluate_rule(&self, rule: &DetectionRule) -> Option<Detection> {
        let store = self.store.as_ref();
        match rule {
            DetectionRule::Exists {
                hive,
                path,
                version_value,
            } => {
                if !store.key_exists(*hive, path) {
                    debug!("exists: {}\\{} not found", hive, path);
                    return None;
                }
                let version = version_value
                    .as_deref()
                    .and_then(|name| store.read_value(*hive, path, name));
                Some(Detection::present(version))
            }
            DetectionRule::EnumerateMatch {
                hive,
                path,
                match_value,
                pattern,
                version_value,
            } => {
                let regex = match anchored(pattern) {
                    Ok(regex) => regex,
                    Err(e) => {
                        warn!("Invalid detection pattern '{}': {}", pattern, e);
                        return None;
                    }
                };
                store.subkeys(*hive, path).into_iter().find_map(|sub| {
                    let child = format!(r"{path}\{sub}");
                    let value = store.read_value(*hive, &child, match_value)?;
                    if !regex.is_match(&value) {
                        return None;
                    }
                    debug!("enumerate_match: '{}' matched in {}", value, child);
                    let version = version_value
                        .as_deref()
                        .and_then(|name| store.read_value(*hive, &child, name));
                    Some(Detection::present(version))
                })
            }
            DetectionRule::ReadValue { hive, path, value } => store
                .read_value(*hive, path, value)
                .map(|v| Detection::present(Some(v))),
            DetectionRule::Path { paths } => paths
                .iter()
                .map(|p| expand_env(p))
                .find(|p| Path::new(p).exists())
                .map(|p| {
                    debug!("path: {} exists", p);
                    Detection::present(None)
                }),
            DetectionRule::ProductCode { code } => {
                self.product_installed(code).then(|| Detection::present(None))
            }
        }
    }
}

/// Case-insensitive pattern anchored at the start of the value.
fn anchored(pattern: &str) -> std::result::Result<Regex, regex::Error> {
    RegexBuilder::new(&format!("^(?:{pattern})"))
        .case_insensitive(true)
        .build()
}

/// Expand `%VAR%`, `${VAR}` and `$VAR`; unknown variables are left as written.
pub fn expand_env(input: &str) -> String {
    ENV_VAR
        .replace_all(input, |caps: &regex::Captures<'_>| {
            let name = caps
                .get(1)
                .or_else(|| caps.get(2))
                .or_else(|| caps.get(3))
                .map(|m| m.as_str())
                .unwrap_or_default();
            std::env::var(name).unwrap_or_else(|_| caps[0].to_string())
        })
        .into_owned()
}
