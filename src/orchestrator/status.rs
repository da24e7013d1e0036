//! Per-key installation status.

use crate::inspector::Detection;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::RwLock;

/// Tri-state installed flag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallState {
    Installed,
    NotInstalled,
    /// Never checked.
    #[default]
    Unknown,
}

impl fmt::Display for InstallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            InstallState::Installed => "installed",
            InstallState::NotInstalled => "not installed",
            InstallState::Unknown => "unknown",
        })
    }
}

/// What is known about one catalog entry on this host.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstallationStatus {
    pub key: String,
    pub state: InstallState,
    pub version: Option<String>,
    pub last_checked: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl InstallationStatus {
    pub fn unknown(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            state: InstallState::Unknown,
            version: None,
            last_checked: None,
            last_error: None,
        }
    }

    pub fn is_installed(&self) -> bool {
        self.state == InstallState::Installed
    }

    /// Apply an inspector result. The version is kept only when installed.
    pub fn apply_detection(&mut self, detection: &Detection) {
        if detection.installed {
            self.state = InstallState::Installed;
            self.version = detection.version.clone();
        } else {
            self.state = InstallState::NotInstalled;
            self.version = None;
        }
        self.last_checked = Some(Utc::now());
    }

    /// Record a verified install.
    pub fn mark_installed(&mut self, version: Option<String>) {
        self.state = InstallState::Installed;
        self.version = version;
        self.last_error = None;
        self.last_checked = Some(Utc::now());
    }

    /// Record a verified removal.
    pub fn mark_removed(&mut self) {
        self.state = InstallState::NotInstalled;
        self.version = None;
        self.last_error = None;
        self.last_checked = Some(Utc::now());
    }

    pub fn mark_failed(&mut self, reason: impl Into<String>) {
        self.last_error = Some(reason.into());
    }
}

/// Status for every catalog key behind one lock.
///
/// Locks are held only for the duration of a read or a single update, never
/// across process execution.
#[derive(Debug, Default)]
pub struct StatusBoard {
    inner: RwLock<BTreeMap<String, InstallationStatus>>,
}

impl StatusBoard {
    /// Board with every key in the `Unknown` state.
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let map = keys
            .into_iter()
            .map(|k| {
                let key = k.into();
                (key.clone(), InstallationStatus::unknown(key))
            })
            .collect();
        Self {
            inner: RwLock::new(map),
        }
    }

    pub fn get(&self, key: &str) -> Option<InstallationStatus> {
        self.inner.read().ok()?.get(key).cloned()
    }

    /// All statuses, ordered by key.
    pub fn snapshot(&self) -> Vec<InstallationStatus> {
        self.inner
            .read()
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Mutate the status for `key`, creating it if needed, and return the
    /// updated copy.
    pub fn update<F>(&self, key: &str, f: F) -> InstallationStatus
    where
        F: FnOnce(&mut InstallationStatus),
    {
        let mut map = self.inner.write().unwrap_or_else(|p| p.into_inner());
        let status = map
            .entry(key.to_string())
            .or_insert_with(|| InstallationStatus::unknown(key));
        f(status);
        status.clone()
    }
}
