//! Installation ledger.
//!
//! A durable record of installs performed by this tool, keyed by catalog
//! key. Uninstall reads it first to find the exact uninstall command.
//!
//! The file is JSON and is always replaced whole: the new content is
//! written to a sibling temp file and renamed over the target. A file that
//! fails to parse is moved aside with a `.corrupt` suffix and the ledger
//! starts empty. A file that cannot be read at all is left alone and the
//! session runs on an in-memory ledger.

use crate::error::{Result, ScoutError};
use crate::metadata::ArtifactKind;
use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// One verified installation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Catalog key.
    #[serde(alias = "program_key")]
    pub key: String,

    /// Display name at install time.
    pub name: String,

    /// When the install was verified. Older ledgers store local time
    /// without an offset.
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub timestamp: DateTime<Utc>,

    pub installer_path: PathBuf,

    pub installer_type: ArtifactKind,

    /// Command that removes the program, when one could be resolved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uninstall_string: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install_location: Option<String>,

    /// Version reported by the system after install.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installer_product_version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installer_file_version: Option<String>,

    /// Installer package product code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_code: Option<String>,
}

/// Key to entry map with optional file backing.
#[derive(Debug, Default)]
pub struct Ledger {
    path: Option<PathBuf>,
    entries: BTreeMap<String, LedgerEntry>,
}

impl Ledger {
    /// Default ledger location under the per-user data directory.
    pub fn default_path() -> Option<PathBuf> {
        dirs::data_dir().map(|d| d.join("installscout").join("install_ledger.json"))
    }

    /// A ledger that is never written to disk.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Open the ledger at `path`.
    ///
    /// Never fails: a missing file is an empty ledger and a corrupt file is
    /// moved aside. An unreadable file or an uncreatable directory degrades
    /// to an in-memory ledger.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();

        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            if let Err(e) = fs::create_dir_all(dir) {
                error!(
                    "Cannot create ledger directory {}: {}. Installs will NOT be remembered after exit.",
                    dir.display(),
                    e
                );
                return Self::in_memory();
            }
        }

        let entries = match load_entries(&path) {
            Ok(entries) => entries,
            Err(LoadError::Corrupt(e)) => {
                warn!("{}", e);
                set_aside(&path);
                BTreeMap::new()
            }
            Err(LoadError::Unreadable(e)) => {
                error!(
                    "Cannot read ledger {}: {}. Installs will NOT be remembered after exit.",
                    path.display(),
                    e
                );
                return Self::in_memory();
            }
        };
        info!(
            "Loaded {} ledger entries from {}",
            entries.len(),
            path.display()
        );

        Self {
            path: Some(path),
            entries,
        }
    }

    /// Backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_persistent(&self) -> bool {
        self.path.is_some()
    }

    pub fn get(&self, key: &str) -> Option<&LedgerEntry> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Entries ordered by key.
    pub fn entries(&self) -> impl Iterator<Item = &LedgerEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert or replace an entry and persist.
    ///
    /// The in-memory entry is kept even if the save fails; the next save
    /// writes it.
    pub fn record(&mut self, entry: LedgerEntry) -> Result<()> {
        info!("Recording ledger entry for '{}'", entry.key);
        self.entries.insert(entry.key.clone(), entry);
        self.save()
    }

    /// Remove an entry and persist. Returns the removed entry.
    pub fn remove(&mut self, key: &str) -> Result<Option<LedgerEntry>> {
        let removed = self.entries.remove(key);
        if removed.is_some() {
            info!("Removed ledger entry for '{}'", key);
            self.save()?;
        }
        Ok(removed)
    }

    /// Write the whole ledger atomically. A no-op for in-memory ledgers.
    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            debug!("In-memory ledger, skipping save");
            return Ok(());
        };
        let ledger_err = |message: String| ScoutError::Ledger {
            path: path.clone(),
            message,
        };

        let content = serde_json::to_string_pretty(&self.entries)
            .map_err(|e| ledger_err(format!("Failed to serialize ledger: {e}")))?;

        let temp_path = sibling(path, "tmp");
        fs::write(&temp_path, content).map_err(|e| ledger_err(e.to_string()))?;
        if let Err(e) = fs::rename(&temp_path, path) {
            let _ = fs::remove_file(&temp_path);
            return Err(ledger_err(e.to_string()));
        }
        debug!("Saved {} ledger entries", self.entries.len());
        Ok(())
    }
}

/// Why an existing ledger file could not be loaded.
enum LoadError {
    /// The file could not be read; its content is unknown.
    Unreadable(std::io::Error),
    /// The file was read but is not a ledger.
    Corrupt(ScoutError),
}

fn load_entries(path: &Path) -> std::result::Result<BTreeMap<String, LedgerEntry>, LoadError> {
    if !path.exists() {
        return Ok(BTreeMap::new());
    }
    let content = fs::read_to_string(path).map_err(LoadError::Unreadable)?;
    if content.trim().is_empty() {
        return Ok(BTreeMap::new());
    }
    serde_json::from_str(&content).map_err(|e| {
        LoadError::Corrupt(ScoutError::Ledger {
            path: path.to_path_buf(),
            message: format!("unreadable ledger: {e}"),
        })
    })
}

/// Accept RFC 3339 timestamps and offset-less local ones.
fn deserialize_timestamp<'de, D>(deserializer: D) -> std::result::Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Stamp {
        Zoned(DateTime<Utc>),
        Naive(NaiveDateTime),
    }

    Ok(match Stamp::deserialize(deserializer)? {
        Stamp::Zoned(stamp) => stamp,
        Stamp::Naive(naive) => Local
            .from_local_datetime(&naive)
            .earliest()
            .map(|local| local.with_timezone(&Utc))
            .unwrap_or_else(|| naive.and_utc()),
    })
}

/// Move a bad ledger file out of the way.
fn set_aside(path: &Path) {
    let target = sibling(path, "corrupt");
    match fs::rename(path, &target) {
        Ok(()) => warn!("Moved unreadable ledger to {}", target.display()),
        Err(e) => warn!("Could not move unreadable ledger aside: {}", e),
    }
}

/// `path` with an extra suffix appended to its file name.
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}
