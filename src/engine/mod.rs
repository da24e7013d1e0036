//! Shared engine state.
//!
//! The [`Engine`] owns everything a session needs: the catalog, the
//! inspector, the ledger, the status board and the most recent scan. It is
//! `Send + Sync` and meant to be shared behind an `Arc`; the
//! [`Coordinator`] runs its operations on background threads.
//!
//! # Concurrency rules
//!
//! - scan and status check are single-flight: a second request while one is
//!   running fails with [`ScoutError::TaskBusy`]
//! - install and uninstall hold a per-key lock for the whole command plus
//!   verification, so one key never has two actions in flight
//! - ledger writes are serialized behind one mutex

pub mod cancel;
pub mod coordinator;

pub use cancel::CancelToken;
pub use coordinator::{Coordinator, TaskEvent, TaskHandle, TaskKind, TaskResult};

use crate::catalog::Catalog;
use crate::error::{Result, ScoutError};
use crate::inspector::Inspector;
use crate::ledger::{Ledger, LedgerEntry};
use crate::matcher::{CatalogMatcher, MatchOutcome, UnidentifiedArtifact};
use crate::metadata::{MetadataProvider, NativeMetadataProvider};
use crate::orchestrator::{ActionOutcome, InstallMode, InstallationStatus, Orchestrator, StatusBoard, Timeouts};
use crate::scanner::{validate_root, DirectoryScanner, DiscoveredArtifact, ScanStats};
use crate::shell::{CommandRunner, SystemRunner};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, info};

/// Engine construction options.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// External process limits.
    pub timeouts: Timeouts,

    /// Ledger file; `None` keeps the ledger in memory only.
    pub ledger_path: Option<PathBuf>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            timeouts: Timeouts::default(),
            ledger_path: Ledger::default_path(),
        }
    }
}

/// Result of a scan and the matching pass that followed it.
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub root: PathBuf,
    pub stats: ScanStats,
    pub matches: MatchOutcome,
}

impl ScanReport {
    pub fn is_cancelled(&self) -> bool {
        self.stats.cancelled || self.matches.cancelled
    }

    /// The artifact matched to `key`, if any.
    pub fn artifact_for(&self, key: &str) -> Option<&DiscoveredArtifact> {
        self.matches.matches.get(key).map(|m| &m.artifact)
    }

    /// The unidentified artifact at `path`, if any.
    pub fn unidentified_at(&self, path: &Path) -> Option<&UnidentifiedArtifact> {
        self.matches
            .unidentified
            .iter()
            .find(|u| u.artifact.path == path)
    }
}

/// Marks a single-flight task as running until dropped.
#[derive(Debug)]
pub struct Flight {
    flag: Arc<AtomicBool>,
}

impl Flight {
    fn begin(flag: &Arc<AtomicBool>, task: &str) -> Result<Self> {
        if flag
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Rejecting {} request, one is already running", task);
            return Err(ScoutError::TaskBusy {
                task: task.to_string(),
            });
        }
        Ok(Self {
            flag: Arc::clone(flag),
        })
    }
}

impl Drop for Flight {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Deployment engine for one catalog.
pub struct Engine {
    catalog: Catalog,
    inspector: Inspector,
    runner: Arc<dyn CommandRunner>,
    metadata: Arc<dyn MetadataProvider>,
    timeouts: Timeouts,
    ledger: Mutex<Ledger>,
    statuses: StatusBoard,
    search_root: RwLock<Option<PathBuf>>,
    last_scan: RwLock<Option<ScanReport>>,
    scan_flight: Arc<AtomicBool>,
    status_flight: Arc<AtomicBool>,
    key_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl Engine {
    /// Build an engine from explicit collaborators.
    pub fn new(
        catalog: Catalog,
        inspector: Inspector,
        runner: Arc<dyn CommandRunner>,
        metadata: Arc<dyn MetadataProvider>,
        options: EngineOptions,
    ) -> Self {
        let ledger = match &options.ledger_path {
            Some(path) => Ledger::open(path),
            None => Ledger::in_memory(),
        };
        let statuses = StatusBoard::new(catalog.keys());
        info!(
            "Engine ready: {} catalog entries, {} ledger entries",
            catalog.len(),
            ledger.len()
        );
        Self {
            catalog,
            inspector,
            runner,
            metadata,
            timeouts: options.timeouts,
            ledger: Mutex::new(ledger),
            statuses,
            search_root: RwLock::new(None),
            last_scan: RwLock::new(None),
            scan_flight: Arc::new(AtomicBool::new(false)),
            status_flight: Arc::new(AtomicBool::new(false)),
            key_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Engine over the host: native metadata readers and the platform shell.
    pub fn native(catalog: Catalog, inspector: Inspector, options: EngineOptions) -> Self {
        Self::new(
            catalog,
            inspector,
            Arc::new(SystemRunner),
            Arc::new(NativeMetadataProvider),
            options,
        )
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn inspector(&self) -> &Inspector {
        &self.inspector
    }

    /// Set the directory to scan. Previous scan results are discarded.
    pub fn set_search_root(&self, root: impl Into<PathBuf>) -> Result<()> {
        let root = root.into();
        validate_root(&root)?;
        info!("Search root set to {}", root.display());
        *write(&self.search_root) = Some(root);
        *write(&self.last_scan) = None;
        Ok(())
    }

    pub fn search_root(&self) -> Option<PathBuf> {
        read(&self.search_root).clone()
    }

    /// Most recent completed scan.
    pub fn last_scan(&self) -> Option<ScanReport> {
        read(&self.last_scan).clone()
    }

    /// Scan the search root and match the results against the catalog.
    ///
    /// # Errors
    ///
    /// - [`ScoutError::TaskBusy`] if a scan is already running
    /// - [`ScoutError::InvalidSearchPath`] if no usable root is set
    pub fn scan(&self, cancel: &CancelToken) -> Result<ScanReport> {
        let flight = self.begin_scan()?;
        self.run_scan(flight, cancel)
    }

    /// Re-check installed state for `keys`, or the whole catalog.
    ///
    /// Fails with [`ScoutError::TaskBusy`] if a check is already running.
    pub fn check_status(
        &self,
        keys: Option<&[String]>,
        cancel: &CancelToken,
    ) -> Result<Vec<InstallationStatus>> {
        let flight = self.begin_status()?;
        Ok(self.run_status(flight, keys, cancel))
    }

    pub fn status(&self, key: &str) -> Option<InstallationStatus> {
        self.statuses.get(key)
    }

    /// Status of every catalog key, ordered by key.
    pub fn statuses(&self) -> Vec<InstallationStatus> {
        self.statuses.snapshot()
    }

    /// Install `key` from the artifact the last scan matched to it.
    pub fn install(&self, key: &str, mode: InstallMode) -> Result<ActionOutcome> {
        self.with_key_lock(key, || {
            let artifact = self
                .last_scan()
                .and_then(|scan| scan.artifact_for(key).cloned());
            self.orchestrator().install(key, artifact.as_ref(), mode)
        })
    }

    /// Install an unidentified artifact from the last scan.
    pub fn install_unidentified(&self, path: &Path, mode: InstallMode) -> Result<ActionOutcome> {
        let key = path.to_string_lossy().into_owned();
        self.with_key_lock(&key, || {
            let artifact = self
                .last_scan()
                .and_then(|scan| scan.unidentified_at(path).map(|u| u.artifact.clone()))
                .ok_or_else(|| ScoutError::NoInstaller { key: key.clone() })?;
            self.orchestrator().install_unidentified(&artifact, mode)
        })
    }

    pub fn uninstall(&self, key: &str) -> Result<ActionOutcome> {
        self.with_key_lock(key, || self.orchestrator().uninstall(key))
    }

    /// Ledger contents, ordered by key.
    pub fn ledger_entries(&self) -> Vec<LedgerEntry> {
        self.ledger
            .lock()
            .map(|l| l.entries().cloned().collect())
            .unwrap_or_default()
    }

    pub fn ledger_path(&self) -> Option<PathBuf> {
        self.ledger
            .lock()
            .ok()
            .and_then(|l| l.path().map(Path::to_path_buf))
    }

    pub(crate) fn begin_scan(&self) -> Result<Flight> {
        Flight::begin(&self.scan_flight, "scan")
    }

    pub(crate) fn begin_status(&self) -> Result<Flight> {
        Flight::begin(&self.status_flight, "status check")
    }

    pub(crate) fn run_scan(&self, _flight: Flight, cancel: &CancelToken) -> Result<ScanReport> {
        let root = self.search_root().ok_or_else(|| ScoutError::InvalidSearchPath {
            path: PathBuf::new(),
        })?;

        let scanner = DirectoryScanner::new(self.catalog.settings(), self.metadata.as_ref());
        let scanned = scanner.scan(&root, cancel)?;

        let matches = if scanned.stats.cancelled {
            MatchOutcome {
                cancelled: true,
                ..Default::default()
            }
        } else {
            CatalogMatcher::new(&self.catalog).match_artifacts(&scanned.artifacts, cancel)
        };
        let report = ScanReport {
            root,
            stats: scanned.stats,
            matches,
        };

        if report.is_cancelled() {
            info!("Scan cancelled, keeping previous results");
        } else if self.search_root().as_deref() == Some(report.root.as_path()) {
            *write(&self.last_scan) = Some(report.clone());
        } else {
            info!("Search root changed during scan, discarding results");
        }
        Ok(report)
    }

    pub(crate) fn run_status(
        &self,
        _flight: Flight,
        keys: Option<&[String]>,
        cancel: &CancelToken,
    ) -> Vec<InstallationStatus> {
        self.orchestrator().check_status(keys, cancel)
    }

    fn orchestrator(&self) -> Orchestrator<'_> {
        Orchestrator::new(
            &self.catalog,
            &self.inspector,
            self.runner.as_ref(),
            &self.ledger,
            &self.statuses,
        )
        .with_timeouts(self.timeouts)
    }

    /// Run `action` holding the lock for `key`. The lock entry is dropped
    /// once no other operation holds or waits on it.
    fn with_key_lock<T>(&self, key: &str, action: impl FnOnce() -> T) -> T {
        let lock = {
            let mut locks = self.key_locks.lock().unwrap_or_else(|p| p.into_inner());
            Arc::clone(locks.entry(key.to_string()).or_default())
        };
        let result = {
            let _held = lock.lock().unwrap_or_else(|p| p.into_inner());
            action()
        };

        let mut locks = self.key_locks.lock().unwrap_or_else(|p| p.into_inner());
        drop(lock);
        if locks.get(key).is_some_and(|l| Arc::strong_count(l) == 1) {
            locks.remove(key);
        }
        result
    }
}

fn read<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|p| p.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|p| p.into_inner())
}
