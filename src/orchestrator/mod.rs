//! Install and uninstall orchestration.
//!
//! Every action follows the same shape: build a command line, run it with a
//! hard timeout, then ask the [`Inspector`] whether the system actually
//! changed. Only that independent check decides success. A process that
//! exits cleanly while the check disagrees is reported as
//! [`ScoutError::VerificationFailed`], distinct from a process failure.
//!
//! | Process result | Verification | Reported |
//! |----------------|--------------|----------|
//! | launch failure | skipped | [`ScoutError::ProcessLaunch`] |
//! | success | confirmed | [`ActionOutcome::Verified`] |
//! | success | not confirmed | [`ScoutError::VerificationFailed`] |
//! | bad exit code or timeout | confirmed | [`ActionOutcome::Verified`] |
//! | bad exit code or timeout | not confirmed | the process error |

pub mod commands;
pub mod status;

pub use commands::{
    add_silent_flags, build_install_command, build_uninstall_command, generic_template,
    package_product_code, InstallMode, UninstallCommand,
};
pub use status::{InstallState, InstallationStatus, StatusBoard};

use crate::catalog::{Catalog, SoftwareDefinition};
use crate::engine::CancelToken;
use crate::error::{Result, ScoutError};
use crate::inspector::{Detection, Inspector};
use crate::ledger::{Ledger, LedgerEntry};
use crate::metadata::{keys, ArtifactKind};
use crate::scanner::DiscoveredArtifact;
use crate::shell::CommandRunner;
use chrono::Utc;
use serde::Serialize;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default install timeout (15 minutes).
pub const DEFAULT_INSTALL_TIMEOUT: Duration = Duration::from_secs(900);

/// Default uninstall timeout (10 minutes).
pub const DEFAULT_UNINSTALL_TIMEOUT: Duration = Duration::from_secs(600);

/// Hard limits for external processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub install: Duration,
    pub uninstall: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            install: DEFAULT_INSTALL_TIMEOUT,
            uninstall: DEFAULT_UNINSTALL_TIMEOUT,
        }
    }
}

/// A successful action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ActionOutcome {
    /// The independent check confirmed the change.
    Verified { version: Option<String> },
    /// Nothing to do; the software was already installed.
    AlreadyInstalled { version: Option<String> },
    /// The process succeeded but there is nothing to verify against.
    Unverified,
}

/// Runs actions against shared engine state.
///
/// The orchestrator borrows everything it touches; the caller owns the
/// state and is responsible for per-key serialization.
pub struct Orchestrator<'a> {
    catalog: &'a Catalog,
    inspector: &'a Inspector,
    runner: &'a dyn CommandRunner,
    ledger: &'a Mutex<Ledger>,
    statuses: &'a StatusBoard,
    timeouts: Timeouts,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        catalog: &'a Catalog,
        inspector: &'a Inspector,
        runner: &'a dyn CommandRunner,
        ledger: &'a Mutex<Ledger>,
        statuses: &'a StatusBoard,
    ) -> Self {
        Self {
            catalog,
            inspector,
            runner,
            ledger,
            statuses,
            timeouts: Timeouts::default(),
        }
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Install catalog entry `key` from its matched artifact.
    ///
    /// # Errors
    ///
    /// - [`ScoutError::UnknownSoftware`] if `key` is not in the catalog
    /// - [`ScoutError::NoInstaller`] if no artifact was matched
    /// - [`ScoutError::ConfigError`] if no template exists for the artifact type
    /// - [`ScoutError::ProcessLaunch`] if the installer could not be started
    /// - [`ScoutError::VerificationFailed`] if the installer exited cleanly but
    ///   the software is not detected
    /// - [`ScoutError::ProcessFailed`] / [`ScoutError::ProcessTimeout`] if the
    ///   installer failed and the software is not detected
    pub fn install(
        &self,
        key: &str,
        artifact: Option<&DiscoveredArtifact>,
        mode: InstallMode,
    ) -> Result<ActionOutcome> {
        let def = self.definition(key)?;
        let Some(artifact) = artifact else {
            return self.fail(key, ScoutError::NoInstaller {
                key: key.to_string(),
            });
        };

        if let Some(status) = self.statuses.get(key).filter(|s| s.is_installed()) {
            info!("'{}' is already installed, nothing to do", key);
            return Ok(ActionOutcome::AlreadyInstalled {
                version: status.version,
            });
        }

        let Some(template) = def.install_commands.template_for(artifact.kind) else {
            return self.fail(key, ScoutError::ConfigError {
                message: format!("No install command for {} installers of '{}'", artifact.kind, key),
            });
        };

        let command = build_install_command(template, &artifact.path, artifact.kind, mode);
        info!(key, mode = %mode, "Installing {}", def.name());

        let process_error = match self.execute(&command, self.timeouts.install) {
            Ok(process_error) => process_error,
            Err(e) => return self.fail(key, e),
        };

        let detection = self.verify_install(def, artifact);
        if detection.installed {
            if let Some(e) = &process_error {
                warn!("'{}' reported a failure but is installed: {}", key, e);
            }
            info!(key, version = ?detection.version, "Install verified");
            self.statuses
                .update(key, |s| s.mark_installed(detection.version.clone()));
            self.record_installation(def, artifact, detection.version.as_deref());
            return Ok(ActionOutcome::Verified {
                version: detection.version,
            });
        }

        let error = process_error.unwrap_or_else(|| ScoutError::VerificationFailed {
            key: key.to_string(),
        });
        warn!("Install of '{}' not confirmed: {}", key, error);
        self.statuses.update(key, |s| {
            s.apply_detection(&detection);
            s.mark_failed(error.to_string());
        });
        Err(error)
    }

    /// Install an artifact no catalog entry claimed, using generic silent
    /// switches. Nothing can verify the result, so the ledger is untouched.
    pub fn install_unidentified(
        &self,
        artifact: &DiscoveredArtifact,
        mode: InstallMode,
    ) -> Result<ActionOutcome> {
        let command = build_install_command(
            generic_template(artifact.kind),
            &artifact.path,
            artifact.kind,
            mode,
        );
        info!(mode = %mode, "Installing unidentified {}", artifact.file_name());

        match self.execute(&command, self.timeouts.install)? {
            None => Ok(ActionOutcome::Unverified),
            Some(e) => {
                warn!("Unidentified install of {} failed: {}", artifact.file_name(), e);
                Err(e)
            }
        }
    }

    /// Uninstall `key`.
    ///
    /// The command comes from the ledger when it has an entry, otherwise from
    /// a reverse lookup in the configuration store. On confirmed removal the
    /// ledger entry is deleted; on any failure it is kept.
    pub fn uninstall(&self, key: &str) -> Result<ActionOutcome> {
        let def = self.catalog.get(key);
        let recorded = self.lock_ledger().get(key).cloned();
        if def.is_none() && recorded.is_none() {
            return Err(ScoutError::UnknownSoftware {
                key: key.to_string(),
            });
        }

        let raw = recorded
            .as_ref()
            .and_then(|e| e.uninstall_string.clone())
            .or_else(|| {
                let name = def.map(SoftwareDefinition::name)?;
                debug!("No ledger command for '{}', searching the store", key);
                self.inspector
                    .find_uninstall_entry(name, None)
                    .map(|e| e.uninstall_string)
            });
        let Some(raw) = raw else {
            return self.fail(key, ScoutError::NoUninstallCommand {
                key: key.to_string(),
            });
        };

        let UninstallCommand {
            command,
            product_code,
        } = build_uninstall_command(&raw);
        let product_code = product_code.or_else(|| recorded.and_then(|e| e.product_code));
        info!(key, "Uninstalling");

        let process_error = match self.execute(&command, self.timeouts.uninstall) {
            Ok(process_error) => process_error,
            Err(e) => return self.fail(key, e),
        };

        let removed = match (&product_code, def) {
            (Some(code), _) => !self.inspector.product_installed(code),
            (None, Some(def)) => !self.inspector.evaluate(def).installed,
            (None, None) => {
                warn!("'{}' is not in the catalog; assuming removal succeeded", key);
                true
            }
        };

        if removed {
            if let Some(e) = &process_error {
                warn!("'{}' reported a failure but is gone: {}", key, e);
            }
            if let Err(e) = self.lock_ledger().remove(key) {
                warn!("Ledger update failed, will retry on next save: {}", e);
            }
            if def.is_some() {
                self.statuses.update(key, InstallationStatus::mark_removed);
            }
            info!(key, "Uninstall verified");
            return Ok(ActionOutcome::Verified { version: None });
        }

        let error = process_error.unwrap_or_else(|| ScoutError::VerificationFailed {
            key: key.to_string(),
        });
        warn!("Uninstall of '{}' not confirmed: {}", key, error);
        self.fail(key, error)
    }

    /// Re-evaluate detection rules for `keys`, or for the whole catalog.
    ///
    /// Unknown keys are skipped. Cancellation is checked between keys.
    pub fn check_status(
        &self,
        keys: Option<&[String]>,
        cancel: &CancelToken,
    ) -> Vec<InstallationStatus> {
        let targets: Vec<&SoftwareDefinition> = match keys {
            Some(keys) => keys
                .iter()
                .filter_map(|k| {
                    let def = self.catalog.get(k);
                    if def.is_none() {
                        warn!("Skipping status check for unknown key '{}'", k);
                    }
                    def
                })
                .collect(),
            None => self.catalog.iter().collect(),
        };

        let mut checked = Vec::with_capacity(targets.len());
        for def in targets {
            if cancel.is_cancelled() {
                info!("Status check cancelled");
                break;
            }
            let detection = self.inspector.evaluate(def);
            checked.push(
                self.statuses
                    .update(&def.key, |s| s.apply_detection(&detection)),
            );
        }
        checked
    }

    fn definition(&self, key: &str) -> Result<&'a SoftwareDefinition> {
        self.catalog.get(key).ok_or_else(|| ScoutError::UnknownSoftware {
            key: key.to_string(),
        })
    }

    /// Run a command. `Ok(None)` is a clean exit, `Ok(Some(_))` a failure
    /// that still warrants verification, `Err` a failure to launch.
    fn execute(&self, command: &str, timeout: Duration) -> Result<Option<ScoutError>> {
        match self.runner.run(command, timeout) {
            Ok(outcome) if outcome.success => Ok(None),
            Ok(outcome) => Ok(Some(ScoutError::ProcessFailed {
                command: command.to_string(),
                code: outcome.exit_code,
            })),
            Err(e @ ScoutError::ProcessTimeout { .. }) => Ok(Some(e)),
            Err(e) => Err(e),
        }
    }

    /// Post-install check. Packages with a product code use the
    /// authoritative product check; everything else re-runs the rules.
    fn verify_install(&self, def: &SoftwareDefinition, artifact: &DiscoveredArtifact) -> Detection {
        if artifact.kind == ArtifactKind::Package {
            if let Some(code) = artifact.product_code() {
                if !self.inspector.product_installed(code) {
                    return Detection::absent();
                }
                let version = self.inspector.evaluate(def).version.or_else(|| {
                    artifact
                        .property(keys::PRODUCT_VERSION)
                        .map(str::to_string)
                });
                return Detection::present(version);
            }
        }
        self.inspector.evaluate(def)
    }

    /// Write the ledger entry for a verified install. A failed save is
    /// logged; the in-memory entry stays.
    fn record_installation(
        &self,
        def: &SoftwareDefinition,
        artifact: &DiscoveredArtifact,
        detected_version: Option<&str>,
    ) {
        let found = self
            .inspector
            .find_uninstall_entry(def.name(), artifact.directory());
        let product_code = match artifact.kind {
            ArtifactKind::Package => artifact.product_code().map(str::to_string),
            ArtifactKind::Executable => None,
        };
        let product_version = artifact
            .property(keys::PRODUCT_VERSION)
            .map(str::to_string);

        let uninstall_string = found
            .as_ref()
            .map(|e| e.uninstall_string.clone())
            .or_else(|| product_code.as_ref().map(|c| format!("msiexec /x {c}")));
        if uninstall_string.is_none() {
            warn!("No uninstall command found for '{}'", def.key);
        }

        let found_version = found.as_ref().and_then(|e| e.display_version.clone());
        let display_version = match artifact.kind {
            ArtifactKind::Package => product_version.clone().or(found_version),
            ArtifactKind::Executable => found_version,
        }
        .or_else(|| detected_version.map(str::to_string));

        let entry = LedgerEntry {
            key: def.key.clone(),
            name: def.name().to_string(),
            timestamp: Utc::now(),
            installer_path: artifact.path.clone(),
            installer_type: artifact.kind,
            uninstall_string,
            install_location: found.and_then(|e| e.install_location),
            display_version,
            installer_product_version: product_version,
            installer_file_version: artifact.property(keys::FILE_VERSION).map(str::to_string),
            product_code,
        };
        if let Err(e) = self.lock_ledger().record(entry) {
            warn!("Ledger update failed, will retry on next save: {}", e);
        }
    }

    fn lock_ledger(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Record `error` on the key's status and return it.
    fn fail(&self, key: &str, error: ScoutError) -> Result<ActionOutcome> {
        if self.catalog.get(key).is_some() {
            self.statuses
                .update(key, |s| s.mark_failed(error.to_string()));
        }
        Err(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{parse_catalog, Hive};
    use crate::inspector::{MemoryStore, UNINSTALL_KEY};
    use crate::metadata::property_map;
    use crate::shell::{ProcessOutcome, ScriptedRunner};
    use std::path::PathBuf;
    use std::sync::Arc;

    const VENDOR: &str = r"SOFTWARE\Vendor\Widget";
    const CODE: &str = "{12345678-ABCD-1234-ABCD-1234567890AB}";

    const CATALOG: &str = r#"
software:
  - key: widget
    display_name: Widget Studio
    detection:
      - kind: exists
        path: SOFTWARE\Vendor\Widget
        version_value: Version
    install_commands:
      exe: "{installer_path} /S"
  - key: gadget
    display_name: Gadget Suite
    install_commands:
      msi: "msiexec /i {installer_path} /qn"
  - key: norules
    display_name: No Rules
    install_commands:
      exe: "{installer_path} /S"
  - key: tool
    display_name: Tool Kit
    detection:
      - kind: exists
        path: SOFTWARE\Vendor\Tool
    install_commands:
      msi: "msiexec /i {installer_path} /qn"
"#;

    struct Fixture {
        catalog: Catalog,
        store: MemoryStore,
        inspector: Inspector,
        ledger: Mutex<Ledger>,
        statuses: StatusBoard,
    }

    impl Fixture {
        fn new() -> Self {
            let catalog = parse_catalog(CATALOG).unwrap();
            let store = MemoryStore::new();
            let statuses = StatusBoard::new(catalog.keys());
            Self {
                inspector: Inspector::new(Arc::new(store.clone())),
                store,
                statuses,
                catalog,
                ledger: Mutex::new(Ledger::in_memory()),
            }
        }

        fn orchestrator<'a>(&'a self, runner: &'a dyn CommandRunner) -> Orchestrator<'a> {
            Orchestrator::new(
                &self.catalog,
                &self.inspector,
                runner,
                &self.ledger,
                &self.statuses,
            )
        }

        fn ledger_entry(&self, key: &str) -> Option<LedgerEntry> {
            self.ledger.lock().unwrap().get(key).cloned()
        }

        fn status(&self, key: &str) -> InstallationStatus {
            self.statuses.get(key).unwrap()
        }
    }

    fn setup_exe() -> DiscoveredArtifact {
        DiscoveredArtifact {
            path: PathBuf::from("/share/widget/Setup.exe"),
            kind: ArtifactKind::Executable,
            size: Some(50 * 1024 * 1024),
            properties: property_map([("ProductName", "Widget Installer"), ("FileVersion", "4.1.0.0")]),
        }
    }

    fn gadget_msi() -> DiscoveredArtifact {
        DiscoveredArtifact {
            path: PathBuf::from("/share/gadget/gadget.msi"),
            kind: ArtifactKind::Package,
            size: Some(20 * 1024 * 1024),
            properties: property_map([
                ("ProductName", "Gadget Suite"),
                ("ProductVersion", "2.5.0"),
                ("MSI_ProductCode", CODE),
            ]),
        }
    }

    /// Runner that installs Widget into `store` and exits with `code`.
    fn widget_installer(store: &MemoryStore, code: i32) -> ScriptedRunner {
        let store = store.clone();
        ScriptedRunner::new(move |_| {
            store.set_value(Hive::Machine, VENDOR, "Version", "4.1");
            let entry = format!(r"{UNINSTALL_KEY}\WidgetStudio");
            store.set_value(Hive::Machine, &entry, "DisplayName", "Widget Studio 4");
            store.set_value(Hive::Machine, &entry, "UninstallString", r#""C:\Widget\unins000.exe""#);
            store.set_value(Hive::Machine, &entry, "DisplayVersion", "4.1.0");
            Ok(ProcessOutcome::with_code(code))
        })
    }

    #[test]
    fn verified_install_updates_status_and_ledger() {
        let fx = Fixture::new();
        let runner = widget_installer(&fx.store, 0);

        let outcome = fx
            .orchestrator(&runner)
            .install("widget", Some(&setup_exe()), InstallMode::Auto)
            .unwrap();

        assert_eq!(
            outcome,
            ActionOutcome::Verified {
                version: Some("4.1".into())
            }
        );
        assert_eq!(runner.calls(), vec![r#""/share/widget/Setup.exe" /S"#.to_string()]);
        assert!(fx.status("widget").is_installed());

        let entry = fx.ledger_entry("widget").unwrap();
        assert_eq!(entry.uninstall_string.as_deref(), Some(r"C:\Widget\unins000.exe"));
        assert_eq!(entry.display_version.as_deref(), Some("4.1.0"));
        assert_eq!(entry.installer_file_version.as_deref(), Some("4.1.0.0"));
        assert!(entry.product_code.is_none());
    }

    #[test]
    fn clean_exit_without_detection_is_verification_failure() {
        let fx = Fixture::new();
        let runner = ScriptedRunner::exiting(0);

        let err = fx
            .orchestrator(&runner)
            .install("widget", Some(&setup_exe()), InstallMode::Auto)
            .unwrap_err();

        assert!(matches!(err, ScoutError::VerificationFailed { .. }));
        let status = fx.status("widget");
        assert_eq!(status.state, InstallState::NotInstalled);
        assert!(status.last_error.unwrap().contains("Verification failed"));
        assert!(fx.ledger_entry("widget").is_none());
    }

    #[test]
    fn bad_exit_code_with_detection_still_succeeds() {
        let fx = Fixture::new();
        let runner = widget_installer(&fx.store, 1603);
        let outcome = fx
            .orchestrator(&runner)
            .install("widget", Some(&setup_exe()), InstallMode::Auto)
            .unwrap();
        assert!(matches!(outcome, ActionOutcome::Verified { .. }));
        assert!(fx.ledger_entry("widget").is_some());
    }

    #[test]
    fn bad_exit_code_without_detection_reports_process_failure() {
        let fx = Fixture::new();
        let runner = ScriptedRunner::exiting(1603);
        let err = fx
            .orchestrator(&runner)
            .install("widget", Some(&setup_exe()), InstallMode::Auto)
            .unwrap_err();
        assert!(matches!(err, ScoutError::ProcessFailed { code: Some(1603), .. }));
        assert!(fx.status("widget").last_error.unwrap().contains("1603"));
    }

    #[test]
    fn launch_failure_skips_verification() {
        let fx = Fixture::new();
        fx.store.set_value(Hive::Machine, VENDOR, "Version", "4.1");
        let runner = ScriptedRunner::new(|cmd| {
            Err(ScoutError::ProcessLaunch {
                command: cmd.to_string(),
            })
        });

        let err = fx
            .orchestrator(&runner)
            .install("widget", Some(&setup_exe()), InstallMode::Auto)
            .unwrap_err();
        assert!(matches!(err, ScoutError::ProcessLaunch { .. }));
        // Verification would have found it; the state must stay untouched.
        assert_eq!(fx.status("widget").state, InstallState::Unknown);
    }

    #[test]
    fn already_installed_is_a_no_op() {
        let fx = Fixture::new();
        fx.statuses
            .update("widget", |s| s.mark_installed(Some("4.0".into())));
        let runner = ScriptedRunner::exiting(0);

        let outcome = fx
            .orchestrator(&runner)
            .install("widget", Some(&setup_exe()), InstallMode::Auto)
            .unwrap();
        assert_eq!(
            outcome,
            ActionOutcome::AlreadyInstalled {
                version: Some("4.0".into())
            }
        );
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn missing_template_and_installer_are_config_errors() {
        let fx = Fixture::new();
        let runner = ScriptedRunner::exiting(0);
        let orchestrator = fx.orchestrator(&runner);

        let err = orchestrator
            .install("widget", Some(&gadget_msi()), InstallMode::Auto)
            .unwrap_err();
        assert!(matches!(err, ScoutError::ConfigError { .. }));

        let err = orchestrator.install("widget", None, InstallMode::Auto).unwrap_err();
        assert!(matches!(err, ScoutError::NoInstaller { .. }));

        let err = orchestrator
            .install("nope", Some(&setup_exe()), InstallMode::Auto)
            .unwrap_err();
        assert!(matches!(err, ScoutError::UnknownSoftware { .. }));
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn package_install_uses_product_code() {
        let fx = Fixture::new();
        let store = fx.store.clone();
        let runner = ScriptedRunner::new(move |_| {
            store.insert_key(Hive::Machine, &format!(r"{UNINSTALL_KEY}\{CODE}"));
            Ok(ProcessOutcome::with_code(3010))
        });

        let outcome = fx
            .orchestrator(&runner)
            .install("gadget", Some(&gadget_msi()), InstallMode::Semi)
            .unwrap();
        assert_eq!(
            outcome,
            ActionOutcome::Verified {
                version: Some("2.5.0".into())
            }
        );
        assert_eq!(
            runner.calls(),
            vec![r#"msiexec /i "/share/gadget/gadget.msi" /passive /norestart"#.to_string()]
        );

        let entry = fx.ledger_entry("gadget").unwrap();
        assert_eq!(entry.product_code.as_deref(), Some(CODE));
        assert_eq!(entry.uninstall_string, Some(format!("msiexec /x {CODE}")));
        assert_eq!(entry.display_version.as_deref(), Some("2.5.0"));
    }

    #[test]
    fn package_version_wins_without_product_code() {
        let fx = Fixture::new();
        let store = fx.store.clone();
        let runner = ScriptedRunner::new(move |_| {
            store.insert_key(Hive::Machine, r"SOFTWARE\Vendor\Tool");
            let entry = format!(r"{UNINSTALL_KEY}\ToolKit");
            store.set_value(Hive::Machine, &entry, "DisplayName", "Tool Kit");
            store.set_value(Hive::Machine, &entry, "DisplayVersion", "7");
            store.set_value(Hive::Machine, &entry, "UninstallString", "tool_uninst.exe");
            Ok(ProcessOutcome::with_code(0))
        });
        let package = DiscoveredArtifact {
            path: PathBuf::from("/share/tool/tool.msi"),
            kind: ArtifactKind::Package,
            size: Some(20 * 1024 * 1024),
            properties: property_map([("ProductName", "Tool Kit"), ("ProductVersion", "7.2.1")]),
        };

        fx.orchestrator(&runner)
            .install("tool", Some(&package), InstallMode::Auto)
            .unwrap();

        let entry = fx.ledger_entry("tool").unwrap();
        assert_eq!(entry.product_code, None);
        assert_eq!(entry.uninstall_string.as_deref(), Some("tool_uninst.exe"));
        assert_eq!(entry.display_version.as_deref(), Some("7.2.1"));
    }

    #[test]
    fn install_then_uninstall_round_trip() {
        let fx = Fixture::new();
        let installer = widget_installer(&fx.store, 0);
        fx.orchestrator(&installer)
            .install("widget", Some(&setup_exe()), InstallMode::Auto)
            .unwrap();
        assert!(fx.ledger_entry("widget").is_some());

        let store = fx.store.clone();
        let uninstaller = ScriptedRunner::new(move |_| {
            store.remove_key(Hive::Machine, VENDOR);
            Ok(ProcessOutcome::with_code(0))
        });
        let outcome = fx.orchestrator(&uninstaller).uninstall("widget").unwrap();

        assert_eq!(outcome, ActionOutcome::Verified { version: None });
        assert_eq!(uninstaller.calls(), vec![r"C:\Widget\unins000.exe /S".to_string()]);
        assert!(fx.ledger_entry("widget").is_none());
        let status = fx.status("widget");
        assert_eq!(status.state, InstallState::NotInstalled);
        assert!(status.last_error.is_none());
    }

    #[test]
    fn failed_uninstall_keeps_ledger_entry() {
        let fx = Fixture::new();
        let installer = widget_installer(&fx.store, 0);
        fx.orchestrator(&installer)
            .install("widget", Some(&setup_exe()), InstallMode::Auto)
            .unwrap();

        let runner = ScriptedRunner::exiting(0);
        let err = fx.orchestrator(&runner).uninstall("widget").unwrap_err();
        assert!(matches!(err, ScoutError::VerificationFailed { .. }));
        assert!(fx.ledger_entry("widget").is_some());
        assert!(fx.status("widget").last_error.is_some());
    }

    #[test]
    fn uninstall_falls_back_to_reverse_lookup() {
        let fx = Fixture::new();
        fx.store.set_value(Hive::Machine, VENDOR, "Version", "4.1");
        let entry = format!(r"{UNINSTALL_KEY}\Widget");
        fx.store.set_value(Hive::Machine, &entry, "DisplayName", "Widget Studio");
        fx.store.set_value(
            Hive::Machine,
            &entry,
            "UninstallString",
            "MsiExec.exe /X{12345678-abcd-1234-abcd-1234567890ab}",
        );

        let runner = ScriptedRunner::exiting(0);
        let outcome = fx.orchestrator(&runner).uninstall("widget").unwrap();
        // Product code not registered, so removal is confirmed.
        assert_eq!(outcome, ActionOutcome::Verified { version: None });
        assert_eq!(
            runner.calls(),
            vec![format!("msiexec /x {CODE} /qn /norestart")]
        );
    }

    #[test]
    fn uninstall_without_any_command_fails() {
        let fx = Fixture::new();
        let runner = ScriptedRunner::exiting(0);
        let err = fx.orchestrator(&runner).uninstall("widget").unwrap_err();
        assert!(matches!(err, ScoutError::NoUninstallCommand { .. }));
        assert!(runner.calls().is_empty());

        let err = fx.orchestrator(&runner).uninstall("nope").unwrap_err();
        assert!(matches!(err, ScoutError::UnknownSoftware { .. }));
    }

    #[test]
    fn uninstall_of_uncatalogued_ledger_entry_is_assumed_verified() {
        let fx = Fixture::new();
        fx.ledger
            .lock()
            .unwrap()
            .record(LedgerEntry {
                key: "legacy".into(),
                name: "Legacy Tool".into(),
                timestamp: Utc::now(),
                installer_path: PathBuf::from("/share/legacy/setup.exe"),
                installer_type: ArtifactKind::Executable,
                uninstall_string: Some("uninst.exe /SILENT".into()),
                install_location: None,
                display_version: None,
                installer_product_version: None,
                installer_file_version: None,
                product_code: None,
            })
            .unwrap();

        let runner = ScriptedRunner::exiting(0);
        fx.orchestrator(&runner).uninstall("legacy").unwrap();
        assert_eq!(runner.calls(), vec!["uninst.exe /SILENT".to_string()]);
        assert!(fx.ledger_entry("legacy").is_none());
        assert!(fx.statuses.get("legacy").is_none());
    }

    #[test]
    fn unidentified_install_is_unverified() {
        let fx = Fixture::new();
        let runner = ScriptedRunner::exiting(0);
        let artifact = DiscoveredArtifact {
            path: PathBuf::from("/share/misc/tool.msi"),
            kind: ArtifactKind::Package,
            size: None,
            properties: Default::default(),
        };

        let outcome = fx
            .orchestrator(&runner)
            .install_unidentified(&artifact, InstallMode::Auto)
            .unwrap();
        assert_eq!(outcome, ActionOutcome::Unverified);
        assert_eq!(
            runner.calls(),
            vec![r#"msiexec /i "/share/misc/tool.msi" /qn /norestart"#.to_string()]
        );
        assert!(fx.ledger.lock().unwrap().is_empty());

        let failing = ScriptedRunner::exiting(2);
        assert!(fx
            .orchestrator(&failing)
            .install_unidentified(&artifact, InstallMode::Auto)
            .is_err());
    }

    #[test]
    fn check_status_skips_unknown_keys() {
        let fx = Fixture::new();
        fx.store.set_value(Hive::Machine, VENDOR, "Version", "4.1");
        let runner = ScriptedRunner::exiting(0);
        let keys = vec!["widget".to_string(), "ghost".to_string(), "gadget".to_string()];

        let checked = fx
            .orchestrator(&runner)
            .check_status(Some(&keys), &CancelToken::new());
        assert_eq!(checked.len(), 2);
        assert_eq!(checked[0].version.as_deref(), Some("4.1"));
        assert_eq!(checked[1].state, InstallState::NotInstalled);
        assert_eq!(fx.status("norules").state, InstallState::Unknown);
    }

    #[test]
    fn check_status_stops_when_cancelled() {
        let fx = Fixture::new();
        let runner = ScriptedRunner::exiting(0);
        let cancel = CancelToken::new();
        cancel.cancel();
        assert!(fx.orchestrator(&runner).check_status(None, &cancel).is_empty());
    }
}
