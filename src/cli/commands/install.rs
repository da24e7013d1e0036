//! Install command implementation.
//!
//! The `installscout install` command scans a directory, then installs either
//! a catalog entry from its matched installer or an unidentified installer
//! the scan flagged.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cli::args::InstallArgs;
use crate::engine::{CancelToken, Engine, ScanReport};
use crate::error::{Result, ScoutError};
use crate::orchestrator::ActionOutcome;
use crate::ui::UserInterface;

use super::dispatcher::{Command, CommandResult};
use super::display;

/// The install command implementation.
pub struct InstallCommand {
    engine: Arc<Engine>,
    args: InstallArgs,
}

impl InstallCommand {
    /// Create a new install command.
    pub fn new(engine: Arc<Engine>, args: InstallArgs) -> Self {
        Self { engine, args }
    }

    fn scan(&self, ui: &mut dyn UserInterface) -> Result<ScanReport> {
        self.engine.set_search_root(self.args.from.clone())?;
        let mut spinner = ui.start_spinner(&format!("Scanning {}", self.args.from.display()));
        match self.engine.scan(&CancelToken::new()) {
            Ok(report) => {
                spinner.finish_success(&format!(
                    "Scanned {} ({} candidates)",
                    self.args.from.display(),
                    report.stats.accepted
                ));
                Ok(report)
            }
            Err(e) => {
                spinner.finish_error(&e.to_string());
                Err(e)
            }
        }
    }

    fn run_install<F>(&self, ui: &mut dyn UserInterface, name: &str, action: F) -> CommandResult
    where
        F: FnOnce() -> Result<ActionOutcome>,
    {
        let mut spinner = ui.start_spinner(&format!("Installing {} ({} mode)", name, self.args.mode));
        match action() {
            Ok(outcome) => {
                spinner.finish_success(&format!("{} installer finished", name));
                display::show_install_outcome(ui, name, &outcome);
                CommandResult::success()
            }
            Err(e) => {
                spinner.finish_error(&format!("{} failed", name));
                ui.error(&e.to_string());
                CommandResult::failure(1)
            }
        }
    }
}

/// Find the scanned unidentified installer the user pointed at.
fn resolve_unidentified(report: &ScanReport, requested: &Path) -> Option<PathBuf> {
    report
        .matches
        .unidentified
        .iter()
        .map(|u| &u.artifact.path)
        .find(|p| p.as_path() == requested || p.ends_with(requested))
        .cloned()
}

impl Command for InstallCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let name = match &self.args.key {
            Some(key) => match self.engine.catalog().get(key) {
                Some(def) => Some(def.name().to_string()),
                None => {
                    ui.error(&format!("Unknown software key: {}", key));
                    return Ok(CommandResult::failure(2));
                }
            },
            None => None,
        };

        let report = match self.scan(ui) {
            Ok(report) => report,
            Err(e @ ScoutError::InvalidSearchPath { .. }) => {
                ui.error(&e.to_string());
                return Ok(CommandResult::failure(2));
            }
            Err(e) => return Err(e),
        };

        let mode = self.args.mode;
        if let Some(requested) = &self.args.unidentified {
            let Some(path) = resolve_unidentified(&report, requested) else {
                ui.error(&format!(
                    "{} is not an unidentified installer in {}",
                    requested.display(),
                    self.args.from.display()
                ));
                return Ok(CommandResult::failure(1));
            };
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            return Ok(self.run_install(ui, &file_name, || {
                self.engine.install_unidentified(&path, mode)
            }));
        }

        let (Some(key), Some(name)) = (&self.args.key, name) else {
            ui.error("Nothing to install: pass a catalog key or --unidentified");
            return Ok(CommandResult::failure(2));
        };
        Ok(self.run_install(ui, &name, || self.engine.install(key, mode)))
    }
}
