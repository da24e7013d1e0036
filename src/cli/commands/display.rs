//! Shared rendering for command output.

use serde::Serialize;

use crate::catalog::Catalog;
use crate::engine::ScanReport;
use crate::error::{Result, ScoutError};
use crate::ledger::LedgerEntry;
use crate::orchestrator::{ActionOutcome, InstallationStatus};
use crate::ui::{Table, UserInterface};

/// Print `value` as pretty JSON on stdout, bypassing the output mode.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).map_err(|e| ScoutError::Other(e.into()))?;
    println!("{}", json);
    Ok(())
}

fn or_dash(value: Option<&str>) -> String {
    value.unwrap_or("-").to_string()
}

/// Matched and unidentified installers from a scan.
pub fn show_scan_report(ui: &mut dyn UserInterface, report: &ScanReport, catalog: &Catalog) {
    ui.show_header("Catalog software");
    if report.matches.matches.is_empty() {
        ui.message("No catalog software found.");
    } else {
        let mut table = Table::new(["KEY", "NAME", "INSTALLER", "SCORE"]);
        for (key, matched) in &report.matches.matches {
            let name = catalog.get(key).map(|d| d.name()).unwrap_or(key);
            table.add_row([
                key.clone(),
                name.to_string(),
                matched.artifact.path.display().to_string(),
                matched.score.to_string(),
            ]);
        }
        ui.message(&table.render());
    }

    if !report.matches.unidentified.is_empty() {
        ui.show_header("Unidentified installers");
        let mut table = Table::new(["PATH", "PRODUCT", "CONFIDENCE"]);
        for candidate in &report.matches.unidentified {
            table.add_row([
                candidate.artifact.path.display().to_string(),
                candidate.artifact.display_name(),
                format!("{:.2}", candidate.confidence),
            ]);
        }
        ui.message(&table.render());
    }

    let stats = &report.stats;
    ui.message("");
    ui.message(&format!(
        "{} directories visited, {} pruned, {} files seen, {} candidates",
        stats.directories_visited, stats.directories_pruned, stats.files_seen, stats.accepted
    ));
}

/// One row per status, in the order given.
pub fn status_table(statuses: &[InstallationStatus], catalog: &Catalog) -> Table {
    let mut table = Table::new(["KEY", "NAME", "STATE", "VERSION", "LAST ERROR"]);
    for status in statuses {
        let name = catalog
            .get(&status.key)
            .map(|d| d.name())
            .unwrap_or(&status.key);
        table.add_row([
            status.key.clone(),
            name.to_string(),
            status.state.to_string(),
            or_dash(status.version.as_deref()),
            or_dash(status.last_error.as_deref()),
        ]);
    }
    table
}

pub fn ledger_table(entries: &[LedgerEntry]) -> Table {
    let mut table = Table::new(["KEY", "NAME", "VERSION", "INSTALLED", "UNINSTALL"]);
    for entry in entries {
        table.add_row([
            entry.key.clone(),
            entry.name.clone(),
            or_dash(entry.display_version.as_deref()),
            entry.timestamp.format("%Y-%m-%d %H:%M").to_string(),
            or_dash(entry.uninstall_string.as_deref()),
        ]);
    }
    table
}

/// Report a successful install action.
pub fn show_install_outcome(ui: &mut dyn UserInterface, name: &str, outcome: &ActionOutcome) {
    match outcome {
        ActionOutcome::Verified { version } => ui.success(&with_version(
            &format!("{} installed", name),
            version.as_deref(),
        )),
        ActionOutcome::AlreadyInstalled { version } => ui.success(&with_version(
            &format!("{} is already installed", name),
            version.as_deref(),
        )),
        ActionOutcome::Unverified => ui.warning(&format!(
            "{} installer finished; the result could not be verified",
            name
        )),
    }
}

fn with_version(msg: &str, version: Option<&str>) -> String {
    match version {
        Some(v) => format!("{} ({})", msg, v),
        None => msg.to_string(),
    }
}
