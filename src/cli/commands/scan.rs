//! Scan command implementation.
//!
//! The `installscout scan` command walks a directory for installers and
//! reports which catalog entries they match.

use std::sync::Arc;

use crate::cli::args::ScanArgs;
use crate::engine::{CancelToken, Engine};
use crate::error::{Result, ScoutError};
use crate::ui::UserInterface;

use super::dispatcher::{Command, CommandResult};
use super::display;

/// The scan command implementation.
pub struct ScanCommand {
    engine: Arc<Engine>,
    args: ScanArgs,
}

impl ScanCommand {
    /// Create a new scan command.
    pub fn new(engine: Arc<Engine>, args: ScanArgs) -> Self {
        Self { engine, args }
    }
}

impl Command for ScanCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        match self.engine.set_search_root(self.args.path.clone()) {
            Ok(()) => {}
            Err(e @ ScoutError::InvalidSearchPath { .. }) => {
                ui.error(&e.to_string());
                return Ok(CommandResult::failure(2));
            }
            Err(e) => return Err(e),
        }

        let mut spinner = ui.start_spinner(&format!("Scanning {}", self.args.path.display()));
        let report = match self.engine.scan(&CancelToken::new()) {
            Ok(report) => report,
            Err(e) => {
                spinner.finish_error(&e.to_string());
                return Err(e);
            }
        };
        spinner.finish_success(&format!(
            "Found {} catalog matches and {} unidentified installers",
            report.matches.matches.len(),
            report.matches.unidentified.len()
        ));

        if self.args.json {
            display::print_json(&report)?;
        } else {
            display::show_scan_report(ui, &report, self.engine.catalog());
        }
        Ok(CommandResult::success())
    }
}
