//! Status command implementation.
//!
//! The `installscout status` command evaluates detection rules and shows
//! which catalog software is installed.

use std::sync::Arc;

use crate::cli::args::StatusArgs;
use crate::engine::{CancelToken, Engine};
use crate::error::Result;
use crate::ui::UserInterface;

use super::dispatcher::{Command, CommandResult};
use super::display;

/// The status command implementation.
pub struct StatusCommand {
    engine: Arc<Engine>,
    args: StatusArgs,
}

impl StatusCommand {
    /// Create a new status command.
    pub fn new(engine: Arc<Engine>, args: StatusArgs) -> Self {
        Self { engine, args }
    }
}

impl Command for StatusCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let catalog = self.engine.catalog();
        let keys = if self.args.keys.is_empty() {
            None
        } else {
            for key in &self.args.keys {
                if catalog.get(key).is_none() {
                    ui.warning(&format!("Unknown software key '{}' skipped", key));
                }
            }
            Some(self.args.keys.as_slice())
        };

        let statuses = self.engine.check_status(keys, &CancelToken::new())?;

        if self.args.json {
            display::print_json(&statuses)?;
            return Ok(CommandResult::success());
        }

        ui.show_header("Installation status");
        if statuses.is_empty() {
            ui.message("Nothing to check.");
        } else {
            ui.message(&display::status_table(&statuses, catalog).render());
            let installed = statuses.iter().filter(|s| s.is_installed()).count();
            ui.message("");
            ui.message(&format!("{} of {} installed", installed, statuses.len()));
        }
        Ok(CommandResult::success())
    }
}
