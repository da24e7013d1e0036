//! Ledger command implementation.
//!
//! The `installscout ledger` command lists software this tool installed.

use std::sync::Arc;

use crate::cli::args::LedgerArgs;
use crate::engine::Engine;
use crate::error::Result;
use crate::ui::UserInterface;

use super::dispatcher::{Command, CommandResult};
use super::display;

/// The ledger command implementation.
pub struct LedgerCommand {
    engine: Arc<Engine>,
    args: LedgerArgs,
}

impl LedgerCommand {
    /// Create a new ledger command.
    pub fn new(engine: Arc<Engine>, args: LedgerArgs) -> Self {
        Self { engine, args }
    }
}

impl Command for LedgerCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let entries = self.engine.ledger_entries();
        if self.args.json {
            display::print_json(&entries)?;
            return Ok(CommandResult::success());
        }

        ui.show_header("Installation ledger");
        if let Some(path) = self.engine.ledger_path() {
            ui.message(&format!("File: {}", path.display()));
        }
        if entries.is_empty() {
            ui.message("No installations recorded.");
        } else {
            ui.message(&display::ledger_table(&entries).render());
        }
        Ok(CommandResult::success())
    }
}
