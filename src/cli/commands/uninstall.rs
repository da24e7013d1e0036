//! Uninstall command implementation.
//!
//! The `installscout uninstall` command removes software using the command
//! recorded in the ledger, or one found in the configuration store, and
//! confirms the removal before reporting success.

use std::sync::Arc;

use crate::cli::args::UninstallArgs;
use crate::engine::Engine;
use crate::error::{Result, ScoutError};
use crate::ui::UserInterface;

use super::dispatcher::{Command, CommandResult};

/// The uninstall command implementation.
pub struct UninstallCommand {
    engine: Arc<Engine>,
    args: UninstallArgs,
}

impl UninstallCommand {
    /// Create a new uninstall command.
    pub fn new(engine: Arc<Engine>, args: UninstallArgs) -> Self {
        Self { engine, args }
    }

    /// Catalog name, then ledger name, then the key itself.
    fn display_name(&self) -> String {
        let key = &self.args.key;
        if let Some(def) = self.engine.catalog().get(key) {
            return def.name().to_string();
        }
        self.engine
            .ledger_entries()
            .into_iter()
            .find(|e| &e.key == key)
            .map(|e| e.name)
            .unwrap_or_else(|| key.clone())
    }
}

impl Command for UninstallCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let name = self.display_name();

        if !self.args.yes && !ui.confirm(&format!("Uninstall {}?", name), false)? {
            ui.warning("Uninstall cancelled");
            return Ok(CommandResult::failure(1));
        }

        let mut spinner = ui.start_spinner(&format!("Uninstalling {}", name));
        match self.engine.uninstall(&self.args.key) {
            Ok(_) => {
                spinner.finish_success(&format!("{} uninstalled", name));
                ui.success(&format!("{} uninstalled", name));
                Ok(CommandResult::success())
            }
            Err(e @ ScoutError::UnknownSoftware { .. }) => {
                spinner.finish_error(&format!("{} failed", name));
                ui.error(&e.to_string());
                Ok(CommandResult::failure(2))
            }
            Err(e) => {
                spinner.finish_error(&format!("{} failed", name));
                ui.error(&e.to_string());
                Ok(CommandResult::failure(1))
            }
        }
    }
}
