//! Command dispatching.
//!
//! This module provides the core command infrastructure:
//! - [`Command`] trait for implementing commands
//! - [`CommandResult`] for uniform result reporting
//! - [`CommandDispatcher`] for routing CLI subcommands

use std::path::PathBuf;
use std::sync::Arc;

use crate::catalog::load_catalog;
use crate::cli::args::{Cli, Commands};
use crate::engine::{Engine, EngineOptions};
use crate::error::{Result, ScoutError};
use crate::inspector::{Inspector, MemoryStore};
use crate::ledger::Ledger;
use crate::ui::UserInterface;

use super::completions::CompletionsCommand;
use super::install::InstallCommand;
use super::ledger::LedgerCommand;
use super::scan::ScanCommand;
use super::status::StatusCommand;
use super::uninstall::UninstallCommand;

/// Trait for command implementations.
///
/// Each CLI subcommand implements this trait to provide its execution logic.
pub trait Command {
    /// Execute the command.
    ///
    /// # Returns
    ///
    /// A [`CommandResult`] indicating success/failure and exit code.
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult>;
}

/// Result of command execution.
#[derive(Debug)]
pub struct CommandResult {
    /// Whether the command succeeded.
    pub success: bool,

    /// Exit code to use (0 for success, non-zero for failure).
    pub exit_code: i32,
}

impl CommandResult {
    /// Create a successful result.
    pub fn success() -> Self {
        Self {
            success: true,
            exit_code: 0,
        }
    }

    /// Create a failure result.
    pub fn failure(exit_code: i32) -> Self {
        Self {
            success: false,
            exit_code,
        }
    }
}

/// Where the engine's inputs come from.
#[derive(Debug, Clone, Default)]
pub struct EngineSources {
    pub catalog: PathBuf,
    pub ledger: Option<PathBuf>,
    pub store_snapshot: Option<PathBuf>,
}

impl EngineSources {
    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            catalog: cli.catalog_path(),
            ledger: cli.ledger.clone(),
            store_snapshot: cli.store_snapshot.clone(),
        }
    }

    /// Load the catalog and store, then build an engine over the host.
    pub fn build(&self) -> Result<Engine> {
        let catalog = load_catalog(&self.catalog)?;

        let inspector = match &self.store_snapshot {
            Some(path) => Inspector::new(Arc::new(MemoryStore::load_snapshot(path)?)),
            None => Inspector::native(),
        };

        let options = EngineOptions {
            ledger_path: self.ledger.clone().or_else(Ledger::default_path),
            ..Default::default()
        };
        Ok(Engine::native(catalog, inspector, options))
    }
}

/// Dispatches CLI commands to their implementations.
pub struct CommandDispatcher {
    sources: EngineSources,
}

impl CommandDispatcher {
    pub fn new(sources: EngineSources) -> Self {
        Self { sources }
    }

    /// Dispatch and execute a command.
    ///
    /// Commands that need an engine get one built from the configured
    /// sources. A missing catalog exits with code 2.
    pub fn dispatch(&self, cli: &Cli, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        if let Commands::Completions(args) = &cli.command {
            return CompletionsCommand::new(args.clone()).execute(ui);
        }

        let engine = match self.sources.build() {
            Ok(engine) => Arc::new(engine),
            Err(ScoutError::CatalogNotFound { path }) => {
                ui.error(&format!(
                    "Catalog not found: {}. Pass --catalog or set INSTALLSCOUT_CATALOG.",
                    path.display()
                ));
                return Ok(CommandResult::failure(2));
            }
            Err(e) => return Err(e),
        };

        match &cli.command {
            Commands::Scan(args) => ScanCommand::new(engine, args.clone()).execute(ui),
            Commands::Status(args) => StatusCommand::new(engine, args.clone()).execute(ui),
            Commands::Install(args) => InstallCommand::new(engine, args.clone()).execute(ui),
            Commands::Uninstall(args) => UninstallCommand::new(engine, args.clone()).execute(ui),
            Commands::Ledger(args) => LedgerCommand::new(engine, args.clone()).execute(ui),
            Commands::Completions(args) => CompletionsCommand::new(args.clone()).execute(ui),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::MockUI;
    use clap::Parser;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn command_result_success() {
        let result = CommandResult::success();
        assert!(result.success);
        assert_eq!(result.exit_code, 0);
    }

    #[test]
    fn command_result_failure() {
        let result = CommandResult::failure(2);
        assert!(!result.success);
        assert_eq!(result.exit_code, 2);
    }

    #[test]
    fn missing_catalog_exits_with_code_two() {
        let temp = TempDir::new().unwrap();
        let cli = Cli::parse_from(["installscout", "status"]);
        let dispatcher = CommandDispatcher::new(EngineSources {
            catalog: temp.path().join("missing.yml"),
            ..Default::default()
        });
        let mut ui = MockUI::new();

        let result = dispatcher.dispatch(&cli, &mut ui).unwrap();

        assert_eq!(result.exit_code, 2);
        assert!(ui.errors()[0].contains("Catalog not found"));
    }

    #[test]
    fn invalid_catalog_is_an_error() {
        let temp = TempDir::new().unwrap();
        let catalog = temp.path().join("catalog.yml");
        fs::write(&catalog, "software: [{key: ''}]").unwrap();

        let sources = EngineSources {
            catalog,
            ..Default::default()
        };

        assert!(matches!(
            sources.build(),
            Err(ScoutError::ConfigError { .. })
        ));
    }

    #[test]
    fn store_snapshot_drives_detection() {
        let temp = TempDir::new().unwrap();
        let catalog = temp.path().join("catalog.yml");
        fs::write(
            &catalog,
            r#"
software:
  - key: widget
    detection:
      - kind: exists
        hive: HKLM
        path: 'SOFTWARE\Vendor\Widget'
"#,
        )
        .unwrap();
        let snapshot = temp.path().join("store.yml");
        fs::write(&snapshot, "HKLM:\n  'SOFTWARE\\Vendor\\Widget': {}\n").unwrap();

        let engine = EngineSources {
            catalog,
            ledger: Some(temp.path().join("ledger.json")),
            store_snapshot: Some(snapshot),
        }
        .build()
        .unwrap();

        let def = engine.catalog().get("widget").unwrap();
        assert!(engine.inspector().evaluate(def).installed);
    }
}
