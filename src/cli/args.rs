//! CLI argument definitions.
//!
//! This module defines all CLI arguments using clap's derive macros.
//! The main entry point is the [`Cli`] struct.

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

use crate::orchestrator::InstallMode;

/// Catalog file used when neither `--catalog` nor the environment names one.
pub const DEFAULT_CATALOG_FILE: &str = "installscout.yml";

/// installscout - Find installers, detect installed software, deploy silently.
#[derive(Debug, Parser)]
#[command(name = "installscout")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Software catalog (YAML)
    #[arg(short, long, global = true, env = "INSTALLSCOUT_CATALOG")]
    pub catalog: Option<PathBuf>,

    /// Installation ledger file (defaults to the user data directory)
    #[arg(long, global = true, env = "INSTALLSCOUT_LEDGER")]
    pub ledger: Option<PathBuf>,

    /// Evaluate detection rules against a YAML store snapshot instead of the
    /// system configuration store
    #[arg(long, global = true, value_name = "FILE")]
    pub store_snapshot: Option<PathBuf>,

    /// Minimal output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Catalog path after applying the default.
    pub fn catalog_path(&self) -> PathBuf {
        self.catalog
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CATALOG_FILE))
    }
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Scan a directory for installers and match them to the catalog
    Scan(ScanArgs),

    /// Check which catalog entries are installed
    Status(StatusArgs),

    /// Install catalog software from a scanned directory
    Install(InstallArgs),

    /// Uninstall catalog software
    Uninstall(UninstallArgs),

    /// Show what this tool has installed
    Ledger(LedgerArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Arguments for the `scan` command.
#[derive(Debug, Clone, Args)]
pub struct ScanArgs {
    /// Directory to search
    pub path: PathBuf,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `status` command.
#[derive(Debug, Clone, Default, Args)]
pub struct StatusArgs {
    /// Catalog keys to check (all when omitted)
    pub keys: Vec<String>,

    /// Print statuses as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `install` command.
#[derive(Debug, Clone, Args)]
pub struct InstallArgs {
    /// Catalog key to install
    #[arg(required_unless_present = "unidentified")]
    pub key: Option<String>,

    /// Directory to scan for the installer
    #[arg(long, value_name = "DIR")]
    pub from: PathBuf,

    /// Install an unidentified installer found by the scan
    #[arg(long, value_name = "FILE", conflicts_with = "key")]
    pub unidentified: Option<PathBuf>,

    /// Installer interaction level
    #[arg(long, value_enum, default_value_t = InstallMode::Auto)]
    pub mode: InstallMode,
}

/// Arguments for the `uninstall` command.
#[derive(Debug, Clone, Args)]
pub struct UninstallArgs {
    /// Catalog or ledger key to uninstall
    pub key: String,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

/// Arguments for the `ledger` command.
#[derive(Debug, Clone, Default, Args)]
pub struct LedgerArgs {
    /// Print entries as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `completions` command.
#[derive(Debug, Clone, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}
