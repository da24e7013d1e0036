//! Error types for installscout operations.
//!
//! This module defines [`ScoutError`], the primary error type used throughout
//! the crate, and a [`Result`] type alias for convenience.
//!
//! # Error Handling Strategy
//!
//! - Per-file problems during a scan (unreadable metadata, permission errors,
//!   files vanishing mid-walk) are logged and skipped, never returned
//! - Use `ScoutError` for failures a caller must be able to tell apart
//!   (configuration, launch, timeout, verification)
//! - Use `anyhow::Error` (via `ScoutError::Other`) for unexpected errors

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for installscout operations.
#[derive(Debug, Error)]
pub enum ScoutError {
    /// Catalog file not found at expected location.
    #[error("Catalog not found: {path}")]
    CatalogNotFound { path: PathBuf },

    /// Malformed catalog, definition or missing command template.
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    /// A software key that is not part of the catalog.
    #[error("Unknown software key: {key}")]
    UnknownSoftware { key: String },

    /// No installer artifact was matched for the key.
    #[error("No installer found for '{key}'")]
    NoInstaller { key: String },

    /// The scan root is missing or not a directory.
    #[error("Invalid search path: {path}")]
    InvalidSearchPath { path: PathBuf },

    /// Artifact metadata could not be read.
    #[error("Cannot read metadata from {path}: {message}")]
    Metadata { path: PathBuf, message: String },

    /// The external process could not be started.
    #[error("Failed to launch command: {command}")]
    ProcessLaunch { command: String },

    /// The external process exceeded its time budget and was killed.
    #[error("Command timed out after {seconds}s: {command}")]
    ProcessTimeout { command: String, seconds: u64 },

    /// The external process exited with a code outside the success set.
    #[error("Command exited with code {}: {command}", exit_label(.code))]
    ProcessFailed { command: String, code: Option<i32> },

    /// Neither the ledger nor the store knows how to remove the program.
    #[error("No uninstall command found for '{key}'")]
    NoUninstallCommand { key: String },

    /// Process reported success but the independent state check disagrees.
    #[error("Verification failed for '{key}'")]
    VerificationFailed { key: String },

    /// Reading or writing the installation ledger failed.
    #[error("Ledger error at {path}: {message}")]
    Ledger { path: PathBuf, message: String },

    /// A single-flight task (scan, status check) is already running.
    #[error("A {task} task is already running")]
    TaskBusy { task: String },

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic wrapped error for anyhow interop.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

fn exit_label(code: &Option<i32>) -> String {
    code.map_or_else(|| "none".to_string(), |c| c.to_string())
}

/// Result type alias for installscout operations.
pub type Result<T> = std::result::Result<T, ScoutError>;
