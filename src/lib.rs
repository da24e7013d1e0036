//! installscout - installer discovery and verified software deployment.
//!
//! installscout walks a directory tree for installer files, matches them
//! against a catalog of known software, checks what is already installed,
//! and runs silent installs and uninstalls whose success is confirmed by an
//! independent check rather than by exit codes alone.
//!
//! # Modules
//!
//! - [`catalog`] - Software catalog schema and YAML loading
//! - [`metadata`] - Property extraction from executables and packages
//! - [`scanner`] - Directory walk producing candidate installers
//! - [`matcher`] - Catalog matching and the installer heuristic
//! - [`inspector`] - Installed-state detection against a configuration store
//! - [`shell`] - External process execution
//! - [`ledger`] - Durable record of verified installs
//! - [`orchestrator`] - Install and uninstall with verification
//! - [`engine`] - Shared session state and background tasks
//! - [`cli`] - Command-line interface and argument parsing
//! - [`ui`] - Spinners, prompts and terminal output
//! - [`error`] - Error types and result aliases
//!
//! # Example
//!
//! ```
//! use installscout::catalog::{parse_catalog, Hive};
//! use installscout::inspector::{Inspector, MemoryStore};
//! use std::sync::Arc;
//!
//! let catalog = parse_catalog(r#"
//! software:
//!   - key: widget
//!     detection:
//!       - kind: exists
//!         path: SOFTWARE\Vendor\Widget
//!         version_value: Version
//! "#).unwrap();
//!
//! let store = MemoryStore::new();
//! store.set_value(Hive::Machine, r"SOFTWARE\Vendor\Widget", "Version", "4.1");
//! let inspector = Inspector::new(Arc::new(store));
//!
//! let detection = inspector.evaluate(catalog.get("widget").unwrap());
//! assert!(detection.installed);
//! assert_eq!(detection.version.as_deref(), Some("4.1"));
//! ```

pub mod catalog;
pub mod cli;
pub mod engine;
pub mod error;
pub mod inspector;
pub mod ledger;
pub mod matcher;
pub mod metadata;
pub mod orchestrator;
pub mod scanner;
pub mod shell;
pub mod ui;

pub use error::{Result, ScoutError};
