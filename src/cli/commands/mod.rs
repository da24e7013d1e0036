//! CLI command implementations.
//!
//! Each command implements the [`Command`] trait, which provides a uniform
//! interface for executing commands and reporting results.
//!
//! # Architecture
//!
//! Commands are dispatched via [`CommandDispatcher`], which builds the
//! engine from the global flags and routes subcommands to their
//! implementations. Commands hold an `Arc<Engine>` so tests can hand them
//! one built over in-memory fakes.

pub mod completions;
pub mod dispatcher;
pub mod display;
pub mod install;
pub mod ledger;
pub mod scan;
pub mod status;
pub mod uninstall;

#[cfg(test)]
pub(crate) mod test_support;

pub use dispatcher::{Command, CommandDispatcher, CommandResult, EngineSources};
