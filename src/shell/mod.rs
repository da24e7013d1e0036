//! Process execution boundary.
//!
//! Everything that launches an external program goes through a
//! [`CommandRunner`], so orchestration logic can be tested with a
//! [`ScriptedRunner`] instead of real installers.

pub mod command;

pub use command::{execute, CommandOptions, ProcessOutcome, SUCCESS_EXIT_CODES};

use crate::error::Result;
use std::sync::Mutex;
use std::time::Duration;

/// Runs a command line with a hard timeout.
pub trait CommandRunner: Send + Sync {
    fn run(&self, command: &str, timeout: Duration) -> Result<ProcessOutcome>;
}

/// Runs commands through the platform shell.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, command: &str, timeout: Duration) -> Result<ProcessOutcome> {
        execute(
            command,
            &CommandOptions {
                timeout: Some(timeout),
                ..Default::default()
            },
        )
    }
}

type Handler = Box<dyn Fn(&str) -> Result<ProcessOutcome> + Send + Sync>;

/// Runner that answers from a closure and records every command line.
pub struct ScriptedRunner {
    handler: Handler,
    calls: Mutex<Vec<String>>,
}

impl ScriptedRunner {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&str) -> Result<ProcessOutcome> + Send + Sync + 'static,
    {
        Self {
            handler: Box::new(handler),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Every command exits with `code`.
    pub fn exiting(code: i32) -> Self {
        Self::new(move |_| Ok(ProcessOutcome::with_code(code)))
    }

    /// Command lines received so far.
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .map(|c| c.clone())
            .unwrap_or_default()
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, command: &str, _timeout: Duration) -> Result<ProcessOutcome> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(command.to_string());
        }
        (self.handler)(command)
    }
}
