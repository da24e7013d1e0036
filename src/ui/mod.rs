//! Terminal user interface.
//!
//! Commands talk to the user only through [`UserInterface`], so they can be
//! tested with [`MockUI`]. The real implementation is [`TerminalUI`].

pub mod mock;
pub mod output;
pub mod spinner;
pub mod table;
pub mod terminal;
pub mod theme;

pub use mock::MockUI;
pub use output::OutputMode;
pub use spinner::ProgressSpinner;
pub use table::Table;
pub use terminal::TerminalUI;
pub use theme::{should_use_colors, ScoutTheme};

use crate::error::Result;

/// User-facing output and prompts.
pub trait UserInterface {
    fn output_mode(&self) -> OutputMode;

    /// Plain line of output.
    fn message(&mut self, msg: &str);

    fn success(&mut self, msg: &str);

    fn warning(&mut self, msg: &str);

    /// Errors are shown in every output mode.
    fn error(&mut self, msg: &str);

    fn show_header(&mut self, title: &str);

    /// Start a spinner for a long-running operation.
    fn start_spinner(&mut self, message: &str) -> Box<dyn SpinnerHandle>;

    /// Ask a yes/no question. Non-interactive sessions return `default`.
    fn confirm(&mut self, question: &str, default: bool) -> Result<bool>;

    fn is_interactive(&self) -> bool;
}

/// Handle for controlling a spinner.
pub trait SpinnerHandle {
    fn set_message(&mut self, msg: &str);

    fn finish_success(&mut self, msg: &str);

    fn finish_error(&mut self, msg: &str);
}
