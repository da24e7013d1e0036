//! Terminal UI.

use console::{style, Term};
use dialoguer::theme::ColorfulTheme;
use dialoguer::Confirm;
use std::io::Write;

use crate::error::{Result, ScoutError};

use super::{
    should_use_colors, OutputMode, ProgressSpinner, ScoutTheme, SpinnerHandle, UserInterface,
};

/// UI writing to stdout, prompting with dialoguer when attached to a TTY.
pub struct TerminalUI {
    term: Term,
    theme: ScoutTheme,
    mode: OutputMode,
    interactive: bool,
}

impl TerminalUI {
    /// `interactive` is further limited to sessions with a real terminal.
    pub fn new(mode: OutputMode, interactive: bool) -> Self {
        let theme = if should_use_colors() {
            ScoutTheme::new()
        } else {
            ScoutTheme::plain()
        };
        let term = Term::stdout();
        let interactive = interactive && term.is_term();
        Self {
            term,
            theme,
            mode,
            interactive,
        }
    }

    pub fn theme(&self) -> &ScoutTheme {
        &self.theme
    }
}

/// Dialoguer theme without the default `?` prefix.
fn prompt_theme() -> ColorfulTheme {
    ColorfulTheme {
        prompt_prefix: style("".to_string()),
        ..ColorfulTheme::default()
    }
}

impl UserInterface for TerminalUI {
    fn output_mode(&self) -> OutputMode {
        self.mode
    }

    fn message(&mut self, msg: &str) {
        if self.mode.shows_status() {
            writeln!(self.term, "{}", msg).ok();
        }
    }

    fn success(&mut self, msg: &str) {
        if self.mode.shows_status() {
            writeln!(self.term, "{}", self.theme.format_success(msg)).ok();
        }
    }

    fn warning(&mut self, msg: &str) {
        if self.mode.shows_status() {
            writeln!(self.term, "{}", self.theme.format_warning(msg)).ok();
        }
    }

    fn error(&mut self, msg: &str) {
        let _ = Term::stderr().write_line(&self.theme.format_error(msg));
    }

    fn show_header(&mut self, title: &str) {
        if self.mode.shows_status() {
            writeln!(self.term, "\n{}\n", self.theme.format_header(title)).ok();
        }
    }

    fn start_spinner(&mut self, message: &str) -> Box<dyn SpinnerHandle> {
        if self.mode.shows_spinners() && self.term.is_term() {
            Box::new(ProgressSpinner::new(message))
        } else {
            Box::new(ProgressSpinner::hidden())
        }
    }

    fn confirm(&mut self, question: &str, default: bool) -> Result<bool> {
        if !self.interactive {
            return Ok(default);
        }
        Confirm::with_theme(&prompt_theme())
            .with_prompt(question)
            .default(default)
            .interact_on(&self.term)
            .map_err(|e| ScoutError::Io(e.into()))
    }

    fn is_interactive(&self) -> bool {
        self.interactive
    }
}
