//! Recording UI for command tests.

use std::collections::VecDeque;

use crate::error::Result;

use super::{OutputMode, SpinnerHandle, UserInterface};

/// Captures everything a command shows and answers prompts from a queue.
///
/// ```
/// use installscout::ui::{MockUI, UserInterface};
///
/// let mut ui = MockUI::new();
/// ui.queue_confirm(false);
/// assert!(!ui.confirm("Remove?", true).unwrap());
/// ui.success("Done");
/// assert_eq!(ui.successes(), ["Done".to_string()]);
/// ```
#[derive(Debug, Default)]
pub struct MockUI {
    mode: OutputMode,
    interactive: bool,
    messages: Vec<String>,
    successes: Vec<String>,
    warnings: Vec<String>,
    errors: Vec<String>,
    headers: Vec<String>,
    spinners: Vec<String>,
    confirm_answers: VecDeque<bool>,
    questions: Vec<String>,
}

impl MockUI {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer the next `confirm` with `answer`. Unqueued prompts get their
    /// default.
    pub fn queue_confirm(&mut self, answer: bool) {
        self.interactive = true;
        self.confirm_answers.push_back(answer);
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    pub fn successes(&self) -> &[String] {
        &self.successes
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Spinner start messages.
    pub fn spinners(&self) -> &[String] {
        &self.spinners
    }

    /// Questions asked through `confirm`.
    pub fn questions(&self) -> &[String] {
        &self.questions
    }

    /// Every line shown, in category order, for loose assertions.
    pub fn all_output(&self) -> String {
        [
            &self.headers,
            &self.messages,
            &self.successes,
            &self.warnings,
            &self.errors,
        ]
        .iter()
        .flat_map(|v| v.iter())
        .cloned()
        .collect::<Vec<_>>()
        .join("\n")
    }
}

impl UserInterface for MockUI {
    fn output_mode(&self) -> OutputMode {
        self.mode
    }

    fn message(&mut self, msg: &str) {
        self.messages.push(msg.to_string());
    }

    fn success(&mut self, msg: &str) {
        self.successes.push(msg.to_string());
    }

    fn warning(&mut self, msg: &str) {
        self.warnings.push(msg.to_string());
    }

    fn error(&mut self, msg: &str) {
        self.errors.push(msg.to_string());
    }

    fn show_header(&mut self, title: &str) {
        self.headers.push(title.to_string());
    }

    fn start_spinner(&mut self, message: &str) -> Box<dyn SpinnerHandle> {
        self.spinners.push(message.to_string());
        Box::new(MockSpinner)
    }

    fn confirm(&mut self, question: &str, default: bool) -> Result<bool> {
        self.questions.push(question.to_string());
        Ok(self.confirm_answers.pop_front().unwrap_or(default))
    }

    fn is_interactive(&self) -> bool {
        self.interactive
    }
}

/// Spinner that does nothing.
#[derive(Debug)]
pub struct MockSpinner;

impl SpinnerHandle for MockSpinner {
    fn set_message(&mut self, _msg: &str) {}

    fn finish_success(&mut self, _msg: &str) {}

    fn finish_error(&mut self, _msg: &str) {}
}
