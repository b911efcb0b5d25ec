//! Headless edit pipeline for an equation input box.
//!
//! Each keystroke is recorded with [`EquationEditor::edit`]. Once the input has been quiet for
//! `settle_delay`, [`EquationEditor::poll`] runs parse, validate and format exactly once and
//! reports either the value to commit or the problems that blocked it. The editor never sleeps
//! or spawns timers; the host passes `now` in from whatever scheduler it runs on.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::validate::{KnownVariables, ValidateOptions, VariableCase};
use crate::{process_equation, EquationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Quiet period after the last keystroke before the input is evaluated.
    pub settle_delay_ms: u64,
    /// Problems are computed but hidden until this long after the last keystroke.
    pub error_display_delay_ms: u64,
    pub case: VariableCase,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: 200,
            error_display_delay_ms: 500,
            case: VariableCase::Sensitive,
        }
    }
}

impl EditorConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn error_display_delay(&self) -> Duration {
        Duration::from_millis(self.error_display_delay_ms)
    }

    pub fn validate_options(&self) -> ValidateOptions {
        ValidateOptions { case: self.case }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOutcome {
    /// The formatted equation to hand to the host's `on_change`.
    Committed(String),
    /// The edit was not committed.
    Rejected(EquationError),
}

#[derive(Debug, Clone)]
pub struct EquationEditor {
    config: EditorConfig,
    known: KnownVariables,
    text: String,
    last_edit: Option<Instant>,
    pending: bool,
    problems: Option<EquationError>,
    committed: Option<String>,
}

impl EquationEditor {
    pub fn new<I, S>(config: EditorConfig, known_variables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            known: KnownVariables::new(known_variables, config.validate_options()),
            config,
            text: String::new(),
            last_edit: None,
            pending: false,
            problems: None,
            committed: None,
        }
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    /// Replace the known variable set. The current text is re-evaluated on the next settled
    /// [`poll`](Self::poll).
    pub fn set_known_variables<I, S>(&mut self, known_variables: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.known = KnownVariables::new(known_variables, self.config.validate_options());
        if self.last_edit.is_some() {
            self.pending = true;
        }
    }

    /// Record a keystroke. Any evaluation still waiting for the previous text is superseded.
    pub fn edit(&mut self, text: impl Into<String>, now: Instant) {
        self.text = text.into();
        self.last_edit = Some(now);
        self.pending = true;
    }

    /// Evaluate the latest text if it has settled and has not been evaluated yet.
    pub fn poll(&mut self, now: Instant) -> Option<EditOutcome> {
        if !self.pending {
            return None;
        }
        let last_edit = self.last_edit?;
        if now.saturating_duration_since(last_edit) < self.config.settle_delay() {
            return None;
        }
        self.pending = false;

        match process_equation(&self.text, &self.known) {
            Ok(value) => {
                log::debug!("committing equation {value:?}");
                self.problems = None;
                self.committed = Some(value.clone());
                Some(EditOutcome::Committed(value))
            }
            Err(err) => {
                log::warn!("rejecting equation edit: {err}");
                self.problems = Some(err.clone());
                Some(EditOutcome::Rejected(err))
            }
        }
    }

    /// Whether problems should be shown at `now`.
    ///
    /// Problems found shortly after the most recent keystroke are held back so the user is not
    /// flashed with errors mid-typing.
    pub fn errors_visible(&self, now: Instant) -> bool {
        if self.problems.is_none() {
            return false;
        }
        match self.last_edit {
            Some(last_edit) => {
                now.saturating_duration_since(last_edit) >= self.config.error_display_delay()
            }
            None => true,
        }
    }

    /// The problems to render at `now`, if any are due.
    pub fn visible_problems(&self, now: Instant) -> Option<&EquationError> {
        if self.errors_visible(now) {
            self.problems.as_ref()
        } else {
            None
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn problems(&self) -> Option<&EquationError> {
        self.problems.as_ref()
    }

    /// The last value committed upstream.
    pub fn committed(&self) -> Option<&str> {
        self.committed.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn nothing_happens_before_the_input_settles() {
        let start = Instant::now();
        let mut editor = EquationEditor::new(EditorConfig::default(), ["A"]);
        editor.edit("A * 2", start);
        assert_eq!(editor.poll(start + ms(199)), None);
        assert!(editor.is_pending());
        assert_eq!(
            editor.poll(start + ms(200)),
            Some(EditOutcome::Committed("$A * 2".to_string()))
        );
        assert_eq!(editor.poll(start + ms(400)), None);
    }

    #[test]
    fn a_new_keystroke_restarts_the_settle_window() {
        let start = Instant::now();
        let mut editor = EquationEditor::new(EditorConfig::default(), ["A"]);
        editor.edit("A +", start);
        editor.edit("A + 1", start + ms(150));
        assert_eq!(editor.poll(start + ms(250)), None);
        assert_eq!(
            editor.poll(start + ms(350)),
            Some(EditOutcome::Committed("$A + 1".to_string()))
        );
    }

    #[test]
    fn known_variable_refresh_triggers_reevaluation() {
        let start = Instant::now();
        let mut editor = EquationEditor::new(EditorConfig::default(), ["A"]);
        editor.edit("B", start);
        assert!(matches!(
            editor.poll(start + ms(200)),
            Some(EditOutcome::Rejected(EquationError::Invalid(_)))
        ));
        editor.set_known_variables(["A", "B"]);
        assert_eq!(
            editor.poll(start + ms(300)),
            Some(EditOutcome::Committed("$B".to_string()))
        );
    }
}
