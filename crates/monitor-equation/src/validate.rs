//! Semantic checks over a parsed token list.
//!
//! Validation never fails as a whole: it returns every problem it finds so the caller can
//! underline all of them at once. Syntax problems are reported by [`crate::parse_equation`]
//! instead, and validation should only run on its successful output.

use std::borrow::Cow;

use ahash::AHashSet;
use serde::{Deserialize, Serialize};

use crate::Token;

pub const MISSING_METRIC_MESSAGE: &str = "Equations must contain at least one metric";

/// How variable names are compared against the known set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableCase {
    #[default]
    Sensitive,
    /// ASCII upper-case both the referenced name and the known names before comparing.
    Insensitive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidateOptions {
    pub case: VariableCase,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    pub message: String,
    pub start: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<usize>,
}

impl ValidationError {
    #[must_use]
    pub fn add_offset(self, delta: usize) -> Self {
        Self {
            message: self.message,
            start: self.start.saturating_add(delta),
            end: self.end.map(|end| end.saturating_add(delta)),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.end {
            Some(end) => write!(f, "{} (at {}..{})", self.message, self.start, end),
            None => write!(f, "{} (at {})", self.message, self.start),
        }
    }
}

/// The set of variable names an equation may reference, normalized once up front.
#[derive(Debug, Clone, Default)]
pub struct KnownVariables {
    case: VariableCase,
    names: AHashSet<String>,
}

impl KnownVariables {
    pub fn new<I, S>(names: I, opts: ValidateOptions) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names = names
            .into_iter()
            .map(|name| normalize(opts.case, name.as_ref()).into_owned())
            .collect();
        Self {
            case: opts.case,
            names,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(normalize(self.case, name).as_ref())
    }

    pub fn case(&self) -> VariableCase {
        self.case
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

fn normalize(case: VariableCase, name: &str) -> Cow<'_, str> {
    match case {
        VariableCase::Sensitive => Cow::Borrowed(name),
        VariableCase::Insensitive => Cow::Owned(name.to_ascii_uppercase()),
    }
}

/// Check every variable token against `known` and enforce the at-least-one-metric rule.
///
/// Offsets are cumulative character offsets over the token contents, so they line up with the
/// text the tokens were parsed from. The result is sorted by `start`.
pub fn validate_tokens(tokens: &[Token], known: &KnownVariables) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let mut offset = 0usize;
    let mut saw_variable = false;

    for token in tokens {
        let len = token.len();
        if let Some(name) = token.variable_name() {
            saw_variable = true;
            if !known.contains(name) {
                errors.push(ValidationError {
                    message: format!("Unknown query \"{name}\""),
                    start: offset,
                    end: Some(offset + len),
                });
            }
        }
        offset += len;
    }

    if !tokens.is_empty() && !saw_variable {
        errors.push(ValidationError {
            message: MISSING_METRIC_MESSAGE.to_string(),
            start: 0,
            end: None,
        });
    }

    errors.sort_by_key(|e| e.start);
    errors
}
