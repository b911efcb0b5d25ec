#![forbid(unsafe_code)]
#![deny(unreachable_patterns)]

//! Tokenizer, validator and formatter for metric equations.
//!
//! An equation is plain arithmetic over named metric queries, e.g. `(A / B) * 100`. The
//! pipeline is:
//!
//! 1. [`parse_equation`] splits the text into [`Token`]s and checks the grammar, failing with a
//!    [`ParseError`] that points at the first character it could not consume.
//! 2. [`validate_tokens`] checks variable references against a [`KnownVariables`] set and
//!    returns every problem as a [`ValidationError`].
//! 3. [`format_tokens`] serializes the tokens into the normalized form consumed downstream
//!    (`($A / $B) * 100`).
//!
//! [`process_equation`] runs all three. All functions are pure; debouncing an input box on
//! top of them is handled by [`editing::EquationEditor`].

pub mod editing;
pub mod format;
pub mod parser;
pub mod validate;

mod ast;

pub use ast::*;
pub use editing::{EditOutcome, EditorConfig, EquationEditor};
pub use format::{escape_variable, format_tokens, unescape_variable};
pub use parser::{lex, parse_equation, parse_expression, Token, TokenKind};
pub use validate::{
    validate_tokens, KnownVariables, ValidateOptions, ValidationError, VariableCase,
};

/// Why an equation could not be committed.
///
/// The two variants are separate channels: a syntax error stops the pipeline before
/// validation runs, while validation reports all of its findings together.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EquationError {
    #[error("syntax error: {0}")]
    Syntax(#[from] ParseError),
    #[error("equation has {} validation error(s)", .0.len())]
    Invalid(Vec<ValidationError>),
}

impl EquationError {
    /// Character ranges to highlight, as `(start, end)` pairs.
    pub fn ranges(&self) -> Vec<(usize, Option<usize>)> {
        match self {
            EquationError::Syntax(err) => vec![(err.span.start, Some(err.span.end))],
            EquationError::Invalid(errors) => errors.iter().map(|e| (e.start, e.end)).collect(),
        }
    }

    /// Shift every reported offset right by `delta`.
    #[must_use]
    pub fn add_offset(self, delta: usize) -> Self {
        match self {
            EquationError::Syntax(err) => EquationError::Syntax(err.add_offset(delta)),
            EquationError::Invalid(errors) => EquationError::Invalid(
                errors.into_iter().map(|e| e.add_offset(delta)).collect(),
            ),
        }
    }
}

/// Trim, parse, validate and format `text` in one go.
///
/// Error offsets refer to `text` as given, leading whitespace included.
pub fn process_equation(text: &str, known: &KnownVariables) -> Result<String, EquationError> {
    let trimmed = text.trim();
    let leading = text.len() - text.trim_start().len();
    let check = || -> Result<String, EquationError> {
        let tokens = parse_equation(trimmed)?;
        let errors = validate_tokens(&tokens, known);
        if !errors.is_empty() {
            return Err(EquationError::Invalid(errors));
        }
        Ok(format_tokens(&tokens))
    };
    check().map_err(|err| err.add_offset(leading))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn process_equation_runs_the_whole_pipeline() {
        let known = KnownVariables::new(["A", "B"], ValidateOptions::default());
        assert_eq!(
            process_equation("  (A / B) * 100 ", &known),
            Ok("($A / $B) * 100".to_string())
        );
        assert!(matches!(
            process_equation("A +", &known),
            Err(EquationError::Syntax(_))
        ));
        let err = process_equation("A + Q", &known).unwrap_err();
        assert_eq!(err.ranges(), vec![(4, Some(5))]);
    }

    #[test]
    fn offsets_count_leading_whitespace() {
        let known = KnownVariables::new(["A"], ValidateOptions::default());
        let text = "   A + C";
        let err = process_equation(text, &known).unwrap_err();
        assert_eq!(err.ranges(), vec![(7, Some(8))]);
        assert_eq!(&text[7..8], "C");

        let err = process_equation("\t A +", &known).unwrap_err();
        assert_eq!(err.ranges(), vec![(5, Some(5))]);
    }
}
