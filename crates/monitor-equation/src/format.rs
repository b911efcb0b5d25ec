//! Serialization of token lists back into equation text.

use crate::parser::VARIABLE_SIGIL;
use crate::{Token, TokenKind};

/// Serialize tokens into the normalized equation string.
///
/// Variables are written with a single leading `$` and every whitespace run becomes exactly
/// one space. All other tokens are copied verbatim.
///
/// Names keep the spelling they were typed with. Under [`VariableCase::Insensitive`]
/// validation `a` is accepted for a known `A` but is still written as `$a`, so consumers that
/// resolve names must compare them the same way.
///
/// [`VariableCase::Insensitive`]: crate::VariableCase::Insensitive
pub fn format_tokens(tokens: &[Token]) -> String {
    tokens.iter().fold(String::new(), |mut out, token| {
        match token.kind {
            TokenKind::Variable => {
                out.push(VARIABLE_SIGIL);
                out.push_str(unescape_variable(&token.content));
            }
            TokenKind::Whitespace => out.push(' '),
            TokenKind::Number
            | TokenKind::Operator
            | TokenKind::ParenOpen
            | TokenKind::ParenClose => out.push_str(&token.content),
        }
        out
    })
}

/// `"A"` -> `"$A"`. Already-escaped names are returned unchanged.
pub fn escape_variable(name: &str) -> String {
    format!("{VARIABLE_SIGIL}{}", unescape_variable(name))
}

/// `"$A"` -> `"A"`.
pub fn unescape_variable(content: &str) -> &str {
    content.strip_prefix(VARIABLE_SIGIL).unwrap_or(content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_equation;

    #[test]
    fn escapes_variables_and_collapses_whitespace() {
        let tokens = parse_equation("(A /   B)  *\t100").unwrap();
        assert_eq!(format_tokens(&tokens), "($A / $B) * 100");
    }

    #[test]
    fn already_escaped_variables_are_not_double_escaped() {
        let tokens = parse_equation("$A+B").unwrap();
        assert_eq!(format_tokens(&tokens), "$A+$B");
    }

    #[test]
    fn escape_helpers_are_inverse() {
        assert_eq!(escape_variable("A"), "$A");
        assert_eq!(escape_variable("$A"), "$A");
        assert_eq!(unescape_variable("$A"), "A");
        assert_eq!(unescape_variable("A"), "A");
    }

    #[test]
    fn case_insensitive_names_keep_their_typed_spelling() {
        use crate::{validate_tokens, KnownVariables, ValidateOptions, VariableCase};

        let known = KnownVariables::new(
            ["A"],
            ValidateOptions {
                case: VariableCase::Insensitive,
            },
        );
        let tokens = parse_equation("a * 2").unwrap();
        assert!(validate_tokens(&tokens, &known).is_empty());
        assert_eq!(format_tokens(&tokens), "$a * 2");
        assert!(known.contains(unescape_variable("$a")));
    }
}
