//! Equation lexer and grammar check.

use crate::{BinaryExpr, BinaryOp, Expr, ParseError, Span, UnaryExpr, UnaryOp};
use serde::{Deserialize, Serialize};

/// Sigil marking a variable reference in the serialized form (e.g. `$A`).
pub const VARIABLE_SIGIL: char = '$';

/// Nesting limit for parenthesized groups, unary prefixes and `^` chains.
///
/// Keeps pathological input like `((((...` from overflowing the stack in the recursive grammar
/// pass.
pub const MAX_NESTING_DEPTH: usize = 64;

const UNARY_BP: u8 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TokenKind {
    Number,
    Operator,
    ParenOpen,
    ParenClose,
    Variable,
    Whitespace,
}

/// A classified slice of the equation source.
///
/// `content` is the raw text, so concatenating the `content` of every token reproduces the
/// input exactly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    #[serde(rename = "type")]
    pub kind: TokenKind,
    pub content: String,
    pub span: Span,
}

impl Token {
    /// The referenced variable name with any `$` sigil stripped, for variable tokens.
    pub fn variable_name(&self) -> Option<&str> {
        match self.kind {
            TokenKind::Variable => Some(crate::format::unescape_variable(&self.content)),
            _ => None,
        }
    }

    pub fn is_trivia(&self) -> bool {
        self.kind == TokenKind::Whitespace
    }

    /// Length of the raw token text in characters.
    pub fn len(&self) -> usize {
        self.content.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

/// Tokenize and grammar-check an equation.
///
/// On success the returned tokens cover the whole input. The caller is expected to trim the
/// input first; surrounding whitespace is kept as whitespace tokens otherwise.
pub fn parse_equation(equation: &str) -> Result<Vec<Token>, ParseError> {
    let tokens = lex(equation)?;
    Parser::new(equation, &tokens).parse()?;
    log::trace!("parsed equation into {} tokens", tokens.len());
    Ok(tokens)
}

/// Parse an equation into an [`Expr`] tree.
///
/// Returns `Ok(None)` for an empty (or whitespace-only) equation.
pub fn parse_expression(equation: &str) -> Result<Option<Expr>, ParseError> {
    let tokens = lex(equation)?;
    Parser::new(equation, &tokens).parse()
}

/// Lexical stage only: classify the input into tokens without checking how they combine.
pub fn lex(equation: &str) -> Result<Vec<Token>, ParseError> {
    Lexer::new(equation).lex()
}

struct Lexer<'a> {
    src: &'a str,
    chars: std::str::Chars<'a>,
    idx: usize,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            chars: src.chars(),
            idx: 0,
            tokens: Vec::new(),
        }
    }

    fn lex(mut self) -> Result<Vec<Token>, ParseError> {
        while let Some(ch) = self.peek_char() {
            let start = self.idx;
            match ch {
                c if is_whitespace_char(c) => {
                    self.skip_while(is_whitespace_char);
                    self.push(TokenKind::Whitespace, start);
                }
                c if c.is_ascii_digit() => {
                    self.lex_number()?;
                    self.push(TokenKind::Number, start);
                }
                '.' => {
                    if !self.peek_next_is_digit() {
                        return Err(ParseError::new(
                            "Expected digits after decimal point",
                            Span::new(start, start + 1),
                        ));
                    }
                    self.lex_number()?;
                    self.push(TokenKind::Number, start);
                }
                '+' | '-' | '*' | '/' | '^' => {
                    self.bump();
                    self.push(TokenKind::Operator, start);
                }
                '(' => {
                    self.bump();
                    self.push(TokenKind::ParenOpen, start);
                }
                ')' => {
                    self.bump();
                    self.push(TokenKind::ParenClose, start);
                }
                VARIABLE_SIGIL => {
                    self.bump();
                    if !self.peek_char().is_some_and(is_ident_start_char) {
                        return Err(ParseError::new(
                            "Expected a variable name after `$`",
                            Span::new(start, self.idx),
                        ));
                    }
                    self.skip_while(is_ident_cont_char);
                    self.push(TokenKind::Variable, start);
                }
                c if is_ident_start_char(c) => {
                    self.skip_while(is_ident_cont_char);
                    self.push(TokenKind::Variable, start);
                }
                other => {
                    return Err(ParseError::new(
                        format!("Unexpected character `{other}`"),
                        Span::new(start, start + other.len_utf8()),
                    ));
                }
            }
        }
        Ok(self.tokens)
    }

    fn lex_number(&mut self) -> Result<(), ParseError> {
        self.skip_while(|c| c.is_ascii_digit());
        if self.peek_char() == Some('.') {
            let dot = self.idx;
            if !self.peek_next_is_digit() {
                return Err(ParseError::new(
                    "Expected digits after decimal point",
                    Span::new(dot, dot + 1),
                ));
            }
            self.bump();
            self.skip_while(|c| c.is_ascii_digit());
        }
        Ok(())
    }

    fn push(&mut self, kind: TokenKind, start: usize) {
        self.tokens.push(Token {
            kind,
            content: self.src[start..self.idx].to_string(),
            span: Span::new(start, self.idx),
        });
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.chars.next()?;
        self.idx += ch.len_utf8();
        Some(ch)
    }

    fn peek_char(&self) -> Option<char> {
        self.chars.clone().next()
    }

    fn peek_next_is_digit(&self) -> bool {
        let mut iter = self.chars.clone();
        iter.next();
        matches!(iter.next(), Some(c) if c.is_ascii_digit())
    }

    fn skip_while<F>(&mut self, mut pred: F)
    where
        F: FnMut(char) -> bool,
    {
        while let Some(ch) = self.peek_char() {
            if !pred(ch) {
                break;
            }
            self.bump();
        }
    }
}

fn is_whitespace_char(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n')
}

fn is_ident_start_char(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_cont_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

struct Parser<'a> {
    src: &'a str,
    tokens: &'a [Token],
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str, tokens: &'a [Token]) -> Self {
        Self {
            src,
            tokens,
            pos: 0,
            depth: 0,
        }
    }

    fn parse(mut self) -> Result<Option<Expr>, ParseError> {
        self.skip_trivia();
        if self.peek().is_none() {
            return Ok(None);
        }
        let expr = self.parse_expression(0)?;
        self.skip_trivia();
        if let Some(tok) = self.peek() {
            return Err(unexpected(tok));
        }
        Ok(Some(expr))
    }

    fn parse_expression(&mut self, min_bp: u8) -> Result<Expr, ParseError> {
        self.enter()?;
        let result = self.parse_expression_inner(min_bp);
        self.depth = self.depth.saturating_sub(1);
        result
    }

    fn parse_expression_inner(&mut self, min_bp: u8) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_prefix()?;

        loop {
            self.skip_trivia();
            let op = match self.peek() {
                Some(tok) if tok.kind == TokenKind::Operator => {
                    tok.content.chars().next().and_then(BinaryOp::from_operator)
                }
                _ => None,
            };
            let Some(op) = op else { break };
            let (l_bp, r_bp) = infix_binding_power(op);
            if l_bp < min_bp {
                break;
            }
            self.next(); // consume operator
            let rhs = self.parse_expression(r_bp)?;
            lhs = Expr::Binary(BinaryExpr {
                op,
                left: Box::new(lhs),
                right: Box::new(rhs),
            });
        }

        Ok(lhs)
    }

    fn parse_prefix(&mut self) -> Result<Expr, ParseError> {
        self.skip_trivia();
        let Some(tok) = self.peek() else {
            return Err(ParseError::new(
                "Unexpected end of equation",
                self.current_span(),
            ));
        };
        match tok.kind {
            TokenKind::Operator => {
                let op = match tok.content.as_str() {
                    "+" => UnaryOp::Plus,
                    "-" => UnaryOp::Minus,
                    _ => return Err(unexpected(tok)),
                };
                self.next();
                let expr = self.parse_expression(UNARY_BP)?;
                Ok(Expr::Unary(UnaryExpr {
                    op,
                    expr: Box::new(expr),
                }))
            }
            TokenKind::Number => {
                let raw = tok.content.clone();
                self.next();
                Ok(Expr::Number(raw))
            }
            TokenKind::Variable => {
                let name = tok.variable_name().unwrap_or_default().to_string();
                self.next();
                Ok(Expr::Variable(name))
            }
            TokenKind::ParenOpen => {
                self.next();
                let expr = self.parse_expression(0)?;
                self.expect_paren_close()?;
                Ok(expr)
            }
            TokenKind::ParenClose | TokenKind::Whitespace => Err(unexpected(tok)),
        }
    }

    fn expect_paren_close(&mut self) -> Result<(), ParseError> {
        self.skip_trivia();
        match self.peek() {
            Some(tok) if tok.kind == TokenKind::ParenClose => {
                self.next();
                Ok(())
            }
            _ => Err(ParseError::new("Expected `)`", self.current_span())),
        }
    }

    fn enter(&mut self) -> Result<(), ParseError> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(ParseError::new(
                format!("Expression nesting exceeds the {MAX_NESTING_DEPTH}-level limit"),
                self.current_span(),
            ));
        }
        self.depth += 1;
        Ok(())
    }

    fn skip_trivia(&mut self) {
        while self.tokens.get(self.pos).is_some_and(Token::is_trivia) {
            self.pos += 1;
        }
    }

    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<&'a Token> {
        let tok = self.tokens.get(self.pos)?;
        self.pos += 1;
        Some(tok)
    }

    fn current_span(&self) -> Span {
        self.tokens
            .get(self.pos)
            .map(|t| t.span)
            .unwrap_or_else(|| Span::new(self.src.len(), self.src.len()))
    }
}

fn unexpected(tok: &Token) -> ParseError {
    let what = match tok.kind {
        TokenKind::Number => "number",
        TokenKind::Operator => "operator",
        TokenKind::ParenOpen | TokenKind::ParenClose => "parenthesis",
        TokenKind::Variable => "variable",
        TokenKind::Whitespace => "whitespace",
    };
    ParseError::new(format!("Unexpected {what} `{}`", tok.content), tok.span)
}

fn infix_binding_power(op: BinaryOp) -> (u8, u8) {
    match op {
        BinaryOp::Pow => (50, 50), // right associative
        BinaryOp::Mul | BinaryOp::Div => (40, 41),
        BinaryOp::Add | BinaryOp::Sub => (30, 31),
    }
}
