//! The token definition for the condition expression language.

use std::fmt;

use crate::ast::Literal;

/// A token is a single unit of the language, with a specific kind and location.
#[derive(Debug, Clone, PartialEq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub value: TokenValue,
    pub span: Span,
    /// The raw source text covered by `span`.
    pub lexeme: &'a str,
}

impl<'a> Token<'a> {
    pub fn new(kind: TokenKind, value: TokenValue, span: Span, lexeme: &'a str) -> Self {
        Self { kind, value, span, lexeme }
    }

    /// Builds a token whose value is its own source text.
    pub fn text(kind: TokenKind, span: Span, lexeme: &'a str) -> Self {
        Self::new(kind, TokenValue::Text(lexeme.to_string()), span, lexeme)
    }
}

/// The kind of a token.
///
/// `as_str` returns the stable, lower-case name of each kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // Punctuation
    Dot,      // .
    Comma,    // ,
    Colon,    // :
    LParen,   // (
    RParen,   // )
    LBrace,   // {
    RBrace,   // }
    LBracket, // [
    RBracket, // ]

    // Operators
    Eq,  // =
    Ne,  // <>
    Lt,  // <
    Lte, // <=
    Gt,  // >
    Gte, // >=

    // Names and values
    UnquotedIdentifier, // spam
    Identifier,         // 'spam'
    Literal,            // "spam", 7, b"c3BhbQ=="

    Whitespace,

    // Keywords
    And,
    Or,
    Not,
    In,
    Between,

    Eof,
}

impl TokenKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TokenKind::Dot => "dot",
            TokenKind::Comma => "comma",
            TokenKind::Colon => "colon",
            TokenKind::LParen => "lparen",
            TokenKind::RParen => "rparen",
            TokenKind::LBrace => "lbrace",
            TokenKind::RBrace => "rbrace",
            TokenKind::LBracket => "lbracket",
            TokenKind::RBracket => "rbracket",
            TokenKind::Eq => "eq",
            TokenKind::Ne => "ne",
            TokenKind::Lt => "lt",
            TokenKind::Lte => "lte",
            TokenKind::Gt => "gt",
            TokenKind::Gte => "gte",
            TokenKind::UnquotedIdentifier => "unquoted_identifier",
            TokenKind::Identifier => "identifier",
            TokenKind::Literal => "literal",
            TokenKind::Whitespace => "whitespace",
            TokenKind::And => "and",
            TokenKind::Or => "or",
            TokenKind::Not => "not",
            TokenKind::In => "in",
            TokenKind::Between => "between",
            TokenKind::Eof => "eof",
        }
    }

    /// Either flavour of attribute name.
    pub fn is_identifier(self) -> bool {
        matches!(self, TokenKind::Identifier | TokenKind::UnquotedIdentifier)
    }

    pub fn is_comparator(self) -> bool {
        matches!(
            self,
            TokenKind::Eq | TokenKind::Ne | TokenKind::Lt | TokenKind::Lte | TokenKind::Gt | TokenKind::Gte
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The semantic payload of a token.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenValue {
    /// Decoded identifier names, and the matched text of everything else.
    Text(String),
    /// A decoded string, number or byte-string literal.
    Literal(Literal),
}

impl fmt::Display for TokenValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenValue::Text(s) => f.write_str(s),
            TokenValue::Literal(lit) => write!(f, "{}", lit),
        }
    }
}

/// Represents a span in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    /// The starting byte offset.
    pub start: usize,
    /// The ending byte offset (exclusive).
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}
