//! 词法与语法错误，以及带插入符的错误提示

use thiserror::Error;

use crate::token::{Span, TokenKind};

/// 词法错误
///
/// `position` 是表达式中的字节偏移。
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LexError {
    #[error("Expression must not be empty.")]
    Empty,

    /// 消息中报告的是字符序号 `column`
    #[error("Unrecognized character {ch} at position {column}")]
    UnrecognizedCharacter { ch: char, position: usize, column: usize },

    #[error("Unclosed {delimiter} delimiter")]
    Unclosed { delimiter: char, position: usize },

    #[error("Invalid fractional character {}", describe(.found))]
    InvalidFraction { found: Option<char>, position: usize },

    #[error("Invalid exponential character {}", describe(.found))]
    InvalidExponent { found: Option<char>, position: usize },

    /// 单独的符号，或不符合 JSON 数字语法的数字
    #[error("{}", number_message(.text))]
    InvalidNumber { text: String, position: usize },

    #[error("Invalid base64 string: b\"{payload}\"")]
    InvalidBase64 { payload: String, position: usize },
}

fn describe(found: &Option<char>) -> String {
    found.map_or_else(|| "<end of input>".to_string(), |c| c.to_string())
}

fn number_message(text: &str) -> String {
    if text == "-" || text == "+" {
        format!("Unknown token {}", text)
    } else {
        format!("Invalid number {}", text)
    }
}

impl LexError {
    pub fn position(&self) -> Option<usize> {
        match self {
            LexError::Empty => None,
            LexError::UnrecognizedCharacter { position, .. }
            | LexError::Unclosed { position, .. }
            | LexError::InvalidFraction { position, .. }
            | LexError::InvalidExponent { position, .. }
            | LexError::InvalidNumber { position, .. }
            | LexError::InvalidBase64 { position, .. } => Some(*position),
        }
    }

    /// 输出错误消息、表达式原文，以及指向出错字符的 `^`
    pub fn render(&self, expression: &str) -> String {
        render_at(&self.to_string(), expression, self.position())
    }
}

/// 语法错误：token 序列不符合文法
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error(transparent)]
    Lex(#[from] LexError),

    #[error("Expressions must not be empty")]
    EmptyExpression,

    #[error("Unexpected token '{value}' of type '{kind}'. Expected type: {}", join_kinds(.expected))]
    InvalidToken { value: String, kind: TokenKind, expected: Vec<TokenKind>, span: Span },

    #[error("{message}")]
    Syntax { message: String, span: Option<Span> },

    #[error("Expression is nested more than {limit} levels deep")]
    NestingTooDeep { limit: usize, span: Span },
}

fn join_kinds(kinds: &[TokenKind]) -> String {
    kinds.iter().map(|k| k.as_str()).collect::<Vec<_>>().join(" or ")
}

impl ParseError {
    pub(crate) fn syntax(message: impl Into<String>, span: Span) -> Self {
        ParseError::Syntax { message: message.into(), span: Some(span) }
    }

    pub fn position(&self) -> Option<usize> {
        match self {
            ParseError::Lex(e) => e.position(),
            ParseError::EmptyExpression => None,
            ParseError::InvalidToken { span, .. } | ParseError::NestingTooDeep { span, .. } => Some(span.start),
            ParseError::Syntax { span, .. } => span.map(|s| s.start),
        }
    }

    pub fn render(&self, expression: &str) -> String {
        render_at(&self.to_string(), expression, self.position())
    }
}

fn render_at(message: &str, expression: &str, position: Option<usize>) -> String {
    let Some(position) = position else {
        return message.to_string();
    };
    // 以字符计列，而不是字节
    let prefix = expression.get(..position).unwrap_or(expression);
    let column = prefix.chars().count();
    format!("{}\n{}\n{}^", message, expression, " ".repeat(column))
}
