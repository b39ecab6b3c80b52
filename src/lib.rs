//! 条件表达式语言的前端
//!
//! - [`lexer`]：把表达式文本切分为 token（包括空白）
//! - [`parser`]：由 token 构建 [`ast::Expr`] 表达式树
//! - [`extractor`]：把属性名和值替换为 `#n<i>` / `:n<i>` 占位符

pub mod ast;
pub mod config;
pub mod error;
pub mod extractor;
pub mod lexer;
pub mod parser;
pub mod token;

pub use ast::{CompOp, Expr, Literal};
pub use config::{ConfigError, ParserConfig, ShellConfig};
pub use error::{LexError, ParseError};
pub use extractor::{extract, AttributeExtractor, ExpressionAttributes, Extraction};
pub use lexer::{tokenize, Lexer};
pub use parser::{parse, parse_with_config, Parser};
pub use token::{Span, Token, TokenKind, TokenValue};
